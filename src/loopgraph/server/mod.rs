// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::loopgraph::config::AppConfig;
use crate::loopgraph::functions;
use crate::loopgraph::workflow::graph::GraphSpec;
use crate::loopgraph::workflow::registry::FunctionRegistry;
use crate::loopgraph::workflow::run::{RunManager, RunRecord};
use crate::sdk::LoopGraphError;

/// Shared handler state
pub struct AppState {
    pub manager: RunManager,
    pub registry: FunctionRegistry,
}

impl AppState {
    /// Manager and registry sharing the same function table
    pub fn new(registry: FunctionRegistry, config: &AppConfig) -> Self {
        let manager = RunManager::new(Arc::new(registry.clone()), config.engine.clone());
        Self { manager, registry }
    }
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/graph/create", post(create_graph))
        .route("/graph/run", post(run_graph))
        .route("/graph/run/async", post(run_graph_async))
        .route("/graph/run/stream", post(stream_run))
        .route("/graph/state/{run_id}", get(get_run_state))
        .route("/graph/cancel/{run_id}", post(cancel_run))
        .route("/graph/{graph_id}", get(get_graph).delete(delete_graph))
        .route("/graphs", get(list_graphs))
        .route("/graph/list", get(list_graphs))
        .route("/runs", get(list_runs))
        .route("/runs/list", get(list_runs))
        .route("/runs/{run_id}", delete(delete_run))
        .route("/functions", get(list_functions))
        .route("/tools/list", get(list_functions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = functions::builtin_registry().await;
    let state = Arc::new(AppState::new(registry, &config));
    let app = router(state);

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

fn api_error(err: LoopGraphError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        LoopGraphError::Graph(_) => StatusCode::BAD_REQUEST,
        LoopGraphError::GraphNotFound { .. } | LoopGraphError::RunNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

fn run_body(record: &RunRecord) -> Value {
    json!({
        "run_id": record.run_id(),
        "graph_id": record.graph_id(),
        "status": record.status(),
        "current_node": record.current_node(),
        "steps": record.steps(),
        "final_state": record.state(),
        "execution_log": record.log(),
        "failure": record.failure(),
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_graph(State(state): State<Arc<AppState>>, Json(spec): Json<GraphSpec>) -> ApiResult {
    let graph_id = state.manager.create_graph(spec).await.map_err(api_error)?;
    Ok(Json(json!({
        "graph_id": graph_id,
        "message": "Graph created successfully",
    })))
}

async fn get_graph(State(state): State<Arc<AppState>>, Path(graph_id): Path<String>) -> ApiResult {
    let graph = state.manager.get_graph(&graph_id).await.map_err(api_error)?;
    let nodes: Map<String, Value> = graph
        .nodes()
        .map(|node| {
            (
                node.id.clone(),
                json!({ "function": node.function, "type": node.kind }),
            )
        })
        .collect();

    Ok(Json(json!({
        "graph_id": graph.id(),
        "name": graph.name(),
        "description": graph.description(),
        "nodes": nodes,
        "edges": graph.edges(),
        "entry_node": graph.entry(),
        "loop_until": graph.predicate().describe(),
    })))
}

async fn delete_graph(State(state): State<Arc<AppState>>, Path(graph_id): Path<String>) -> ApiResult {
    state.manager.delete_graph(&graph_id).await.map_err(api_error)?;
    Ok(Json(json!({
        "graph_id": graph_id,
        "message": "Graph deleted successfully",
    })))
}

async fn list_graphs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.manager.list_graphs().await))
}

#[derive(Deserialize)]
struct RunRequest {
    graph_id: String,
    #[serde(default)]
    initial_state: Map<String, Value>,
}

async fn run_graph(State(state): State<Arc<AppState>>, Json(payload): Json<RunRequest>) -> ApiResult {
    let record = state
        .manager
        .run(&payload.graph_id, payload.initial_state)
        .await
        .map_err(api_error)?;
    Ok(Json(run_body(&record)))
}

async fn run_graph_async(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> ApiResult {
    let run_id = state
        .manager
        .spawn(&payload.graph_id, payload.initial_state)
        .await
        .map_err(api_error)?;
    Ok(Json(json!({
        "run_id": run_id,
        "graph_id": payload.graph_id,
        "status": "running",
    })))
}

async fn stream_run(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, Json<Value>)> {
    let (tx, rx) = mpsc::channel(100);

    let run_id = state
        .manager
        .run_stream(&payload.graph_id, payload.initial_state, tx)
        .await
        .map_err(api_error)?;
    log::info!("Streaming run {} of graph {}", run_id, payload.graph_id);

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1))))
}

async fn get_run_state(State(state): State<Arc<AppState>>, Path(run_id): Path<String>) -> ApiResult {
    let record = state.manager.get_run(&run_id).await.map_err(api_error)?;
    let mut body = run_body(&record);
    if let Some(obj) = body.as_object_mut() {
        if let Some(current) = obj.remove("final_state") {
            obj.insert("current_state".to_string(), current);
        }
    }
    Ok(Json(body))
}

async fn cancel_run(State(state): State<Arc<AppState>>, Path(run_id): Path<String>) -> ApiResult {
    let cancelled = state.manager.cancel(&run_id).await.map_err(api_error)?;
    Ok(Json(json!({
        "run_id": run_id,
        "cancelled": cancelled,
    })))
}

async fn delete_run(State(state): State<Arc<AppState>>, Path(run_id): Path<String>) -> ApiResult {
    state.manager.delete_run(&run_id).await.map_err(api_error)?;
    Ok(Json(json!({
        "run_id": run_id,
        "message": "Run deleted successfully",
    })))
}

#[derive(Deserialize)]
struct RunsQuery {
    graph_id: Option<String>,
}

async fn list_runs(State(state): State<Arc<AppState>>, Query(query): Query<RunsQuery>) -> Json<Value> {
    Json(json!(state.manager.list_runs(query.graph_id.as_deref()).await))
}

async fn list_functions(State(state): State<Arc<AppState>>) -> Json<Value> {
    let functions = state.registry.list().await;
    Json(json!({
        "functions": functions,
        "count": functions.len(),
    }))
}
