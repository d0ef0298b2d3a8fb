use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use loopgraph_rs::loopgraph::config::AppConfig;
use loopgraph_rs::loopgraph::functions;
use loopgraph_rs::loopgraph::server;
use loopgraph_rs::loopgraph::workflow::loader::GraphLoader;
use loopgraph_rs::loopgraph::workflow::run::RunManager;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a graph file once and print the result
    Run {
        /// Path to the graph file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        state: String,

        /// Read the initial state from a JSON file instead
        #[arg(long, conflicts_with = "state")]
        state_file: Option<PathBuf>,

        /// Override the step ceiling
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// List the built-in functions
    Functions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Commands::Run {
            file,
            state,
            state_file,
            max_steps,
        } => {
            if let Some(max_steps) = max_steps {
                config.engine.max_steps = max_steps;
                config.validate()?;
            }

            let spec = GraphLoader::new()
                .load_graph(&file)
                .with_context(|| format!("failed to load graph {}", file.display()))?;

            let raw = match state_file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => state,
            };
            let initial: Map<String, Value> =
                serde_json::from_str(&raw).context("initial state must be a JSON object")?;

            let registry = functions::builtin_registry().await;
            let manager = RunManager::new(Arc::new(registry), config.engine.clone());
            let graph_id = manager.create_graph(spec).await?;
            let record = manager.run(&graph_id, initial).await?;

            log::info!("Run {} finished as {}", record.run_id(), record.status());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Functions => {
            let registry = functions::builtin_registry().await;
            for function in registry.list().await {
                println!("{:<24} {}", function.name, function.description);
            }
        }
    }

    Ok(())
}
