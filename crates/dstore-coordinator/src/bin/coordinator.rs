//! Coordinator binary: parses CLI flags, wires the metadata store, node
//! client, and engine together, starts the background loops, and serves
//! the HTTP API.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dstore_coordinator::config::Cli;
use dstore_engine::Engine;
use dstore_metadata::{FileMetadataStore, InMemoryMetadataStore, MetadataStore};
use dstore_nodeclient::NodeClient;

fn init_telemetry() {
    let _ = tracing_log::LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

#[tokio::main]
async fn main() {
    init_telemetry();

    let cli = Cli::parse();
    let engine_config = cli.engine_config();

    let metadata: Arc<dyn MetadataStore> = match &cli.data_dir {
        Some(dir) => match FileMetadataStore::new(dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                log::error!("failed to open metadata store at {}: {e}", dir.display());
                std::process::exit(1);
            }
        },
        None => Arc::new(InMemoryMetadataStore::new()),
    };

    let nodeclient = Arc::new(NodeClient::new());
    let engine = Arc::new(Engine::new(metadata, nodeclient, engine_config));
    let loop_handles = engine.spawn();

    let app = dstore_coordinator::create_router(engine.clone());

    let bind_address = format!("0.0.0.0:{}", cli.port);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("failed to bind to {bind_address}: {e}");
            std::process::exit(1);
        }
    };

    log::info!("coordinator listening on http://{bind_address}");

    if let Err(e) = axum::serve(listener, app).await {
        log::error!("coordinator server error: {e}");
    }

    engine.shutdown();
    for handle in loop_handles {
        let _ = handle.await;
    }
}
