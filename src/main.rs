//! Saleslens main entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use tokio::runtime::Runtime;

use saleslens_api::{start_server, AppState};
use saleslens_config::{BackendKind, Config};
use saleslens_core::memory::{JsonFileSource, MemoryBackend, RecordSource};
use saleslens_core::{BackendRef, QueryEngine};
use saleslens_store::{StoreBackend, TransactionStore};

#[derive(Parser, Debug)]
#[command(name = "saleslens")]
#[command(version = "0.1.0")]
#[command(about = "Sales transaction query service", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    let rt = Runtime::new()?;

    rt.block_on(async {
        info!(
            "Config loaded: records={}, backend={}",
            config.data.records_path().display(),
            config.data.backend
        );

        let source = Arc::new(JsonFileSource::new(config.data.records_path()));

        let (backend, memory): (BackendRef, Option<Arc<MemoryBackend>>) = match config.data.backend
        {
            BackendKind::Memory => {
                let memory = Arc::new(MemoryBackend::new(source));
                match memory.load().await {
                    Ok(count) => info!("Loaded {} records into memory", count),
                    Err(e) => {
                        // queries fail with NOT_LOADED until a reload succeeds
                        warn!("Initial load failed: {}", e);
                    }
                }
                (memory.clone(), Some(memory))
            }
            BackendKind::Indexed => {
                let records = source.load().await.map_err(|e| {
                    error!("Cannot build indexed store: {}", e);
                    anyhow::anyhow!(e.to_string())
                })?;
                let store = TransactionStore::build(records);
                info!("Indexed store built over {} records", store.len());
                (Arc::new(StoreBackend::new(Arc::new(store))), None)
            }
        };

        let state = AppState {
            engine: Arc::new(QueryEngine::new(backend)),
            memory,
            config,
        };
        start_server(state).await
    })
}
