use std::error::Error;
use std::sync::Arc;

use cfcheck::checker::HostCheckerConfig;
use cfcheck::server;
use cfcheck::{
    CheckStore, HostChecker, MemoryCheckStore, RedbCheckStore, ServiceConfig, StoreBackend,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServiceConfig::from_env()?;
    log::info!("cfcheck {} starting", cfcheck::VERSION);

    let store: Arc<dyn CheckStore> = match &config.store {
        StoreBackend::Redb { path } => {
            log::info!("using redb store at {}", path.display());
            Arc::new(RedbCheckStore::open(path)?)
        }
        StoreBackend::Memory => {
            log::info!("using in-memory store");
            Arc::new(MemoryCheckStore::new())
        }
    };

    let checker = HostChecker::builder()
        .with_config(HostCheckerConfig::from(&config))
        .with_store(store)
        .build()?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    log::info!(
        "listening on {} (freshness window {}s)",
        listener.local_addr()?,
        config.freshness_window.as_secs()
    );

    server::serve(listener, Arc::new(checker), shutdown_signal()).await?;
    log::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c -> {err}");
    }
}
