use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use users::{UserStore, config::StoreConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting user store service");

    let config = StoreConfig::from_env()?;
    let store = UserStore::open(&config).await?;

    // Check storage connectivity
    if store.health_check().await? {
        info!("User storage reachable");
    } else {
        anyhow::bail!("User storage is not reachable");
    }

    let users = store.find_all().await?;
    info!("User store ready with {} users", users.len());

    tokio::signal::ctrl_c().await?;

    info!("Shutting down user store service");
    store.close().await;

    Ok(())
}
