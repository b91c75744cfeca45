//! Kubemon operator binary.
//!
//! Composition root: loads configuration, installs logging, seeds the store
//! from the optional manifest and runs the creature and battle controllers
//! until Ctrl-C.
//!
//! ```bash
//! KUBEMON_MANIFEST=demos/arena.ron KUBEMON_TURN_INTERVAL_SECS=2 cargo run -p kubemon-operator
//! ```

use anyhow::Result;
use kubemon_bootstrap::{OperatorBuilder, OperatorConfig, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = OperatorConfig::from_env();
    let _guard = logging::init(&config.logging)?;

    tracing::info!(
        workers = config.manager.workers,
        turn_interval_secs = config.manager.turn_interval.as_secs(),
        state_dir = ?config.state_dir,
        manifest = ?config.manifest,
        "Starting kubemon operator"
    );

    let setup = OperatorBuilder::new(config).build().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    setup.manager.shutdown().await?;
    Ok(())
}
