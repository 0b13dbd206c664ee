//! sandlot-controller entry point.
//!
//! Serves the sandbox lifecycle API on a Unix socket, backed by Firecracker
//! microVMs.

use clap::Parser;
use sandlot_controller::{Args, ControllerConfig, Supervisor};
use sandlot_core::VmController;
use sandlot_vm::FirecrackerBackend;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControllerConfig::from(Args::parse());

    let level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting sandlot controller");
    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;
    config.validate_warn();

    let backend = Arc::new(FirecrackerBackend::new(config.backend.clone()));
    let controller = Arc::new(VmController::new(backend));
    let supervisor = Supervisor::new(&config, controller);

    if let Err(e) = supervisor.run().await {
        tracing::error!(error = %e, "controller failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
