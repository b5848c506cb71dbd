use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use smartcity_api::models::SystemStatus;
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{self, StateStore, StoreError};

use crate::gpio::{CommandPinDriver, DryRunDriver, GpioController, PinDriver};
use crate::settings::Settings;
use crate::simulate::Simulator;

pub mod gpio;
pub mod settings;
pub mod simulate;

pub async fn write_status(store: &dyn StateStore, paths: &StorePaths, status: SystemStatus) -> Result<(), StoreError> {
    store.write_whole(&paths.status(), serde_json::to_value(status)?).await
}

/// Reports the system online, simulates readings and drives pins until a
/// shutdown signal, then reports it offline.
pub async fn run(settings: &Arc<Settings>) -> anyhow::Result<()> {
    let store = store::connect(&settings.store).context("failed to connect to the store")?;
    let paths = StorePaths::new(&settings.store.root);

    write_status(store.as_ref(), &paths, SystemStatus::online())
        .await
        .context("failed to report the system online")?;
    tracing::info!("system online, {} simulated sensors", settings.node.sensors.len());

    let simulator = Simulator::new(store.clone(), paths.clone(), settings.node.sensors.clone())
        .start(Duration::from_secs(settings.node.interval.max(1)));

    let driver: Arc<dyn PinDriver> = if settings.node.gpio.enabled {
        Arc::new(CommandPinDriver::new(&settings.node.gpio.program))
    } else {
        Arc::new(DryRunDriver)
    };
    let gpio = GpioController::new(driver, settings.node.pins.clone())
        .start(store.clone(), &paths)
        .await?;

    shutdown_signal().await;
    tracing::info!("shutting down");

    simulator.abort();
    gpio.abort();

    write_status(store.as_ref(), &paths, SystemStatus::offline())
        .await
        .context("failed to report the system offline")?;
    tracing::info!("system offline");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
