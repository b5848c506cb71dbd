//! Mirrors actuator statuses from the store onto GPIO pins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use smartcity_api::models::ActuatorStatus;
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{StateStore, StoreError};
use tokio::process::Command;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status} for pin {pin}")]
    Command { program: String, pin: u8, status: String },
}

#[async_trait]
pub trait PinDriver: Send + Sync {
    async fn set(&self, pin: u8, high: bool) -> Result<(), GpioError>;
}

/// Drives pins through a `pinctrl`-style program: `<program> set <pin> op dh|dl`.
pub struct CommandPinDriver {
    program: String,
}

impl CommandPinDriver {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

#[async_trait]
impl PinDriver for CommandPinDriver {
    async fn set(&self, pin: u8, high: bool) -> Result<(), GpioError> {
        let status = Command::new(&self.program)
            .args(["set", &pin.to_string(), "op", if high { "dh" } else { "dl" }])
            .status()
            .await
            .map_err(|source| GpioError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(GpioError::Command {
                program: self.program.clone(),
                pin,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

/// Logs the levels instead of touching hardware.
pub struct DryRunDriver;

#[async_trait]
impl PinDriver for DryRunDriver {
    async fn set(&self, pin: u8, high: bool) -> Result<(), GpioError> {
        tracing::info!("pin {} -> {}", pin, if high { "high" } else { "low" });

        Ok(())
    }
}

pub struct GpioController {
    driver: Arc<dyn PinDriver>,
    pins: BTreeMap<String, u8>,
    levels: HashMap<u8, bool>,
}

impl GpioController {
    pub fn new(driver: Arc<dyn PinDriver>, pins: BTreeMap<String, u8>) -> Self {
        Self {
            driver,
            pins,
            levels: HashMap::new(),
        }
    }

    /// Drives every mapped pin whose actuator status differs from the last level set.
    pub async fn apply(&mut self, actuators: Option<&Value>) {
        for (id, pin) in &self.pins {
            let Some(status) = actuators
                .and_then(|actuators| actuators.get(id))
                .and_then(|record| record.get("status"))
                .and_then(Value::as_str)
                .and_then(ActuatorStatus::parse)
            else {
                continue;
            };

            let high = status.is_on();
            if self.levels.get(pin) == Some(&high) {
                continue;
            }

            match self.driver.set(*pin, high).await {
                Ok(()) => {
                    tracing::debug!("{} is {}, pin {} set", id, status, pin);
                    self.levels.insert(*pin, high);
                }
                Err(e) => tracing::error!("failed to drive pin {} for {}: {}", pin, id, e),
            }
        }
    }

    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }

    pub async fn start(mut self, store: Arc<dyn StateStore>, paths: &StorePaths) -> Result<JoinHandle<()>, StoreError> {
        let mut watch = store.watch(&paths.actuators()).await?;
        tracing::info!("driving {} pins from `{}`", self.pins.len(), paths.actuators());

        Ok(tokio::spawn(async move {
            while let Some(actuators) = watch.receiver.recv().await {
                self.apply(actuators.as_ref()).await;
            }

            tracing::warn!("actuator watch closed, pins are no longer updated");
        }))
    }
}
