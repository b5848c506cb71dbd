use std::collections::BTreeMap;
use std::env;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use smartcity_api::store::StoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

/// How a numeric sensor moves between `min` and `max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Independent uniform draw every tick
    #[default]
    Uniform,
    /// Follows the time of day, darkest around midnight
    Daylight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Numeric {
        min: f64,
        max: f64,
        unit: String,
        #[serde(default)]
        profile: Profile,
    },
    Levels {
        levels: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSensor {
    pub name: String,
    pub zone: String,
    #[serde(flatten)]
    pub reading: Reading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gpio {
    /// Drive real pins; only log the levels otherwise
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for Gpio {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_program(),
        }
    }
}

fn default_program() -> String {
    "pinctrl".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Seconds between simulated readings
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub sensors: Vec<SimulatedSensor>,
    /// BCM pin number per actuator id
    #[serde(default)]
    pub pins: BTreeMap<String, u8>,
    #[serde(default)]
    pub gpio: Gpio,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            sensors: Vec::new(),
            pins: BTreeMap::new(),
            gpio: Gpio::default(),
        }
    }
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub store: StoreConfig,
    #[serde(default)]
    pub node: Node,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("SMARTCITY").separator("__"))
            .set_override_option("store.auth", env::var("STORE_AUTH").ok())?
            .build()?
            .try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
