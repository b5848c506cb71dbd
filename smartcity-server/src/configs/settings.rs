use std::env;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use smartcity_api::models::{NewDevice, RuleSet};
use smartcity_api::store::StoreConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    /// Seconds between re-announcements of an active alert
    #[serde(default = "default_alert_period")]
    pub alert_period: u64,
    /// Only the pollution alert of this zone drives its ventilation
    #[serde(default = "default_cascade_zone")]
    pub cascade_zone: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            alert_period: default_alert_period(),
            cascade_zone: default_cascade_zone(),
        }
    }
}

fn default_alert_period() -> u64 {
    30
}

fn default_cascade_zone() -> String {
    "Zona Industrial".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    #[serde(default = "default_weather_url")]
    pub url: String,
    pub api_key: String,
    /// City used when a lookup names none, and by the background refresh
    #[serde(default)]
    pub city: Option<String>,
    /// Refresh period in seconds, no background refresh when absent
    #[serde(default)]
    pub refresh: Option<u64>,
}

fn default_weather_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub logger: Logger,
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: Dashboard,
    /// Initial rule parameters, written to the store when it has none
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub weather: Option<Weather>,
    /// Device catalogue written to the store when it has no devices
    #[serde(default)]
    pub seed: Vec<NewDevice>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Self::build(
            Config::builder()
                .add_source(File::with_name("configs/default"))
                .add_source(File::with_name(&format!("configs/{run_mode}")).required(false)),
            env::var("STORE_AUTH").ok(),
        )
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Layers `SMARTCITY__SECTION__KEY` variables and the store credential
    /// over the file sources.
    fn build(sources: ConfigBuilder<DefaultState>, store_auth: Option<String>) -> Result<Self, ConfigError> {
        sources
            .add_source(Environment::with_prefix("SMARTCITY").separator("__"))
            .set_override_option("store.auth", store_auth)?
            .build()?
            .try_deserialize()
    }
}
