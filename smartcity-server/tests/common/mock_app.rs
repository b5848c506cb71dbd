use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use serde_json::{Map, Value};
use smartcity_api::models::{capitalize_words, SystemStatus, Weather};
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{MemoryStore, StateStore, StoreError, Watch, WatchId};
use smartcity_server::app::start_app;
use smartcity_server::configs::Settings;
use smartcity_server::errors::WeatherError;
use smartcity_server::services::{DashboardHandle, DisplayView, EventBus, WeatherProvider};
use time::OffsetDateTime;
use tokio::sync::RwLock;

const SETTINGS: &str = r#"
[server]
host = "127.0.0.1"
port = 0

[logger]
level = "debug"

[store]
type = "memory"
root = "smartcity"

[dashboard]
alert_period = 30
cascade_zone = "Zona Industrial"

[weather]
api_key = "test"
city = "Leiria"

[[seed]]
kind = "sensor"
name = "Luminosidade"
zone = "Parque Verde"
value = "120 lux"

[[seed]]
kind = "actuator"
name = "Iluminação Pública"
zone = "Parque Verde"

[[seed]]
kind = "sensor"
name = "Qualidade do Ar"
zone = "Zona Industrial"
value = "Boa"

[[seed]]
kind = "actuator"
name = "Alerta de Poluição"
zone = "Zona Industrial"

[[seed]]
kind = "actuator"
name = "Ventilação"
zone = "Zona Industrial"
"#;

pub fn test_settings() -> Settings {
    Settings::from_toml(SETTINGS).unwrap()
}

pub struct MockApp {
    pub store: Arc<CountingStore>,
    pub router: Router,
    pub dashboard: DashboardHandle,
    pub event_bus: Arc<EventBus>,
    pub view: Arc<RwLock<DisplayView>>,
    pub paths: StorePaths,
}

impl MockApp {
    pub async fn new() -> Self {
        Self::start(true).await
    }

    /// Same app, but the node never reported the system online.
    pub async fn offline() -> Self {
        Self::start(false).await
    }

    async fn start(online: bool) -> Self {
        let settings = test_settings();
        let paths = StorePaths::new(&settings.store.root);
        let store = Arc::new(CountingStore::new());

        if online {
            store
                .write_whole(&paths.status(), serde_json::to_value(SystemStatus::online()).unwrap())
                .await
                .unwrap();
        }

        let app = start_app(store.clone(), &settings, Some(Arc::new(FixedWeather)))
            .await
            .unwrap();

        Self {
            store,
            router: app.router,
            dashboard: app.dashboard,
            event_bus: app.event_bus,
            view: app.view,
            paths,
        }
    }
}

/// Answers every lookup with the same conditions; `Nenhures` does not exist.
pub struct FixedWeather;

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self, city: &str) -> Result<Weather, WeatherError> {
        if city == "Nenhures" {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }

        Ok(Weather {
            city: city.to_string(),
            temperature: 18.2,
            temperature_min: 16.0,
            temperature_max: 20.5,
            humidity: 71.0,
            description: capitalize_words("céu limpo"),
            icon_url: "https://openweathermap.org/img/wn/01d@2x.png".to_string(),
            fetched_at: OffsetDateTime::now_utc(),
        })
    }
}

/// In-memory store that counts field writes per path.
pub struct CountingStore {
    inner: MemoryStore,
    field_writes: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            field_writes: Mutex::new(HashMap::new()),
        }
    }

    pub fn field_writes(&self, path: &str) -> usize {
        self.field_writes.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StateStore for CountingStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn write_whole(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write_whole(path, value).await
    }

    async fn write_field(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        *self
            .field_writes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
        self.inner.write_field(path, fields).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.inner.remove(path).await
    }

    async fn watch(&self, path: &str) -> Result<Watch, StoreError> {
        self.inner.watch(path).await
    }

    async fn unwatch(&self, id: WatchId) {
        self.inner.unwatch(id).await
    }
}

/// Percent-encodes a device id for use as a path segment.
pub fn uri_segment(id: &str) -> String {
    id.bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            _ => format!("%{byte:02X}"),
        })
        .collect()
}

/// Polls `check` until it holds, giving the background tasks time to react.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
