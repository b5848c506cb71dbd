use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use smartcity_api::models::{capitalize_words, Weather};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use super::{topics, EventBus, EventPayload};
use crate::errors::WeatherError;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, city: &str) -> Result<Weather, WeatherError>;
}

#[derive(Deserialize)]
struct Report {
    name: String,
    main: Readings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Deserialize)]
struct Readings {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
    icon: String,
}

impl From<Report> for Weather {
    fn from(report: Report) -> Self {
        let (description, icon_url) = report
            .weather
            .first()
            .map(|condition| {
                (
                    capitalize_words(&condition.description),
                    format!("https://openweathermap.org/img/wn/{}@2x.png", condition.icon),
                )
            })
            .unwrap_or_default();

        Weather {
            city: report.name,
            temperature: report.main.temp,
            temperature_min: report.main.temp_min,
            temperature_max: report.main.temp_max,
            humidity: report.main.humidity,
            description,
            icon_url,
            fetched_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Current conditions from the OpenWeatherMap API, metric units.
pub struct OpenWeatherMap {
    client: Client,
    url: String,
    api_key: String,
}

impl OpenWeatherMap {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    async fn current(&self, city: &str) -> Result<Weather, WeatherError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", city), ("units", "metric"), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(WeatherError::CityNotFound(city.to_string())),
            status if !status.is_success() => Err(WeatherError::UpstreamStatus(status.as_u16())),
            _ => Ok(response.json::<Report>().await?.into()),
        }
    }
}

pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    default_city: Option<String>,
    event_bus: Arc<EventBus>,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        default_city: Option<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            default_city,
            event_bus,
        }
    }

    pub async fn lookup(&self, city: Option<&str>) -> Result<Weather, WeatherError> {
        let city = city
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .or(self.default_city.as_deref())
            .ok_or(WeatherError::MissingCity)?;

        self.provider.current(city).await
    }

    /// Looks up the default city every `period` and publishes the result.
    pub fn start_refresh(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match self.lookup(None).await {
                    Ok(weather) => {
                        tracing::debug!("weather in {}: {:.1} °C", weather.city, weather.temperature);
                        self.event_bus
                            .notify(topics::WEATHER, EventPayload::Weather(weather))
                            .await;
                    }
                    Err(e) => tracing::warn!("weather refresh failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FixedWeather;

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current(&self, city: &str) -> Result<Weather, WeatherError> {
            let report: Report = serde_json::from_value(json!({
                "name": city,
                "main": { "temp": 18.2, "temp_min": 16.0, "temp_max": 20.5, "humidity": 71 },
                "weather": [{ "description": "nuvens dispersas", "icon": "03d" }]
            }))
            .unwrap();

            Ok(report.into())
        }
    }

    fn service(default_city: Option<&str>) -> WeatherService {
        WeatherService::new(
            Arc::new(FixedWeather),
            default_city.map(str::to_string),
            Arc::new(EventBus::new()),
        )
    }

    #[tokio::test]
    async fn test_report_conversion() {
        let weather = service(None).lookup(Some("Leiria")).await.unwrap();

        assert_eq!(weather.city, "Leiria");
        assert_eq!(weather.description, "Nuvens Dispersas");
        assert_eq!(weather.icon_url, "https://openweathermap.org/img/wn/03d@2x.png");
        assert_eq!(weather.humidity, 71.0);
    }

    #[tokio::test]
    async fn test_default_city() {
        assert_eq!(service(Some("Leiria")).lookup(Some("  ")).await.unwrap().city, "Leiria");
        assert!(matches!(
            service(None).lookup(None).await,
            Err(WeatherError::MissingCity)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_publishes() {
        let service = Arc::new(service(Some("Leiria")));
        let mut receiver = service.event_bus.subscribe(topics::WEATHER).await;

        let refresh = service.clone().start_refresh(Duration::from_secs(600));

        assert!(matches!(
            receiver.recv().await,
            Ok(EventPayload::Weather(weather)) if weather.city == "Leiria"
        ));
        refresh.abort();
    }
}
