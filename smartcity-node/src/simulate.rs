use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value};
use smartcity_api::models::{timestamp_now, DeviceId};
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{StateStore, StoreError};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::settings::{Profile, Reading, SimulatedSensor};

/// Share of full daylight at `day_fraction` (0 is midnight, 0.5 is noon).
pub fn daylight(day_fraction: f64) -> f64 {
    const SUNRISE_START: f64 = 0.23;
    const SUNRISE_END: f64 = 0.25;
    const SUNSET_START: f64 = 0.73;
    const SUNSET_END: f64 = 0.75;
    const MOONLIGHT: f64 = 0.01;

    if (SUNRISE_START..=SUNSET_END).contains(&day_fraction) {
        if day_fraction <= SUNRISE_END {
            ((day_fraction - SUNRISE_START) / (SUNRISE_END - SUNRISE_START) * PI / 2.0).sin()
        } else if day_fraction >= SUNSET_START {
            ((day_fraction - SUNSET_START) / (SUNSET_END - SUNSET_START) * PI / 2.0).cos()
        } else {
            1.0
        }
    } else {
        MOONLIGHT
    }
}

/// Fraction of the current UTC day that has elapsed.
pub fn day_fraction(now: OffsetDateTime) -> f64 {
    f64::from(now.hour()) / 24.0 + f64::from(now.minute()) / 1440.0 + f64::from(now.second()) / 86400.0
}

/// Next reading in the store format: `"<x.x> <unit>"` or one of the levels.
pub fn reading(reading: &Reading, rng: &mut impl Rng, day_fraction: f64) -> Option<String> {
    match reading {
        Reading::Numeric { min, max, unit, profile } => {
            let (min, max) = (min.min(*max), min.max(*max));
            let value = match profile {
                Profile::Uniform if max > min => rng.random_range(min..max),
                Profile::Uniform => min,
                Profile::Daylight => {
                    let jitter = if max > min { rng.random_range(-0.02..0.02) } else { 0.0 };
                    (min + (max - min) * (daylight(day_fraction) + jitter)).clamp(min, max)
                }
            };
            Some(format!("{value:.1} {unit}"))
        }
        Reading::Levels { levels } if levels.is_empty() => None,
        Reading::Levels { levels } => Some(levels[rng.random_range(0..levels.len())].clone()),
    }
}

/// Pushes simulated readings for the configured sensors.
pub struct Simulator {
    store: Arc<dyn StateStore>,
    paths: StorePaths,
    sensors: Vec<SimulatedSensor>,
}

impl Simulator {
    pub fn new(store: Arc<dyn StateStore>, paths: StorePaths, sensors: Vec<SimulatedSensor>) -> Self {
        Self { store, paths, sensors }
    }

    /// Writes one reading per sensor, then refreshes `status.lastUpdate`.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let fraction = day_fraction(OffsetDateTime::now_utc());
        let readings: Vec<(DeviceId, String)> = {
            let mut rng = rand::rng();
            self.sensors
                .iter()
                .filter_map(|sensor| {
                    let value = reading(&sensor.reading, &mut rng, fraction)?;
                    Some((DeviceId::derive(&sensor.name, &sensor.zone), value))
                })
                .collect()
        };

        for (id, value) in readings {
            tracing::debug!("{} reads {}", id, value);

            let mut fields = Map::new();
            fields.insert("value".to_string(), Value::from(value));
            fields.insert("dataTime".to_string(), Value::from(timestamp_now()));
            self.store.write_field(&self.paths.sensor(&id), fields).await?;
        }

        let mut fields = Map::new();
        fields.insert("lastUpdate".to_string(), Value::from(timestamp_now()));
        self.store.write_field(&self.paths.status(), fields).await
    }

    pub fn start(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = self.tick().await {
                    if e.is_permission_denied() {
                        tracing::warn!("simulated readings rejected: {}", e);
                    } else {
                        tracing::error!("failed to write simulated readings: {}", e);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use smartcity_api::models::parse_magnitude;
    use smartcity_api::store::MemoryStore;

    use super::*;

    fn numeric(min: f64, max: f64, profile: Profile) -> Reading {
        Reading::Numeric {
            min,
            max,
            unit: "lux".to_string(),
            profile,
        }
    }

    #[test]
    fn test_daylight_curve() {
        assert!(daylight(0.0) <= 0.01);
        assert_eq!(daylight(0.5), 1.0);
        assert!(daylight(0.24) > 0.0 && daylight(0.24) < 1.0);
        assert!(daylight(0.9) < 0.01);
    }

    #[test]
    fn test_numeric_reading_in_range() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let value = reading(&numeric(300.0, 500.0, Profile::Uniform), &mut rng, 0.5).unwrap();
            assert!(value.ends_with(" lux"));
            let magnitude = parse_magnitude(&value).unwrap();
            assert!((300.0..=500.0).contains(&magnitude));
        }

        assert_eq!(
            reading(&numeric(20.0, 20.0, Profile::Uniform), &mut rng, 0.5).unwrap(),
            "20.0 lux"
        );
    }

    #[test]
    fn test_daylight_reading() {
        let mut rng = StdRng::seed_from_u64(7);

        let noon = parse_magnitude(&reading(&numeric(5.0, 500.0, Profile::Daylight), &mut rng, 0.5).unwrap()).unwrap();
        let night = parse_magnitude(&reading(&numeric(5.0, 500.0, Profile::Daylight), &mut rng, 0.0).unwrap()).unwrap();

        assert!(noon > 450.0);
        assert!(night < 20.0);
    }

    #[test]
    fn test_level_reading() {
        let mut rng = StdRng::seed_from_u64(7);
        let levels = Reading::Levels {
            levels: vec!["Boa".to_string(), "Má".to_string()],
        };

        let value = reading(&levels, &mut rng, 0.5).unwrap();
        assert!(value == "Boa" || value == "Má");
        assert!(reading(&Reading::Levels { levels: Vec::new() }, &mut rng, 0.5).is_none());
    }

    #[tokio::test]
    async fn test_tick_updates_sensors_and_status() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let paths = StorePaths::default();
        let id = DeviceId::derive("Luminosidade", "Parque Verde");
        store
            .write_whole(
                &paths.sensor(&id),
                serde_json::json!({ "name": "Luminosidade", "zone": "Parque Verde", "value": "0 lux" }),
            )
            .await
            .unwrap();

        let simulator = Simulator::new(
            store.clone(),
            paths.clone(),
            vec![SimulatedSensor {
                name: "Luminosidade".to_string(),
                zone: "Parque Verde".to_string(),
                reading: numeric(300.0, 500.0, Profile::Uniform),
            }],
        );
        simulator.tick().await.unwrap();

        let record = store.read(&paths.sensor(&id)).await.unwrap().unwrap();
        assert_eq!(record["name"], "Luminosidade");
        assert_ne!(record["value"], "0 lux");
        assert!(record["dataTime"].is_string());
        assert!(store.read(&paths.status()).await.unwrap().unwrap()["lastUpdate"].is_string());
    }
}
