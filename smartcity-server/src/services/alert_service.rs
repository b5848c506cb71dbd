use std::collections::BTreeMap;
use std::time::Duration;

use smartcity_api::models::{Alert, AlertKind, DeviceId};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Timer expiry for the alert raised under `key`.
///
/// `generation` ties the tick to one raise, so a tick already queued when the
/// alert was cleared or raised again is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTick {
    pub key: DeviceId,
    pub generation: u64,
}

struct ActiveAlert {
    alert: Alert,
    generation: u64,
    timer: JoinHandle<()>,
}

/// Active alerts keyed by the actuator that raised them, each with a
/// recurring re-announcement timer.
///
/// Timers only post [`AlertTick`]s to the channel returned by [`AlertManager::new`];
/// the owner feeds them back through [`AlertManager::on_tick`].
pub struct AlertManager {
    period: Duration,
    alerts: BTreeMap<DeviceId, ActiveAlert>,
    ticks: mpsc::UnboundedSender<AlertTick>,
    next_generation: u64,
}

impl AlertManager {
    pub fn new(period: Duration) -> (Self, mpsc::UnboundedReceiver<AlertTick>) {
        let (ticks, receiver) = mpsc::unbounded_channel();

        (
            Self {
                period,
                alerts: BTreeMap::new(),
                ticks,
                next_generation: 0,
            },
            receiver,
        )
    }

    pub fn raise(&mut self, key: DeviceId, kind: AlertKind, zone: &str) -> &Alert {
        self.next_generation += 1;
        let generation = self.next_generation;

        let tick = AlertTick {
            key: key.clone(),
            generation,
        };
        let ticks = self.ticks.clone();
        let period = self.period;
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if ticks.send(tick.clone()).is_err() {
                    break;
                }
            }
        });

        let alert = Alert {
            key: key.clone(),
            kind,
            zone: zone.to_string(),
            message: kind.message(zone),
            visible: true,
            raised_at: OffsetDateTime::now_utc(),
        };

        if let Some(previous) = self.alerts.insert(key.clone(), ActiveAlert { alert, generation, timer }) {
            previous.timer.abort();
        }

        &self.alerts[&key].alert
    }

    /// Cancels the timer and forgets the alert.
    pub fn clear(&mut self, key: &str) -> Option<Alert> {
        let active = self.alerts.remove(key)?;
        active.timer.abort();

        Some(active.alert)
    }

    /// Hides the notice until the next tick. The alert stays active.
    pub fn dismiss(&mut self, key: &str) -> Option<&Alert> {
        let active = self.alerts.get_mut(key)?;
        active.alert.visible = false;

        Some(&active.alert)
    }

    /// Shows the alert again, `None` for stale ticks.
    pub fn on_tick(&mut self, tick: &AlertTick) -> Option<&Alert> {
        let active = self
            .alerts
            .get_mut(&tick.key)
            .filter(|active| active.generation == tick.generation)?;
        active.alert.visible = true;

        Some(&active.alert)
    }

    pub fn get(&self, key: &str) -> Option<&Alert> {
        self.alerts.get(key).map(|active| &active.alert)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.values().map(|active| &active.alert)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Drop for AlertManager {
    fn drop(&mut self) {
        for active in self.alerts.values() {
            active.timer.abort();
        }
    }
}
