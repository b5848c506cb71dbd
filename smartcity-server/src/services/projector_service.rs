use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smartcity_api::models::{default_icon, ActuatorStatus, Alert, DeviceKind, DeviceRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use super::{topics, AlertEvent, EventBus, EventPayload, StoreChange};

pub const OFFLINE: &str = "Offline";

/// One line of the device table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisplayRow {
    pub id: String,
    pub kind: DeviceKind,
    pub name: String,
    pub zone: String,
    pub icon: String,
    /// Sensor reading, actuator status, or `Offline` while the system is down
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisplaySnapshot {
    pub online: bool,
    pub rows: Vec<DisplayRow>,
    /// Alerts whose notice is currently shown
    pub alerts: Vec<Alert>,
}

/// Read model built purely from store notifications and alert events.
#[derive(Debug, Default)]
pub struct DisplayView {
    online: bool,
    sensors: BTreeMap<String, DisplayRow>,
    actuators: BTreeMap<String, DisplayRow>,
    alerts: BTreeMap<String, Alert>,
}

impl DisplayView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one bus event into the view, returns whether it changed.
    pub fn apply(&mut self, payload: &EventPayload) -> bool {
        match payload {
            EventPayload::StoreChange(StoreChange::Sensors(records)) => {
                let rows = project(DeviceKind::Sensor, records, &self.sensors);
                replace(&mut self.sensors, rows)
            }
            EventPayload::StoreChange(StoreChange::Actuators(records)) => {
                let rows = project(DeviceKind::Actuator, records, &self.actuators);
                replace(&mut self.actuators, rows)
            }
            EventPayload::StoreChange(StoreChange::Status(status)) => {
                let online = status.as_ref().is_some_and(|status| status.is_online());
                replace(&mut self.online, online)
            }
            EventPayload::Alert(event) => self.apply_alert(event),
            _ => false,
        }
    }

    fn apply_alert(&mut self, event: &AlertEvent) -> bool {
        match event {
            AlertEvent::Raised(alert) | AlertEvent::Shown(alert) | AlertEvent::Dismissed(alert) => {
                let key = alert.key.to_string();
                let changed = self.alerts.get(&key) != Some(alert);
                self.alerts.insert(key, alert.clone());
                changed
            }
            AlertEvent::Cleared(alert) => self.alerts.remove(alert.key.as_str()).is_some(),
        }
    }

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn rows(&self) -> Vec<DisplayRow> {
        self.sensors
            .values()
            .chain(self.actuators.values())
            .map(|row| {
                let mut row = row.clone();
                if !self.online {
                    row.state = OFFLINE.to_string();
                }
                row
            })
            .collect()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            online: self.online,
            rows: self.rows(),
            alerts: self
                .alerts
                .values()
                .filter(|alert| alert.visible)
                .cloned()
                .collect(),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;

    true
}

/// Rows for a full snapshot of one device list. Partial records borrow the
/// missing descriptive fields from the previous row for the same id.
fn project(
    kind: DeviceKind,
    records: &BTreeMap<String, DeviceRecord>,
    previous: &BTreeMap<String, DisplayRow>,
) -> BTreeMap<String, DisplayRow> {
    records
        .iter()
        .filter_map(|(id, record)| {
            let known = previous.get(id);
            let name = record.name.clone().or_else(|| known.map(|row| row.name.clone()))?;
            let zone = record.zone.clone().or_else(|| known.map(|row| row.zone.clone()))?;
            let icon = record
                .icon
                .clone()
                .or_else(|| known.map(|row| row.icon.clone()))
                .unwrap_or_else(|| default_icon(&name).to_string());
            let state = match kind {
                DeviceKind::Sensor => record.value.clone().unwrap_or_else(|| "--".to_string()),
                DeviceKind::Actuator => match record.status.as_deref() {
                    Some(status) => ActuatorStatus::parse(status)
                        .map(|status| status.as_str().to_string())
                        .unwrap_or_else(|| status.to_string()),
                    None => ActuatorStatus::Off.as_str().to_string(),
                },
            };

            Some((
                id.clone(),
                DisplayRow {
                    id: id.clone(),
                    kind,
                    name,
                    zone,
                    icon,
                    state,
                },
            ))
        })
        .collect()
}

/// Keeps a [`DisplayView`] current and republishes it on the display topic.
pub struct ProjectorService {
    view: Arc<RwLock<DisplayView>>,
    event_bus: Arc<EventBus>,
}

impl ProjectorService {
    pub fn new(view: Arc<RwLock<DisplayView>>, event_bus: Arc<EventBus>) -> Self {
        Self { view, event_bus }
    }

    pub async fn start(self) -> JoinHandle<()> {
        let mut store_events = self.event_bus.subscribe(topics::STORE_CHANGE).await;
        let mut alert_events = self.event_bus.subscribe(topics::ALERT).await;

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = store_events.recv() => event,
                    event = alert_events.recv() => event,
                };

                match event {
                    Ok(payload) => self.project(&payload).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("display projection skipped {} events", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn project(&self, payload: &EventPayload) {
        let snapshot = {
            let mut view = self.view.write().await;
            if !view.apply(payload) {
                return;
            }
            view.snapshot()
        };

        self.event_bus
            .notify(topics::DISPLAY, EventPayload::Display(snapshot))
            .await;
    }
}
