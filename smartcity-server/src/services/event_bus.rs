use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smartcity_api::models::{Alert, DeviceRecord, RuleSet, SystemStatus, Weather};
use tokio::sync::{broadcast, RwLock};

use super::DisplaySnapshot;

pub mod topics {
    /// [`super::StoreChange`] decoded from store watches
    pub const STORE_CHANGE: &str = "store.change";
    /// [`super::AlertEvent`] lifecycle notifications
    pub const ALERT: &str = "alert";
    /// [`super::DeviceSummary`] after every actuator change
    pub const SUMMARY: &str = "dashboard.summary";
    /// Projected display rows
    pub const DISPLAY: &str = "display";
    pub const WEATHER: &str = "weather";
}

/// Full snapshot of one watched store path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreChange {
    Sensors(BTreeMap<String, DeviceRecord>),
    Actuators(BTreeMap<String, DeviceRecord>),
    Rules(Option<RuleSet>),
    Status(Option<SystemStatus>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "alert", rename_all = "lowercase")]
pub enum AlertEvent {
    Raised(Alert),
    /// Periodic re-announcement, also brings a dismissed notice back
    Shown(Alert),
    Dismissed(Alert),
    Cleared(Alert),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub sensors: usize,
    pub actuators: usize,
    /// Actuators currently on
    pub active: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EventPayload {
    StoreChange(StoreChange),
    Alert(AlertEvent),
    Summary(DeviceSummary),
    Display(DisplaySnapshot),
    Weather(Weather),
}

pub struct EventBus {
    publishers: Arc<RwLock<HashMap<String, broadcast::Sender<EventPayload>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            publishers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: EventPayload,
    ) -> Result<usize, broadcast::error::SendError<EventPayload>> {
        self.sender(topic).await.send(payload)
    }

    /// Publishes without caring whether anyone listens.
    pub async fn notify(&self, topic: &str, payload: EventPayload) {
        if self.publish(topic, payload).await.is_err() {
            tracing::trace!("no subscribers on `{}`", topic);
        }
    }

    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<EventPayload> {
        self.sender(topic).await.subscribe()
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<EventPayload> {
        let mut publishers = self.publishers.write().await;
        publishers
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
