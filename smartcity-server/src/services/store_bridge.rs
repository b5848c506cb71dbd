use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use smartcity_api::models::DeviceRecord;
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{StateStore, StoreError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{StreamExt, StreamMap};

use super::{topics, EventBus, EventPayload, StoreChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Sensors,
    Actuators,
    Rules,
    Status,
}

/// Turns store watches into typed [`StoreChange`] events on the bus.
pub struct StoreBridge {
    store: Arc<dyn StateStore>,
    paths: StorePaths,
    event_bus: Arc<EventBus>,
}

impl StoreBridge {
    pub fn new(store: Arc<dyn StateStore>, paths: StorePaths, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            paths,
            event_bus,
        }
    }

    /// Opens the watches and forwards their notifications until they all close.
    pub async fn start(self) -> Result<JoinHandle<()>, StoreError> {
        let mut streams = StreamMap::new();

        for (channel, path) in [
            (Channel::Sensors, self.paths.sensors()),
            (Channel::Actuators, self.paths.actuators()),
            (Channel::Rules, self.paths.rules()),
            (Channel::Status, self.paths.status()),
        ] {
            let watch = self.store.watch(&path).await?;
            tracing::debug!("watching `{}`", path);
            streams.insert(channel, UnboundedReceiverStream::new(watch.receiver));
        }

        Ok(tokio::spawn(async move {
            while let Some((channel, value)) = streams.next().await {
                match decode(channel, value) {
                    Ok(change) => {
                        self.event_bus
                            .notify(topics::STORE_CHANGE, EventPayload::StoreChange(change))
                            .await
                    }
                    Err(e) => tracing::warn!("ignoring malformed {:?} document: {}", channel, e),
                }
            }

            tracing::warn!("{}", StoreError::WatchClosed(self.paths.root().to_string()));
        }))
    }
}

fn decode(channel: Channel, value: Option<Value>) -> Result<StoreChange, serde_json::Error> {
    Ok(match channel {
        Channel::Sensors => StoreChange::Sensors(device_records(value)),
        Channel::Actuators => StoreChange::Actuators(device_records(value)),
        Channel::Rules => StoreChange::Rules(value.map(serde_json::from_value).transpose()?),
        Channel::Status => StoreChange::Status(value.map(serde_json::from_value).transpose()?),
    })
}

/// Device records keyed by store id. Malformed entries are skipped; an array
/// (what the store returns for small integer keys) is keyed by index.
pub fn device_records(value: Option<Value>) -> BTreeMap<String, DeviceRecord> {
    let entries: Vec<(String, Value)> = match value {
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(id, value)| match serde_json::from_value::<DeviceRecord>(value) {
            Ok(record) => Some((id, record)),
            Err(e) => {
                tracing::warn!("skipping malformed device record `{}`: {}", id, e);
                None
            }
        })
        .collect()
}
