//! The rule-driven core.
//!
//! One task owns the device registry, the rule engine, the alert manager and
//! the online flag. Store notifications, alert ticks and user commands are
//! handled one at a time, so each reaction sees a consistent registry. Local
//! decisions are written to the store and come back through the watches like
//! any other change; the echo finds the registry already up to date.
//!
//! A snapshot read before one of those writes can still arrive after it. Until
//! the echo of a local write shows up, disagreeing statuses for that actuator
//! are stale and ignored.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde::Serialize;
use serde_json::{Map, Value};
use smartcity_api::models::{
    ActuatorStatus, Alert, AlertKind, Device, DeviceId, DeviceKind, DeviceRecord, NewDevice, RuleKind,
    RuleSet, RuleUpdate, SystemStatus,
};
use smartcity_api::paths::StorePaths;
use smartcity_api::store::{read_as, StateStore, StoreError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use utoipa::ToSchema;

use super::store_bridge::device_records;
use super::{
    topics, Actuation, AlertEvent, AlertManager, AlertTick, DeviceRegistry, EventBus, EventPayload,
    RuleEngine, StoreChange, Transition,
};
use crate::errors::{AlertError, ApiError, DeviceError, RuleError};

/// Where a status change was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Rules or a user action in this process; written to the store
    Local,
    /// Observed through a store watch; already persisted
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardSnapshot {
    pub online: bool,
    pub devices: Vec<Device>,
    pub rules: RuleSet,
    pub alerts: Vec<Alert>,
}

pub struct DashboardOptions {
    pub rules: RuleSet,
    pub seed: Vec<NewDevice>,
    pub alert_period: Duration,
    pub cascade_zone: String,
}

/// Event sources the core reacts to besides user commands.
pub struct DashboardInbox {
    store_events: broadcast::Receiver<EventPayload>,
    alert_ticks: mpsc::UnboundedReceiver<AlertTick>,
}

pub enum DashboardCommand {
    Snapshot {
        reply: oneshot::Sender<DashboardSnapshot>,
    },
    SetActuator {
        id: DeviceId,
        /// `None` toggles
        status: Option<ActuatorStatus>,
        reply: oneshot::Sender<Result<Device, DeviceError>>,
    },
    AddDevice {
        device: NewDevice,
        reply: oneshot::Sender<Result<Device, DeviceError>>,
    },
    RemoveDevice {
        id: DeviceId,
        reply: oneshot::Sender<Result<Device, DeviceError>>,
    },
    UpdateRule {
        kind: RuleKind,
        update: RuleUpdate,
        reply: oneshot::Sender<Result<RuleSet, RuleError>>,
    },
    DismissAlert {
        id: DeviceId,
        reply: oneshot::Sender<Result<Alert, AlertError>>,
    },
}

/// Cloneable front of the dashboard task used by the HTTP handlers.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<DashboardCommand>,
}

impl DashboardHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DashboardCommand>) {
        let (commands, receiver) = mpsc::channel(capacity);

        (Self { commands }, receiver)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> DashboardCommand,
    ) -> Result<T, ApiError> {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(command(reply))
            .await
            .map_err(|_| anyhow!("dashboard service is not running"))?;

        Ok(response
            .await
            .map_err(|_| anyhow!("dashboard service dropped the request"))?)
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, ApiError> {
        self.request(|reply| DashboardCommand::Snapshot { reply }).await
    }

    pub async fn set_actuator(&self, id: DeviceId, status: Option<ActuatorStatus>) -> Result<Device, ApiError> {
        Ok(self
            .request(|reply| DashboardCommand::SetActuator { id, status, reply })
            .await??)
    }

    pub async fn add_device(&self, device: NewDevice) -> Result<Device, ApiError> {
        Ok(self
            .request(|reply| DashboardCommand::AddDevice { device, reply })
            .await??)
    }

    pub async fn remove_device(&self, id: DeviceId) -> Result<Device, ApiError> {
        Ok(self
            .request(|reply| DashboardCommand::RemoveDevice { id, reply })
            .await??)
    }

    pub async fn update_rule(&self, kind: RuleKind, update: RuleUpdate) -> Result<RuleSet, ApiError> {
        Ok(self
            .request(|reply| DashboardCommand::UpdateRule { kind, update, reply })
            .await??)
    }

    pub async fn dismiss_alert(&self, id: DeviceId) -> Result<Alert, ApiError> {
        Ok(self
            .request(|reply| DashboardCommand::DismissAlert { id, reply })
            .await??)
    }
}

pub struct DashboardService {
    store: Arc<dyn StateStore>,
    paths: StorePaths,
    event_bus: Arc<EventBus>,
    registry: DeviceRegistry,
    rule_engine: RuleEngine,
    alerts: AlertManager,
    online: bool,
    seed: Vec<NewDevice>,
    /// Last status written locally per actuator, until the store echoes it
    unconfirmed: BTreeMap<DeviceId, ActuatorStatus>,
}

impl DashboardService {
    /// Subscribes to store changes right away, so nothing published after this
    /// returns is missed.
    pub async fn new(
        store: Arc<dyn StateStore>,
        paths: StorePaths,
        event_bus: Arc<EventBus>,
        options: DashboardOptions,
    ) -> (Self, DashboardInbox) {
        let store_events = event_bus.subscribe(topics::STORE_CHANGE).await;
        let (alerts, alert_ticks) = AlertManager::new(options.alert_period);

        (
            Self {
                store,
                paths,
                event_bus,
                registry: DeviceRegistry::new(),
                rule_engine: RuleEngine::new(options.rules, options.cascade_zone),
                alerts,
                online: false,
                seed: options.seed,
                unconfirmed: BTreeMap::new(),
            },
            DashboardInbox {
                store_events,
                alert_ticks,
            },
        )
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn rules(&self) -> &RuleSet {
        self.rule_engine.rules()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub async fn run(
        mut self,
        mut inbox: DashboardInbox,
        mut commands: mpsc::Receiver<DashboardCommand>,
    ) {
        tracing::info!("dashboard service started with {} devices", self.registry.len());

        loop {
            tokio::select! {
                event = inbox.store_events.recv() => match event {
                    Ok(EventPayload::StoreChange(change)) => self.apply_store_change(change).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("missed {} store changes, reloading", skipped);
                        self.hydrate().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(tick) = inbox.alert_ticks.recv() => self.handle_alert_tick(&tick).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        tracing::info!("dashboard service stopped");
    }

    async fn handle_command(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            DashboardCommand::SetActuator { id, status, reply } => {
                let _ = reply.send(self.set_actuator(&id, status).await);
            }
            DashboardCommand::AddDevice { device, reply } => {
                let _ = reply.send(self.add_device(device).await);
            }
            DashboardCommand::RemoveDevice { id, reply } => {
                let _ = reply.send(self.remove_device(&id).await);
            }
            DashboardCommand::UpdateRule { kind, update, reply } => {
                let _ = reply.send(self.update_rule(kind, update).await);
            }
            DashboardCommand::DismissAlert { id, reply } => {
                let _ = reply.send(self.dismiss_alert(&id).await);
            }
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            online: self.online,
            devices: self.registry.devices().cloned().collect(),
            rules: *self.rule_engine.rules(),
            alerts: self.alerts.alerts().cloned().collect(),
        }
    }

    /// Loads rules, status and devices from the store. Missing rules and an
    /// empty device tree are seeded from the configuration.
    pub async fn hydrate(&mut self) {
        match read_as::<RuleSet>(self.store.as_ref(), &self.paths.rules()).await {
            Ok(Some(rules)) => {
                self.rule_engine.set_rules(rules);
            }
            Ok(None) => {
                let rules = *self.rule_engine.rules();
                self.write_rules(&rules).await;
            }
            Err(e) => report("read rules", &e),
        }

        match read_as::<SystemStatus>(self.store.as_ref(), &self.paths.status()).await {
            Ok(status) => self.set_online(status.is_some_and(|status| status.is_online())),
            Err(e) => report("read status", &e),
        }

        match self.store.read(&self.paths.devices()).await {
            Ok(Some(Value::Object(mut devices))) => {
                let sensors = device_records(devices.remove("sensors"));
                let actuators = device_records(devices.remove("actuators"));
                self.load(DeviceKind::Sensor, sensors).await;
                self.load(DeviceKind::Actuator, actuators).await;
            }
            Ok(_) => self.seed_devices().await,
            Err(e) => report("read devices", &e),
        }

        tracing::info!(
            "hydrated {} devices, system {}",
            self.registry.len(),
            if self.online { "online" } else { "offline" }
        );

        let actuations = self.rule_engine.recheck(&self.registry);
        self.actuate(actuations).await;
        self.publish_summary().await;
    }

    /// Replaces the registry contents of one kind with the given records.
    async fn load(&mut self, kind: DeviceKind, records: BTreeMap<String, DeviceRecord>) {
        self.drop_missing(kind, &records).await;

        for (id, record) in records {
            let id = DeviceId::from(id);
            match self.registry.upsert_record(kind, &id, &record) {
                Some(device) => {
                    let device = device.clone();
                    self.publish_alert(&device).await;
                }
                None => tracing::warn!("skipping incomplete {:?} record `{}`", kind, id),
            }
        }
    }

    async fn seed_devices(&mut self) {
        let seed = std::mem::take(&mut self.seed);
        tracing::info!("no devices in the store, seeding {} from configuration", seed.len());

        for new_device in seed {
            let Some(device) = new_device.into_device() else {
                tracing::warn!("skipping seed entry without name or zone");
                continue;
            };
            if self.registry.contains(device.id.as_str()) {
                continue;
            }
            self.write_device(&device).await;
            self.registry.upsert(device);
        }
    }

    pub async fn apply_store_change(&mut self, change: StoreChange) {
        match change {
            StoreChange::Sensors(records) => {
                self.drop_missing(DeviceKind::Sensor, &records).await;
                for (id, record) in records {
                    self.apply_sensor_record(DeviceId::from(id), &record).await;
                }
            }
            StoreChange::Actuators(records) => {
                self.drop_missing(DeviceKind::Actuator, &records).await;
                for (id, record) in records {
                    self.apply_actuator_record(DeviceId::from(id), &record).await;
                }
            }
            StoreChange::Rules(Some(rules)) => {
                if self.rule_engine.set_rules(rules) {
                    tracing::info!("rules changed in the store, re-evaluating");
                    let actuations = self.rule_engine.recheck(&self.registry);
                    self.actuate(actuations).await;
                }
            }
            StoreChange::Rules(None) => {}
            StoreChange::Status(status) => {
                self.set_online(status.is_some_and(|status| status.is_online()));
            }
        }
    }

    async fn drop_missing(&mut self, kind: DeviceKind, records: &BTreeMap<String, DeviceRecord>) {
        for id in self.registry.ids(kind) {
            if !records.contains_key(id.as_str()) {
                tracing::info!("{} removed from the store", id);
                self.forget(&id).await;
            }
        }
    }

    async fn apply_sensor_record(&mut self, id: DeviceId, record: &DeviceRecord) {
        if let Some(known) = self.registry.get(id.as_str()) {
            if let Some(value) = record.value.as_deref().filter(|value| known.value() != Some(*value)) {
                self.apply_sensor_reading(&id, value).await;
            }
            return;
        }

        match self.registry.upsert_record(DeviceKind::Sensor, &id, record) {
            Some(device) => {
                let device = device.clone();
                tracing::info!("new sensor {} from the store", id);
                let actuations = self.rule_engine.evaluate(&device, &self.registry);
                self.actuate(actuations).await;
            }
            None => tracing::warn!("dropping update for unknown sensor {}", id),
        }
    }

    async fn apply_actuator_record(&mut self, id: DeviceId, record: &DeviceRecord) {
        if self.registry.contains(id.as_str()) {
            match record.status.as_deref().map(ActuatorStatus::parse) {
                Some(Some(status)) if self.is_stale(&id, status) => {
                    tracing::debug!("ignoring stale status {} for {}", status, id);
                }
                Some(Some(status)) => self.apply_actuator_status(&id, status).await,
                Some(None) => tracing::warn!("ignoring unknown status {:?} for {}", record.status, id),
                None => {}
            }
            return;
        }

        match self.registry.upsert_record(DeviceKind::Actuator, &id, record) {
            Some(device) => {
                let device = device.clone();
                tracing::info!("new actuator {} from the store", id);
                self.publish_alert(&device).await;
                let actuations = self.rule_engine.recheck(&self.registry);
                self.actuate(actuations).await;
                self.publish_summary().await;
            }
            None => tracing::warn!("dropping update for unknown actuator {}", id),
        }
    }

    /// Stores a new reading and runs the matching rule against it.
    pub async fn apply_sensor_reading(&mut self, id: &DeviceId, value: &str) {
        let Some(sensor) = self.registry.set_sensor_value(id.as_str(), value) else {
            tracing::warn!("dropping reading `{}` for unknown sensor {}", value, id);
            return;
        };
        let sensor = sensor.clone();

        let actuations = self.rule_engine.evaluate(&sensor, &self.registry);
        self.actuate(actuations).await;
    }

    /// Whether an observed status predates a local write not yet echoed back.
    /// The matching echo confirms the write.
    fn is_stale(&mut self, id: &DeviceId, observed: ActuatorStatus) -> bool {
        let Some(&written) = self.unconfirmed.get(id) else {
            return false;
        };
        if written != observed {
            return true;
        }

        self.unconfirmed.remove(id);
        false
    }

    /// Status observed in the store for a known actuator.
    pub async fn apply_actuator_status(&mut self, id: &DeviceId, status: ActuatorStatus) {
        self.transition(id, status, Origin::Remote).await;
    }

    /// Applies actuations and everything they cascade into.
    async fn actuate(&mut self, actuations: Vec<Actuation>) {
        let mut queue = VecDeque::from(actuations);

        while let Some(Actuation { id, status }) = queue.pop_front() {
            if let Some(device) = self.transition(&id, status, Origin::Local).await {
                queue.extend(self.rule_engine.cascade(&device, &self.registry));
            }
        }
    }

    /// Registry update plus its side effects. Returns the device when its
    /// status actually changed.
    async fn transition(&mut self, id: &DeviceId, status: ActuatorStatus, origin: Origin) -> Option<Device> {
        let device = match self.registry.set_actuator_status(id.as_str(), status) {
            Transition::Changed(device) => device,
            Transition::Unchanged => return None,
            Transition::Unknown => {
                tracing::warn!("dropping status {} for unknown actuator {}", status, id);
                return None;
            }
        };

        tracing::info!("{} is now {} ({:?})", device.id, status, origin);

        if origin == Origin::Local {
            let mut fields = Map::new();
            fields.insert("status".to_string(), Value::from(status.as_str()));
            match self.store.write_field(&self.paths.actuator(id), fields).await {
                Ok(()) => {
                    self.unconfirmed.insert(id.clone(), status);
                }
                Err(e) => {
                    self.unconfirmed.remove(id);
                    report("write actuator status", &e);
                }
            }
        }

        self.publish_alert(&device).await;
        self.publish_summary().await;

        Some(device)
    }

    /// Raises or clears the alert owned by `device` to match its status.
    fn sync_alert(&mut self, device: &Device) -> Option<AlertEvent> {
        let kind = AlertKind::for_actuator(&device.name)?;

        match device.status()? {
            ActuatorStatus::On => {
                let alert = self.alerts.raise(device.id.clone(), kind, &device.zone);
                tracing::warn!("{}", alert.message);
                Some(AlertEvent::Raised(alert.clone()))
            }
            ActuatorStatus::Off => self.alerts.clear(device.id.as_str()).map(AlertEvent::Cleared),
        }
    }

    async fn publish_alert(&mut self, device: &Device) {
        if let Some(event) = self.sync_alert(device) {
            self.event_bus.notify(topics::ALERT, EventPayload::Alert(event)).await;
        }
    }

    /// Drops a device from the registry along with its alert.
    async fn forget(&mut self, id: &DeviceId) -> Option<Device> {
        if let Some(alert) = self.alerts.clear(id.as_str()) {
            self.event_bus
                .notify(topics::ALERT, EventPayload::Alert(AlertEvent::Cleared(alert)))
                .await;
        }
        self.unconfirmed.remove(id);

        self.registry.remove(id.as_str())
    }

    pub async fn handle_alert_tick(&mut self, tick: &AlertTick) {
        if let Some(alert) = self.alerts.on_tick(tick) {
            tracing::warn!("{}", alert.message);
            let event = AlertEvent::Shown(alert.clone());
            self.event_bus.notify(topics::ALERT, EventPayload::Alert(event)).await;
        }
    }

    /// Manual switch. `None` toggles the current status.
    pub async fn set_actuator(&mut self, id: &DeviceId, status: Option<ActuatorStatus>) -> Result<Device, DeviceError> {
        if !self.online {
            return Err(DeviceError::SystemOffline);
        }
        let current = self
            .registry
            .get(id.as_str())
            .ok_or(DeviceError::DeviceNotFound)?
            .status()
            .ok_or(DeviceError::NotAnActuator)?;

        let target = status.unwrap_or(current.toggled());
        self.actuate(vec![Actuation {
            id: id.clone(),
            status: target,
        }])
        .await;

        self.registry
            .get(id.as_str())
            .cloned()
            .ok_or(DeviceError::DeviceNotFound)
    }

    pub async fn add_device(&mut self, new_device: NewDevice) -> Result<Device, DeviceError> {
        let device = new_device.into_device().ok_or(DeviceError::InvalidRequest)?;
        if self.registry.contains(device.id.as_str()) {
            return Err(DeviceError::DeviceExists);
        }

        self.write_device(&device).await;
        self.registry.upsert(device.clone());
        tracing::info!("added {:?} {}", device.kind(), device.id);

        let actuations = self.rule_engine.recheck(&self.registry);
        self.actuate(actuations).await;
        self.publish_summary().await;

        self.registry
            .get(device.id.as_str())
            .cloned()
            .ok_or(DeviceError::DeviceNotFound)
    }

    pub async fn remove_device(&mut self, id: &DeviceId) -> Result<Device, DeviceError> {
        let device = self.forget(id).await.ok_or(DeviceError::DeviceNotFound)?;

        let path = match device.kind() {
            DeviceKind::Sensor => self.paths.sensor(id),
            DeviceKind::Actuator => self.paths.actuator(id),
        };
        if let Err(e) = self.store.remove(&path).await {
            report("remove device", &e);
        }
        tracing::info!("removed {}", id);
        self.publish_summary().await;

        Ok(device)
    }

    pub async fn update_rule(&mut self, kind: RuleKind, update: RuleUpdate) -> Result<RuleSet, RuleError> {
        let rules = *self.rule_engine.update(kind, update)?;
        tracing::info!("{:?} rule updated", kind);

        self.write_rules(&rules).await;
        let actuations = self.rule_engine.recheck(&self.registry);
        self.actuate(actuations).await;

        Ok(rules)
    }

    pub async fn dismiss_alert(&mut self, id: &DeviceId) -> Result<Alert, AlertError> {
        let alert = self
            .alerts
            .dismiss(id.as_str())
            .cloned()
            .ok_or(AlertError::AlertNotFound)?;

        self.event_bus
            .notify(topics::ALERT, EventPayload::Alert(AlertEvent::Dismissed(alert.clone())))
            .await;

        Ok(alert)
    }

    fn set_online(&mut self, online: bool) {
        if self.online != online {
            tracing::info!("system is now {}", if online { "online" } else { "offline" });
        }
        self.online = online;
    }

    async fn publish_summary(&self) {
        self.event_bus
            .notify(topics::SUMMARY, EventPayload::Summary(self.registry.summary()))
            .await;
    }

    async fn write_device(&self, device: &Device) {
        let path = match device.kind() {
            DeviceKind::Sensor => self.paths.sensor(&device.id),
            DeviceKind::Actuator => self.paths.actuator(&device.id),
        };

        let result = match serde_json::to_value(device.to_record()) {
            Ok(record) => self.store.write_whole(&path, record).await,
            Err(e) => Err(StoreError::from(e)),
        };
        if let Err(e) = result {
            report("write device", &e);
        }
    }

    async fn write_rules(&self, rules: &RuleSet) {
        let result = match serde_json::to_value(rules) {
            Ok(rules) => self.store.write_whole(&self.paths.rules(), rules).await,
            Err(e) => Err(StoreError::from(e)),
        };
        if let Err(e) = result {
            report("write rules", &e);
        }
    }
}

/// Store failures never stop the core; the display just goes stale.
fn report(action: &str, error: &StoreError) {
    if error.is_permission_denied() {
        tracing::warn!("failed to {}: {}", action, error);
    } else {
        tracing::error!("failed to {}: {}", action, error);
    }
}
