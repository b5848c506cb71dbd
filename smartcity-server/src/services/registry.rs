use std::collections::BTreeMap;

use smartcity_api::models::{ActuatorStatus, Device, DeviceId, DeviceKind, DeviceRecord, DeviceState};

use super::DeviceSummary;

/// Outcome of writing an actuator status into the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unknown,
    Unchanged,
    Changed(Device),
}

/// Last known state of every device, keyed by id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a device, returning the previous entry.
    pub fn upsert(&mut self, device: Device) -> Option<Device> {
        self.devices.insert(device.id.clone(), device)
    }

    /// Builds the device from a store record and upserts it. Records missing a
    /// required field are ignored.
    pub fn upsert_record(&mut self, kind: DeviceKind, id: &DeviceId, record: &DeviceRecord) -> Option<&Device> {
        let device = Device::from_record(kind, id, record)?;
        self.devices.insert(id.clone(), device);

        self.devices.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Device> {
        self.devices.remove(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn ids(&self, kind: DeviceKind) -> Vec<DeviceId> {
        self.devices
            .values()
            .filter(|device| device.kind() == kind)
            .map(|device| device.id.clone())
            .collect()
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Device> {
        self.devices.values().filter(|device| device.kind() == DeviceKind::Sensor)
    }

    /// Actuators called `name` in `zone`.
    pub fn actuators_named<'a>(&'a self, name: &'a str, zone: &'a str) -> impl Iterator<Item = &'a Device> {
        self.devices.values().filter(move |device| {
            device.kind() == DeviceKind::Actuator && device.name == name && device.zone == zone
        })
    }

    /// Overwrites a sensor reading. `None` when the id is unknown or not a sensor.
    pub fn set_sensor_value(&mut self, id: &str, value: &str) -> Option<&Device> {
        let device = self.devices.get_mut(id)?;
        let DeviceState::Sensor { value: current } = &mut device.state else {
            return None;
        };
        *current = value.to_string();

        Some(&*device)
    }

    pub fn set_actuator_status(&mut self, id: &str, status: ActuatorStatus) -> Transition {
        let Some(device) = self.devices.get_mut(id) else {
            return Transition::Unknown;
        };
        let DeviceState::Actuator { status: current } = &mut device.state else {
            return Transition::Unknown;
        };
        if *current == status {
            return Transition::Unchanged;
        }
        *current = status;

        Transition::Changed(device.clone())
    }

    pub fn summary(&self) -> DeviceSummary {
        self.devices
            .values()
            .fold(DeviceSummary::default(), |mut summary, device| {
                match device.status() {
                    None => summary.sensors += 1,
                    Some(status) => {
                        summary.actuators += 1;
                        if status.is_on() {
                            summary.active += 1;
                        }
                    }
                }
                summary
            })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
