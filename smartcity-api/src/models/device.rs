use std::borrow::Borrow;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use super::{default_icon, timestamp_now};

/// Stable device identifier, `<AlphanumericName>_<AlphanumericZone>`.
///
/// Derived from name and zone only, so re-deriving it for the same pair always
/// yields the same key in the store.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn derive(name: &str, zone: &str) -> Self {
        fn alphanumeric(text: &str) -> String {
            text.chars().filter(|c| c.is_alphanumeric()).collect()
        }

        Self(format!("{}_{}", alphanumeric(name), alphanumeric(zone)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Sensor,
    Actuator,
}

/// On/Off state of an actuator.
///
/// Written to the store as `"Ligado"` / `"Desligado"`. Reads also accept the
/// English forms and the legacy `"Ativo"` value, which all ingestion paths
/// normalize to [`ActuatorStatus::On`].
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorStatus {
    #[cfg_attr(feature = "docs", schema(rename = "Ligado"))]
    On,
    #[cfg_attr(feature = "docs", schema(rename = "Desligado"))]
    Off,
}

impl ActuatorStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActuatorStatus::On => "Ligado",
            ActuatorStatus::Off => "Desligado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ligado" | "on" | "ativo" | "active" | "1" | "true" => Some(ActuatorStatus::On),
            "desligado" | "off" | "inativo" | "inactive" | "0" | "false" => Some(ActuatorStatus::Off),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ActuatorStatus::On => ActuatorStatus::Off,
            ActuatorStatus::Off => ActuatorStatus::On,
        }
    }

    pub fn is_on(self) -> bool {
        self == ActuatorStatus::On
    }
}

impl From<bool> for ActuatorStatus {
    fn from(on: bool) -> Self {
        if on { ActuatorStatus::On } else { ActuatorStatus::Off }
    }
}

impl fmt::Display for ActuatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActuatorStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActuatorStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ActuatorStatus::parse(&value)
            .ok_or_else(|| de::Error::custom(format!("unknown actuator status `{value}`")))
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceState {
    /// Last reading, magnitude followed by unit (`"23.4 °C"`)
    Sensor { value: String },
    /// Current switch position
    Actuator { status: ActuatorStatus },
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier derived from name and zone
    pub id: DeviceId,
    /// Device type name, e.g. `Luminosidade` or `Iluminação Pública`
    pub name: String,
    /// Zone the device belongs to
    pub zone: String,
    /// Icon class shown next to the device
    pub icon: String,
    /// Sensor reading or actuator status
    #[serde(flatten)]
    pub state: DeviceState,
}

impl Device {
    pub fn sensor(name: &str, zone: &str, value: &str) -> Self {
        Self {
            id: DeviceId::derive(name, zone),
            name: name.to_string(),
            zone: zone.to_string(),
            icon: default_icon(name).to_string(),
            state: DeviceState::Sensor { value: value.to_string() },
        }
    }

    pub fn actuator(name: &str, zone: &str, status: ActuatorStatus) -> Self {
        Self {
            id: DeviceId::derive(name, zone),
            name: name.to_string(),
            zone: zone.to_string(),
            icon: default_icon(name).to_string(),
            state: DeviceState::Actuator { status },
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self.state {
            DeviceState::Sensor { .. } => DeviceKind::Sensor,
            DeviceState::Actuator { .. } => DeviceKind::Actuator,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.state {
            DeviceState::Sensor { value } => Some(value),
            DeviceState::Actuator { .. } => None,
        }
    }

    pub fn status(&self) -> Option<ActuatorStatus> {
        match self.state {
            DeviceState::Actuator { status } => Some(status),
            DeviceState::Sensor { .. } => None,
        }
    }

    /// Builds a device from a store record, `None` when a required field is missing.
    pub fn from_record(kind: DeviceKind, id: &DeviceId, record: &DeviceRecord) -> Option<Self> {
        let name = record.name.as_deref().filter(|name| !name.trim().is_empty())?;
        let zone = record.zone.as_deref().filter(|zone| !zone.trim().is_empty())?;

        let state = match kind {
            DeviceKind::Sensor => DeviceState::Sensor {
                value: record.value.clone()?,
            },
            DeviceKind::Actuator => DeviceState::Actuator {
                status: ActuatorStatus::parse(record.status.as_deref()?)?,
            },
        };

        Some(Self {
            id: id.clone(),
            name: name.to_string(),
            zone: zone.to_string(),
            icon: record
                .icon
                .clone()
                .unwrap_or_else(|| default_icon(name).to_string()),
            state,
        })
    }

    pub fn to_record(&self) -> DeviceRecord {
        let (value, status) = match &self.state {
            DeviceState::Sensor { value } => (Some(value.clone()), None),
            DeviceState::Actuator { status } => (None, Some(status.as_str().to_string())),
        };

        DeviceRecord {
            id: Some(self.id.to_string()),
            name: Some(self.name.clone()),
            zone: Some(self.zone.clone()),
            zone_id: Some(zone_slug(&self.zone)),
            icon: Some(self.icon.clone()),
            value,
            status,
            data_time: Some(timestamp_now()),
        }
    }
}

/// Leading numeric part of a reading such as `"23.4 °C"` or `"350 lux"`.
pub fn parse_magnitude(value: &str) -> Option<f64> {
    let number: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    number.parse::<f64>().ok().filter(|magnitude| magnitude.is_finite())
}

/// Lower-case, dash-separated zone key (`"Zona Industrial"` -> `"zona-industrial"`).
pub fn zone_slug(zone: &str) -> String {
    zone.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Device document as it sits in the remote store.
///
/// Every field is optional: records written by field updates (e.g. a simulator
/// that only pushes `value` and `dataTime`) may be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_time: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    /// Sensor or actuator
    pub kind: DeviceKind,
    /// Device type name
    pub name: String,
    /// Target zone
    pub zone: String,
    /// Icon class, defaults to the catalogue icon for the name
    #[serde(default)]
    pub icon: Option<String>,
    /// Initial reading for sensors
    #[serde(default)]
    pub value: Option<String>,
}

impl NewDevice {
    /// `None` when name or zone is blank.
    pub fn into_device(self) -> Option<Device> {
        let name = self.name.trim();
        let zone = self.zone.trim();
        if name.is_empty() || zone.is_empty() {
            return None;
        }

        let mut device = match self.kind {
            DeviceKind::Sensor => Device::sensor(name, zone, self.value.as_deref().unwrap_or("--")),
            DeviceKind::Actuator => Device::actuator(name, zone, ActuatorStatus::Off),
        };
        if let Some(icon) = self.icon.filter(|icon| !icon.trim().is_empty()) {
            device.icon = icon;
        }

        Some(device)
    }
}
