use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{DeviceId, ALERT_SYSTEM, NOISE_ALERT, POLLUTION_ALERT};

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Air,
    Noise,
    Informational,
}

impl AlertKind {
    /// Alert raised while an actuator of this name is on, if any.
    pub fn for_actuator(name: &str) -> Option<Self> {
        match name {
            POLLUTION_ALERT => Some(AlertKind::Air),
            NOISE_ALERT => Some(AlertKind::Noise),
            ALERT_SYSTEM => Some(AlertKind::Informational),
            _ => None,
        }
    }

    pub fn message(self, zone: &str) -> String {
        match self {
            AlertKind::Air => format!("Poor air quality detected in {zone}"),
            AlertKind::Noise => format!("Noise above the allowed level in {zone}"),
            AlertKind::Informational => format!("Alert system active in {zone}"),
        }
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Actuator that owns the alert
    pub key: DeviceId,
    pub kind: AlertKind,
    pub zone: String,
    pub message: String,
    /// Whether the notice is currently shown (false after a dismiss)
    pub visible: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub raised_at: OffsetDateTime,
}
