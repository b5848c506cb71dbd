//! Device type names understood by the dashboard.
//!
//! Rules and alerts match devices by exact name, so these strings are part of
//! the store format.

pub const TEMPERATURE: &str = "Temperatura";
pub const HUMIDITY: &str = "Humidade";
pub const LUMINOSITY: &str = "Luminosidade";
pub const AIR_QUALITY: &str = "Qualidade do Ar";
pub const NOISE: &str = "Ruído";
pub const SOIL_MOISTURE: &str = "Humidade do Solo";

pub const PUBLIC_LIGHTING: &str = "Iluminação Pública";
pub const IRRIGATION: &str = "Sistema de Rega";
pub const SECURITY_CAMERAS: &str = "Câmaras de Segurança";
pub const VENTILATION: &str = "Ventilação";
pub const ALERT_SYSTEM: &str = "Sistema de Alerta";
pub const POLLUTION_ALERT: &str = "Alerta de Poluição";
pub const NOISE_ALERT: &str = "Alerta de Ruído";

pub struct SensorType {
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: &'static str,
}

pub struct ActuatorType {
    pub name: &'static str,
    pub icon: &'static str,
}

pub const SENSOR_TYPES: &[SensorType] = &[
    SensorType { name: TEMPERATURE, icon: "bi bi-thermometer", unit: "°C" },
    SensorType { name: HUMIDITY, icon: "bi bi-droplet", unit: "%" },
    SensorType { name: LUMINOSITY, icon: "bi bi-brightness-high", unit: "lux" },
    SensorType { name: AIR_QUALITY, icon: "bi bi-wind", unit: "" },
    SensorType { name: NOISE, icon: "bi bi-volume-up", unit: "dB" },
    SensorType { name: SOIL_MOISTURE, icon: "bi bi-moisture", unit: "%" },
];

pub const ACTUATOR_TYPES: &[ActuatorType] = &[
    ActuatorType { name: PUBLIC_LIGHTING, icon: "bi bi-lightbulb-fill" },
    ActuatorType { name: IRRIGATION, icon: "bi bi-droplet-fill" },
    ActuatorType { name: SECURITY_CAMERAS, icon: "bi bi-camera-video" },
    ActuatorType { name: VENTILATION, icon: "bi bi-fan" },
    ActuatorType { name: ALERT_SYSTEM, icon: "bi bi-exclamation-triangle" },
    ActuatorType { name: POLLUTION_ALERT, icon: "bi bi-cloud-haze2" },
    ActuatorType { name: NOISE_ALERT, icon: "bi bi-megaphone" },
];

const FALLBACK_ICON: &str = "bi bi-cpu";

pub fn default_icon(name: &str) -> &'static str {
    SENSOR_TYPES
        .iter()
        .map(|sensor| (sensor.name, sensor.icon))
        .chain(ACTUATOR_TYPES.iter().map(|actuator| (actuator.name, actuator.icon)))
        .find(|(known, _)| *known == name)
        .map(|(_, icon)| icon)
        .unwrap_or(FALLBACK_ICON)
}

pub fn sensor_unit(name: &str) -> Option<&'static str> {
    SENSOR_TYPES
        .iter()
        .find(|sensor| sensor.name == name)
        .map(|sensor| sensor.unit)
}
