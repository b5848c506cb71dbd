use serde::{Deserialize, Serialize};

use super::{
    parse_magnitude, ActuatorStatus, AIR_QUALITY, IRRIGATION, LUMINOSITY, NOISE, NOISE_ALERT,
    POLLUTION_ALERT, PUBLIC_LIGHTING, SOIL_MOISTURE,
};

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Lighting,
    Irrigation,
    AirQuality,
    Noise,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [
        RuleKind::Lighting,
        RuleKind::Irrigation,
        RuleKind::AirQuality,
        RuleKind::Noise,
    ];

    pub const fn sensor_kind(self) -> &'static str {
        match self {
            RuleKind::Lighting => LUMINOSITY,
            RuleKind::Irrigation => SOIL_MOISTURE,
            RuleKind::AirQuality => AIR_QUALITY,
            RuleKind::Noise => NOISE,
        }
    }

    pub const fn actuator_kind(self) -> &'static str {
        match self {
            RuleKind::Lighting => PUBLIC_LIGHTING,
            RuleKind::Irrigation => IRRIGATION,
            RuleKind::AirQuality => POLLUTION_ALERT,
            RuleKind::Noise => NOISE_ALERT,
        }
    }

    /// Exact name match, no pattern matching.
    pub fn for_sensor(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.sensor_kind() == name)
    }
}

/// Categorical air quality reading, ordered by severity.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AirQualityLevel {
    #[serde(rename = "boa", alias = "good")]
    Good,
    #[serde(rename = "moderada", alias = "moderate")]
    Moderate,
    #[serde(rename = "má", alias = "ma", alias = "bad")]
    Bad,
}

impl AirQualityLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "boa" | "good" => Some(AirQualityLevel::Good),
            "moderada" | "moderate" => Some(AirQualityLevel::Moderate),
            "má" | "ma" | "bad" => Some(AirQualityLevel::Bad),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AirQualityLevel::Good => "Boa",
            AirQualityLevel::Moderate => "Moderada",
            AirQualityLevel::Bad => "Má",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparator {
    GreaterThan(f64),
    LessThan(f64),
    AtLeast(AirQualityLevel),
}

/// One rule binding a sensor kind to an actuator kind in the same zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub kind: RuleKind,
    pub active: bool,
    pub comparator: Comparator,
}

impl Rule {
    /// Target actuator status for a reading, `None` when the reading does not parse.
    pub fn decide(&self, reading: &str) -> Option<ActuatorStatus> {
        let on = match self.comparator {
            Comparator::GreaterThan(threshold) => parse_magnitude(reading)? > threshold,
            Comparator::LessThan(threshold) => parse_magnitude(reading)? < threshold,
            Comparator::AtLeast(level) => AirQualityLevel::parse(reading)? >= level,
        };

        Some(on.into())
    }
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRule {
    pub active: bool,
    pub threshold: f64,
}

#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRule {
    pub active: bool,
    pub level: AirQualityLevel,
}

/// Rule parameters as stored under `root/rules`.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSet {
    /// Luminosity in lux above which public lighting is switched on
    pub lighting: NumericRule,
    /// Soil moisture percentage below which irrigation runs
    pub irrigation: NumericRule,
    /// Minimum air quality severity that raises the pollution alert
    pub air_quality: LevelRule,
    /// Noise level in dB above which the noise alert is raised
    pub noise: NumericRule,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            lighting: NumericRule { active: true, threshold: 300.0 },
            irrigation: NumericRule { active: true, threshold: 30.0 },
            air_quality: LevelRule { active: true, level: AirQualityLevel::Moderate },
            noise: NumericRule { active: true, threshold: 70.0 },
        }
    }
}

impl RuleSet {
    pub fn rule(&self, kind: RuleKind) -> Rule {
        let (active, comparator) = match kind {
            RuleKind::Lighting => (self.lighting.active, Comparator::GreaterThan(self.lighting.threshold)),
            RuleKind::Irrigation => (self.irrigation.active, Comparator::LessThan(self.irrigation.threshold)),
            RuleKind::AirQuality => (self.air_quality.active, Comparator::AtLeast(self.air_quality.level)),
            RuleKind::Noise => (self.noise.active, Comparator::GreaterThan(self.noise.threshold)),
        };

        Rule { kind, active, comparator }
    }

    pub fn rule_for_sensor(&self, sensor_name: &str) -> Option<Rule> {
        RuleKind::for_sensor(sensor_name).map(|kind| self.rule(kind))
    }
}

/// Partial rule change; absent fields keep their value.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub level: Option<AirQualityLevel>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_lighting_turns_on_above_threshold() {
        let rule = RuleSet::default().rule(RuleKind::Lighting);

        assert_eq!(rule.decide("250 lux"), Some(ActuatorStatus::Off));
        assert_eq!(rule.decide("300 lux"), Some(ActuatorStatus::Off));
        assert_eq!(rule.decide("350 lux"), Some(ActuatorStatus::On));
        assert_eq!(rule.decide("-- lux"), None);
    }

    #[test]
    fn test_irrigation_turns_on_below_threshold() {
        let rule = RuleSet::default().rule(RuleKind::Irrigation);

        assert_eq!(rule.decide("12.5 %"), Some(ActuatorStatus::On));
        assert_eq!(rule.decide("30.0 %"), Some(ActuatorStatus::Off));
        assert_eq!(rule.decide("55 %"), Some(ActuatorStatus::Off));
    }

    #[test]
    fn test_air_quality_severity() {
        let mut rules = RuleSet::default();
        let moderate = rules.rule(RuleKind::AirQuality);

        assert_eq!(moderate.decide("Boa"), Some(ActuatorStatus::Off));
        assert_eq!(moderate.decide("Moderada"), Some(ActuatorStatus::On));
        assert_eq!(moderate.decide("má"), Some(ActuatorStatus::On));
        assert_eq!(moderate.decide("42.0"), None);

        rules.air_quality.level = AirQualityLevel::Bad;
        let bad = rules.rule(RuleKind::AirQuality);

        assert_eq!(bad.decide("Moderada"), Some(ActuatorStatus::Off));
        assert_eq!(bad.decide("Má"), Some(ActuatorStatus::On));
    }

    #[test]
    fn test_rule_lookup_is_exact() {
        let rules = RuleSet::default();

        assert_eq!(rules.rule_for_sensor("Ruído").map(|rule| rule.kind), Some(RuleKind::Noise));
        assert!(rules.rule_for_sensor("ruído").is_none());
        assert!(rules.rule_for_sensor("Luminosidade Norte").is_none());
        assert!(rules.rule_for_sensor("Temperatura").is_none());
    }

    #[test]
    fn test_partial_rule_document() {
        let rules: RuleSet = serde_json::from_value(json!({
            "lighting": { "active": false, "threshold": 450.0 },
            "airQuality": { "active": true, "level": "má" }
        }))
        .unwrap();

        assert!(!rules.lighting.active);
        assert_eq!(rules.lighting.threshold, 450.0);
        assert_eq!(rules.air_quality.level, AirQualityLevel::Bad);
        assert_eq!(rules.noise, RuleSet::default().noise);
    }
}
