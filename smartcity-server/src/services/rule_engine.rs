use std::collections::BTreeMap;

use smartcity_api::models::{
    ActuatorStatus, Device, DeviceId, RuleKind, RuleSet, RuleUpdate, POLLUTION_ALERT, VENTILATION,
};

use super::DeviceRegistry;
use crate::errors::RuleError;

/// Requested status change for one actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actuation {
    pub id: DeviceId,
    pub status: ActuatorStatus,
}

/// Decides actuator targets from sensor readings.
///
/// The engine never mutates the registry: it returns the actuations whose
/// target differs from the cached status and leaves applying them to the caller.
#[derive(Debug)]
pub struct RuleEngine {
    rules: RuleSet,
    cascade_zone: String,
}

impl RuleEngine {
    pub fn new(rules: RuleSet, cascade_zone: impl Into<String>) -> Self {
        Self {
            rules,
            cascade_zone: cascade_zone.into(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Replaces all parameters, returns whether anything changed.
    pub fn set_rules(&mut self, rules: RuleSet) -> bool {
        if self.rules == rules {
            return false;
        }
        self.rules = rules;

        true
    }

    pub fn update(&mut self, kind: RuleKind, update: RuleUpdate) -> Result<&RuleSet, RuleError> {
        let mut rules = self.rules;

        match kind {
            RuleKind::AirQuality => {
                if update.threshold.is_some() {
                    return Err(RuleError::ThresholdNotApplicable(kind));
                }
                if let Some(level) = update.level {
                    rules.air_quality.level = level;
                }
                if let Some(active) = update.active {
                    rules.air_quality.active = active;
                }
            }
            _ => {
                if update.level.is_some() {
                    return Err(RuleError::LevelNotApplicable(kind));
                }
                let rule = match kind {
                    RuleKind::Lighting => &mut rules.lighting,
                    RuleKind::Irrigation => &mut rules.irrigation,
                    _ => &mut rules.noise,
                };
                if let Some(threshold) = update.threshold {
                    if !threshold.is_finite() {
                        return Err(RuleError::InvalidThreshold);
                    }
                    rule.threshold = threshold;
                }
                if let Some(active) = update.active {
                    rule.active = active;
                }
            }
        }

        self.rules = rules;

        Ok(&self.rules)
    }

    /// Actuations caused by the current reading of `sensor`.
    pub fn evaluate(&self, sensor: &Device, registry: &DeviceRegistry) -> Vec<Actuation> {
        let Some(reading) = sensor.value() else {
            return Vec::new();
        };
        let Some(rule) = self.rules.rule_for_sensor(&sensor.name) else {
            return Vec::new();
        };
        if !rule.active {
            return Vec::new();
        }
        let Some(target) = rule.decide(reading) else {
            tracing::debug!("skipping {:?} rule, unreadable value `{}` from {}", rule.kind, reading, sensor.id);
            return Vec::new();
        };

        registry
            .actuators_named(rule.kind.actuator_kind(), &sensor.zone)
            .filter(|actuator| actuator.status() != Some(target))
            .map(|actuator| {
                tracing::debug!("{} reads `{}`, {} goes {}", sensor.id, reading, actuator.id, target);
                Actuation {
                    id: actuator.id.clone(),
                    status: target,
                }
            })
            .collect()
    }

    /// Follow-up actuations after `actuator` transitioned to its current status.
    ///
    /// Ventilation follows the pollution alert, in the cascade zone only.
    pub fn cascade(&self, actuator: &Device, registry: &DeviceRegistry) -> Vec<Actuation> {
        let Some(status) = actuator.status() else {
            return Vec::new();
        };
        if actuator.name != POLLUTION_ALERT || actuator.zone != self.cascade_zone {
            return Vec::new();
        }

        registry
            .actuators_named(VENTILATION, &actuator.zone)
            .filter(|ventilation| ventilation.status() != Some(status))
            .map(|ventilation| Actuation {
                id: ventilation.id.clone(),
                status,
            })
            .collect()
    }

    /// Evaluates every cached sensor, as after a parameter change.
    pub fn recheck(&self, registry: &DeviceRegistry) -> Vec<Actuation> {
        let targets: BTreeMap<DeviceId, ActuatorStatus> = registry
            .sensors()
            .flat_map(|sensor| self.evaluate(sensor, registry))
            .map(|actuation| (actuation.id, actuation.status))
            .collect();

        targets
            .into_iter()
            .map(|(id, status)| Actuation { id, status })
            .collect()
    }
}
