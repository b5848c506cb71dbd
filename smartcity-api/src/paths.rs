use crate::models::DeviceId;

/// Store path layout under a configurable root (`smartcity` by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: String,
}

impl StorePaths {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn devices(&self) -> String {
        format!("{}/devices", self.root)
    }

    pub fn sensors(&self) -> String {
        format!("{}/devices/sensors", self.root)
    }

    pub fn actuators(&self) -> String {
        format!("{}/devices/actuators", self.root)
    }

    pub fn sensor(&self, id: &DeviceId) -> String {
        format!("{}/devices/sensors/{id}", self.root)
    }

    pub fn actuator(&self, id: &DeviceId) -> String {
        format!("{}/devices/actuators/{id}", self.root)
    }

    pub fn rules(&self) -> String {
        format!("{}/rules", self.root)
    }

    pub fn status(&self) -> String {
        format!("{}/status", self.root)
    }
}

impl Default for StorePaths {
    fn default() -> Self {
        Self::new("smartcity")
    }
}
