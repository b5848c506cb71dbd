use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// Document under `root/status`, maintained by the companion node.
#[cfg_attr(feature = "docs", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    /// `1` while the node is running, `0` after it shut down
    #[serde(default)]
    pub online: u8,
    #[serde(default)]
    pub last_update: String,
}

impl SystemStatus {
    pub fn online() -> Self {
        Self { online: 1, last_update: timestamp_now() }
    }

    pub fn offline() -> Self {
        Self { online: 0, last_update: timestamp_now() }
    }

    pub fn is_online(&self) -> bool {
        self.online == 1
    }
}
