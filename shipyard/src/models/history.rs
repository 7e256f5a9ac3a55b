//! History and saved-configuration models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::config::{DeployConfig, Platform};
use crate::models::progress::{DeployLogEntry, DeployStatus};
use crate::models::result::DeployResult;

/// Mask token substituted for secret values in sanitized configs
pub const SECRET_MASK: &str = "********";

/// One completed deployment attempt, as persisted to the history file.
///
/// Never mutated after creation. The embedded config is sanitized: secret
/// fields carry [`SECRET_MASK`] instead of their values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployHistoryEntry {
    /// Deployment ID
    pub id: String,

    /// Target platform
    pub platform: Platform,

    /// Terminal status of the attempt
    pub status: DeployStatus,

    /// Attempt result
    pub result: DeployResult,

    /// Sanitized copy of the config used
    pub config: DeployConfig,

    /// Attempt start time
    pub start_time: DateTime<Utc>,

    /// Attempt end time
    pub end_time: DateTime<Utc>,

    /// Log buffer captured during the attempt
    #[serde(default)]
    pub logs: Vec<DeployLogEntry>,
}

/// A named, reusable deployment configuration.
///
/// Secret fields in `config` are encrypted with the credential codec, not
/// masked, so they round-trip through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDeployConfig {
    /// Unique name, the store key
    pub name: String,

    /// Target platform
    pub platform: Platform,

    /// Deployment configuration with encrypted secrets
    pub config: DeployConfig,

    /// At most one saved config carries this flag at a time
    #[serde(default)]
    pub is_default: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Last time this config was used for a deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_deploy_at: Option<DateTime<Utc>>,
}
