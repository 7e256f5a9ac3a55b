//! Deployment result model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a single deployment attempt.
///
/// Created once per attempt, immutable after creation, persisted into
/// history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    /// Whether the attempt succeeded
    pub success: bool,

    /// Best known public address of the deployed artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Preview address, when the platform distinguishes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    /// Deployment ID
    pub deploy_id: String,

    /// Human-readable error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Raw error details (debug output, captured CLI output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,

    /// Attempt duration in milliseconds
    pub duration_ms: u64,

    /// Completion timestamp
    pub timestamp: DateTime<Utc>,

    /// Adapter-specific metadata (file counts, transfer sizes, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub platform_info: Map<String, Value>,
}

impl DeployResult {
    /// A successful result shell; the orchestrator fills in id and duration
    pub fn ok(url: Option<String>) -> Self {
        Self {
            success: true,
            url,
            preview_url: None,
            deploy_id: String::new(),
            error: None,
            error_details: None,
            duration_ms: 0,
            timestamp: Utc::now(),
            platform_info: Map::new(),
        }
    }

    /// A failed result shell
    pub fn err(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            url: None,
            preview_url: None,
            deploy_id: String::new(),
            error: Some(error.into()),
            error_details: details,
            duration_ms: 0,
            timestamp: Utc::now(),
            platform_info: Map::new(),
        }
    }

    /// Attach a platform metadata entry
    pub fn with_info(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.platform_info.insert(key.to_string(), value.into());
        self
    }
}
