//! Progress, status and log models for an in-flight deployment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse deployment state shown to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Idle,
    Preparing,
    Building,
    Uploading,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl DeployStatus {
    /// Terminal states end a deployment attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployStatus::Success | DeployStatus::Failed | DeployStatus::Cancelled
        )
    }
}

/// Fine-grained stage within a single deployment, drives the overall
/// progress percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployPhase {
    Init,
    Validate,
    Build,
    Prepare,
    Upload,
    Process,
    Verify,
    Complete,
}

impl DeployPhase {
    /// The overall-progress range this phase covers, as (floor, ceiling)
    pub fn range(&self) -> (u8, u8) {
        match self {
            DeployPhase::Init => (0, 5),
            DeployPhase::Validate => (5, 10),
            DeployPhase::Build => (15, 40),
            DeployPhase::Prepare => (40, 50),
            DeployPhase::Upload => (50, 90),
            DeployPhase::Process => (90, 95),
            DeployPhase::Verify => (95, 99),
            DeployPhase::Complete => (100, 100),
        }
    }
}

/// A progress snapshot emitted during a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployProgress {
    /// Current phase
    pub phase: DeployPhase,

    /// Overall progress, 0-100, monotonic across phases
    pub progress: u8,

    /// Progress within the current phase, 0-100, resets per phase
    pub phase_progress: u8,

    /// Human-readable progress message
    pub message: String,

    /// Files transferred so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_completed: Option<u64>,

    /// Total files to transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_total: Option<u64>,

    /// Total bytes to transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,
}

/// Log level for deployment log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployLogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Success,
}

/// An entry in a deployment's append-only log buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployLogEntry {
    /// Entry timestamp
    pub timestamp: DateTime<Utc>,

    /// Log level
    pub level: DeployLogLevel,

    /// Log message
    pub message: String,

    /// Phase the entry was emitted in
    pub phase: DeployPhase,

    /// Optional structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}
