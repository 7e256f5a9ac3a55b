//! Deployment models

pub mod config;
pub mod history;
pub mod progress;
pub mod result;

pub use config::{DeployConfig, Environment, Platform};
pub use history::{DeployHistoryEntry, SavedDeployConfig};
pub use progress::{DeployLogEntry, DeployLogLevel, DeployPhase, DeployProgress, DeployStatus};
pub use result::DeployResult;
