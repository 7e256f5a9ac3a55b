//! shipyard: deployment engine for static-site and server targets.
//!
//! The crate is organized around three layers:
//!
//! - [`adapters`]: one [`adapters::DeployAdapter`] per platform, resolved
//!   through the [`adapters::registry::AdapterRegistry`]
//! - [`deploy`]: the orchestrator ([`deploy::service::DeployService`]),
//!   status machine and progress reporting
//! - [`storage`]: bounded history, saved configs and the at-rest
//!   credential codec

pub mod adapters;
pub mod deploy;
pub mod errors;
pub mod fields;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;

pub use adapters::registry::AdapterRegistry;
pub use adapters::{DeployAdapter, PlatformInfo};
pub use deploy::reporter::{DeployObserver, NullObserver, Reporter};
pub use deploy::service::{CurrentDeployment, DeployService, PostDeployHook};
pub use errors::DeployError;
pub use fields::{ConfigField, FieldType, ValidationReport};
pub use models::{
    DeployConfig, DeployHistoryEntry, DeployLogEntry, DeployLogLevel, DeployPhase, DeployProgress,
    DeployResult, DeployStatus, Environment, Platform, SavedDeployConfig,
};
pub use storage::codec::CredentialCodec;
pub use storage::configs::ConfigStore;
pub use storage::history::HistoryStore;
pub use storage::layout::StateLayout;
