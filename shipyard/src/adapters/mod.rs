//! Platform adapters
//!
//! One adapter per hosting target, all implementing the same contract:
//! validate, deploy, cancel. Adapters never talk to the caller directly;
//! events flow through the [`Reporter`] handed into `deploy`.

pub mod base;
pub mod cloudflare;
pub mod custom;
pub mod ftp;
pub mod github_pages;
pub mod netlify;
pub mod registry;
pub mod ssh;
pub mod surge;
pub mod vercel;

use async_trait::async_trait;
use serde::Serialize;

use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{ConfigField, ValidationReport};
use crate::models::{DeployConfig, DeployResult, Platform};

/// Static platform metadata, available without instantiating the adapter
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub platform: Platform,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub requires_auth: bool,
    pub fields: &'static [ConfigField],
}

/// The deploy contract, implemented once per platform
#[async_trait]
pub trait DeployAdapter: Send + Sync {
    /// Platform this adapter serves
    fn platform(&self) -> Platform;

    /// Whether the orchestrator should run the project build step before
    /// handing over to this adapter
    fn needs_build(&self) -> bool {
        false
    }

    /// Check required fields and environment-variable fallbacks.
    ///
    /// Never mutates the config and never performs I/O against the remote
    /// target.
    fn validate_config(&self, config: &DeployConfig) -> ValidationReport;

    /// Perform the transfer, streaming progress and logs through the
    /// reporter. Returns a distinct [`DeployError::Cancelled`] when the
    /// cooperative cancellation flag fires between file operations.
    async fn deploy(
        &self,
        config: &DeployConfig,
        reporter: &Reporter,
    ) -> Result<DeployResult, DeployError>;

    /// Best-effort cancellation: sets a flag the in-flight `deploy` call
    /// polls. Adapters wrapping bulk operations may only stop between
    /// files, not mid-transfer.
    fn cancel(&self);
}

impl std::fmt::Debug for dyn DeployAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployAdapter")
            .field("platform", &self.platform())
            .finish()
    }
}
