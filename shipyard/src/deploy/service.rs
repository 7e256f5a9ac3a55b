//! Deployment orchestrator
//!
//! Owns the single in-flight deployment: resolves the adapter, validates
//! config, runs the optional build, hands off to the adapter under the
//! configured timeout, and records every attempt in history. Exactly one
//! deployment runs at a time; a second call fails fast with
//! [`DeployError::DeploymentInProgress`] and leaves no history entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::registry::AdapterRegistry;
use crate::adapters::DeployAdapter;
use crate::deploy::build::{self, DEFAULT_BUILD_COMMAND};
use crate::deploy::fsm::StatusMachine;
use crate::deploy::reporter::{DeployObserver, Reporter};
use crate::errors::DeployError;
use crate::fields::{FieldType, ValidationReport};
use crate::models::{
    DeployConfig, DeployHistoryEntry, DeployLogEntry, DeployPhase, DeployResult, DeployStatus,
    Platform,
};
use crate::storage::history::HistoryStore;
use crate::storage::layout::StateLayout;
use crate::utils::generate_deploy_id;

/// Secret option names masked in history even when a custom adapter does
/// not declare them in its field schema
const WELL_KNOWN_SECRET_FIELDS: &[&str] = &["password", "token", "authToken", "apiToken"];

struct ActiveDeployment {
    id: String,
    platform: Platform,
    started_at: DateTime<Utc>,
    machine: StatusMachine,
    reporter: Arc<Reporter>,
    adapter: Option<Arc<dyn DeployAdapter>>,
    cancel: Arc<AtomicBool>,
}

/// Snapshot of the in-flight deployment for status queries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDeployment {
    pub id: String,
    pub platform: Platform,
    pub status: DeployStatus,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
}

/// Caller hook invoked after a successful deployment, before history is
/// written
pub type PostDeployHook = Arc<dyn Fn(&DeployResult) + Send + Sync>;

pub struct DeployService {
    registry: Arc<AdapterRegistry>,
    history: HistoryStore,
    active: Mutex<Option<ActiveDeployment>>,
    in_flight: AtomicBool,
    post_deploy: Mutex<Option<PostDeployHook>>,
}

impl DeployService {
    pub fn new(layout: &StateLayout, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            history: HistoryStore::new(layout.history_file()),
            active: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            post_deploy: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Install (or clear) the post-deploy hook
    pub fn set_post_deploy_hook(&self, hook: Option<PostDeployHook>) {
        *self.post_deploy.lock().unwrap() = hook;
    }

    /// Run one deployment attempt to completion.
    ///
    /// Every started attempt resolves to a [`DeployResult`] and exactly one
    /// history entry, whether it succeeded, failed or was cancelled. The
    /// only error returned is [`DeployError::DeploymentInProgress`], which
    /// means the attempt never started.
    pub async fn deploy(
        &self,
        config: &DeployConfig,
        observer: Arc<dyn DeployObserver>,
    ) -> Result<DeployResult, DeployError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(DeployError::DeploymentInProgress);
        }

        let id = generate_deploy_id();
        let started_at = Utc::now();
        let cancel = Arc::new(AtomicBool::new(false));
        let reporter = Arc::new(Reporter::new(observer, cancel.clone()));

        *self.active.lock().unwrap() = Some(ActiveDeployment {
            id: id.clone(),
            platform: config.platform,
            started_at,
            machine: StatusMachine::new(),
            reporter: reporter.clone(),
            adapter: None,
            cancel,
        });

        info!(deploy_id = %id, platform = %config.platform, "Deployment started");
        let outcome = self.run_attempt(config, &reporter).await;

        let (status, mut result) = match outcome {
            Ok(result) => (DeployStatus::Success, result),
            Err(e) if e.is_cancelled() => (
                DeployStatus::Cancelled,
                DeployResult::err(e.to_string(), None),
            ),
            Err(e) => (
                DeployStatus::Failed,
                DeployResult::err(e.to_string(), Some(format!("{:?}", e))),
            ),
        };
        result.deploy_id = id.clone();
        result.timestamp = Utc::now();
        result.duration_ms = (result.timestamp - started_at)
            .num_milliseconds()
            .max(0) as u64;

        self.finish(status, &reporter);
        if status == DeployStatus::Success {
            reporter.set_phase(DeployPhase::Complete, "Deployment complete");
        }
        info!(
            deploy_id = %id,
            status = ?status,
            duration_ms = result.duration_ms,
            "Deployment finished"
        );

        if status == DeployStatus::Success {
            let hook = self.post_deploy.lock().unwrap().clone();
            if let Some(hook) = hook {
                hook(&result);
            }
            if config.open_after_deploy {
                if let Some(url) = &result.url {
                    open_url(url);
                }
            }
        }

        let entry = DeployHistoryEntry {
            id,
            platform: config.platform,
            status,
            result: result.clone(),
            config: self.sanitize(config).await,
            start_time: started_at,
            end_time: result.timestamp,
            logs: reporter.take_logs(),
        };
        if let Err(e) = self.history.append(entry).await {
            warn!(error = %e, "Failed to persist history entry");
        }

        *self.active.lock().unwrap() = None;
        self.in_flight.store(false, Ordering::SeqCst);
        Ok(result)
    }

    async fn run_attempt(
        &self,
        config: &DeployConfig,
        reporter: &Reporter,
    ) -> Result<DeployResult, DeployError> {
        self.advance(DeployStatus::Preparing)?;
        reporter.set_phase(DeployPhase::Init, "Starting deployment");

        let adapter = self.registry.adapter(config.platform).await?;
        if let Some(active) = self.active.lock().unwrap().as_mut() {
            active.adapter = Some(adapter.clone());
        }

        reporter.set_phase(DeployPhase::Validate, "Validating configuration");
        let report = adapter.validate_config(config);
        if !report.valid {
            reporter.log_data(
                crate::models::DeployLogLevel::Error,
                "Configuration invalid",
                serde_json::json!({ "errors": report.errors }),
            );
            return Err(DeployError::ValidationError(report.errors.join("; ")));
        }
        reporter.progress(100, "Configuration valid");

        if reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        if adapter.needs_build() && config.build_before_deploy {
            self.advance(DeployStatus::Building)?;
            let command = config
                .build_command
                .as_deref()
                .unwrap_or(DEFAULT_BUILD_COMMAND);
            build::run_build(command, reporter).await?;
        }

        if reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        self.advance(DeployStatus::Uploading)?;
        let result = if config.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                adapter.deploy(config, reporter),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    adapter.cancel();
                    return Err(DeployError::TransferError(format!(
                        "Deployment timed out after {} seconds",
                        config.timeout_secs
                    )));
                }
            }
        } else {
            adapter.deploy(config, reporter).await?
        };

        self.advance(DeployStatus::Processing)?;
        reporter.set_phase(DeployPhase::Verify, "Verifying deployment");
        reporter.progress(100, "Deployment verified");

        Ok(result)
    }

    /// Advance the status machine and notify the observer.
    ///
    /// The observer runs outside the `active` lock so its callback may
    /// query the service re-entrantly.
    fn advance(&self, next: DeployStatus) -> Result<(), DeployError> {
        let reporter = {
            let mut guard = self.active.lock().unwrap();
            let active = guard
                .as_mut()
                .ok_or_else(|| DeployError::Internal("No active deployment".to_string()))?;
            active.machine.advance(next)?;
            active.reporter.clone()
        };
        reporter.status(next);
        Ok(())
    }

    /// Move to a terminal status, tolerating an already-terminal machine.
    /// The observer is notified outside the `active` lock.
    fn finish(&self, status: DeployStatus, reporter: &Reporter) {
        {
            let mut guard = self.active.lock().unwrap();
            if let Some(active) = guard.as_mut() {
                if let Err(e) = active.machine.advance(status) {
                    debug!(error = %e, "Terminal status transition skipped");
                }
            }
        }
        reporter.status(status);
    }

    /// Request cancellation of the in-flight deployment.
    ///
    /// Cooperative: the adapter finishes its current file operation before
    /// the flag is observed.
    pub fn cancel(&self) -> Result<(), DeployError> {
        let guard = self.active.lock().unwrap();
        match guard.as_ref() {
            Some(active) if !active.machine.status().is_terminal() => {
                info!(deploy_id = %active.id, "Cancellation requested");
                active.cancel.store(true, Ordering::SeqCst);
                if let Some(adapter) = &active.adapter {
                    adapter.cancel();
                }
                Ok(())
            }
            _ => Err(DeployError::NotFound(
                "No deployment in progress".to_string(),
            )),
        }
    }

    /// Snapshot of the in-flight deployment, if any
    pub fn current_deployment(&self) -> Option<CurrentDeployment> {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|active| CurrentDeployment {
                id: active.id.clone(),
                platform: active.platform,
                status: active.machine.status(),
                progress: active.reporter.overall_progress(),
                started_at: active.started_at,
            })
    }

    /// Log buffer of the in-flight deployment
    pub fn current_logs(&self) -> Vec<DeployLogEntry> {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|active| active.reporter.logs_snapshot())
            .unwrap_or_default()
    }

    pub async fn history(&self) -> Vec<DeployHistoryEntry> {
        self.history.load().await
    }

    pub async fn clear_history(&self) -> Result<(), DeployError> {
        self.history.clear().await
    }

    /// Platforms with a registered adapter
    pub async fn supported_platforms(&self) -> Vec<Platform> {
        self.registry.platforms().await
    }

    /// Field schema and display metadata for one platform
    pub async fn platform_info(&self, platform: Platform) -> Option<crate::PlatformInfo> {
        self.registry.platform_info(platform).await
    }

    /// Validate a config against its platform's adapter without deploying
    pub async fn validate_config(
        &self,
        config: &DeployConfig,
    ) -> Result<ValidationReport, DeployError> {
        let adapter = self.registry.adapter(config.platform).await?;
        Ok(adapter.validate_config(config))
    }

    /// Sanitized copy of a config for history and display
    async fn sanitize(&self, config: &DeployConfig) -> DeployConfig {
        let mut secrets: Vec<&str> = WELL_KNOWN_SECRET_FIELDS.to_vec();
        if let Some(info) = self.registry.platform_info(config.platform).await {
            for field in info.fields {
                if field.field_type == FieldType::Password && !secrets.contains(&field.name) {
                    secrets.push(field.name);
                }
            }
        }
        config.sanitized(&secrets)
    }
}

/// Best-effort browser launch; failure only logs
fn open_url(url: &str) {
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(not(target_os = "macos"))]
    let program = "xdg-open";

    match std::process::Command::new(program)
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    {
        Ok(_) => debug!(url, "Opened deployment URL"),
        Err(e) => warn!(url, error = %e, "Failed to open deployment URL"),
    }
}
