//! End-to-end orchestrator tests against a stub adapter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use shipyard::adapters::{custom, DeployAdapter};
use shipyard::deploy::reporter::{DeployObserver, NullObserver, Reporter};
use shipyard::{
    AdapterRegistry, DeployConfig, DeployError, DeployPhase, DeployProgress, DeployResult,
    DeployService, DeployStatus, Platform, StateLayout,
};

/// Adapter that pretends to upload `steps` files, polling for cancellation
/// between them
struct StubAdapter {
    steps: u32,
    step_delay: Duration,
}

impl StubAdapter {
    fn instant() -> Self {
        Self {
            steps: 3,
            step_delay: Duration::ZERO,
        }
    }

    fn slow() -> Self {
        Self {
            steps: 40,
            step_delay: Duration::from_millis(50),
        }
    }
}

#[async_trait]
impl DeployAdapter for StubAdapter {
    fn platform(&self) -> Platform {
        Platform::Custom
    }

    fn validate_config(&self, _config: &DeployConfig) -> shipyard::ValidationReport {
        shipyard::ValidationReport::ok()
    }

    async fn deploy(
        &self,
        _config: &DeployConfig,
        reporter: &Reporter,
    ) -> Result<DeployResult, DeployError> {
        reporter.set_phase(DeployPhase::Upload, "Uploading");
        for step in 1..=self.steps {
            if reporter.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            tokio::time::sleep(self.step_delay).await;
            reporter.progress((step * 100 / self.steps) as u8, "step");
        }
        reporter.set_phase(DeployPhase::Process, "Finalizing");
        Ok(DeployResult::ok(Some("https://stub.example.com".into())))
    }

    fn cancel(&self) {}
}

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<DeployStatus>>,
    progress: Mutex<Vec<u8>>,
}

impl DeployObserver for Recorder {
    fn on_progress(&self, progress: &DeployProgress) {
        self.progress.lock().unwrap().push(progress.progress);
    }

    fn on_status(&self, status: DeployStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}

/// Observer that queries the service back on every status change, the way
/// a UI layer refreshing its view would
#[derive(Default)]
struct StatusQuerier {
    service: Mutex<Option<Arc<DeployService>>>,
    snapshots: Mutex<Vec<Option<DeployStatus>>>,
}

impl DeployObserver for StatusQuerier {
    fn on_status(&self, _status: DeployStatus) {
        if let Some(service) = self.service.lock().unwrap().as_ref() {
            let current = service.current_deployment().map(|c| c.status);
            let _ = service.current_logs();
            self.snapshots.lock().unwrap().push(current);
        }
    }
}

async fn service_with_stub(
    dir: &tempfile::TempDir,
    stub: StubAdapter,
) -> Arc<DeployService> {
    let registry = Arc::new(AdapterRegistry::new());
    let stub = Arc::new(stub);
    registry
        .register(custom::INFO, {
            let stub = stub.clone();
            Arc::new(move || Ok(stub.clone() as Arc<dyn DeployAdapter>))
        })
        .await;
    Arc::new(DeployService::new(
        &StateLayout::new(dir.path()),
        registry,
    ))
}

fn stub_config() -> DeployConfig {
    let mut config = DeployConfig::new(Platform::Custom);
    config.build_before_deploy = false;
    config
}

#[tokio::test]
async fn test_successful_deployment_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with_stub(&dir, StubAdapter::instant()).await;
    let recorder = Arc::new(Recorder::default());

    let result = service
        .deploy(&stub_config(), recorder.clone())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.url.as_deref(), Some("https://stub.example.com"));
    assert!(result.deploy_id.starts_with("deploy-"));

    let statuses = recorder.statuses.lock().unwrap().clone();
    assert_eq!(statuses.first(), Some(&DeployStatus::Preparing));
    assert_eq!(statuses.last(), Some(&DeployStatus::Success));
    assert!(statuses.contains(&DeployStatus::Uploading));

    let progress = recorder.progress.lock().unwrap().clone();
    let mut last = 0;
    for value in &progress {
        assert!(*value >= last, "progress regressed: {:?}", progress);
        last = *value;
    }
    assert_eq!(last, 100);

    let history = service.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, DeployStatus::Success);
    assert_eq!(history[0].id, result.deploy_id);
    assert!(service.current_deployment().is_none());
}

#[tokio::test]
async fn test_observer_may_query_service_from_status_callback() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with_stub(&dir, StubAdapter::instant()).await;
    let observer = Arc::new(StatusQuerier::default());
    *observer.service.lock().unwrap() = Some(service.clone());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        service.deploy(&stub_config(), observer.clone()),
    )
    .await
    .expect("deploy must not hang while the observer queries back")
    .unwrap();
    assert!(result.success);

    let snapshots = observer.snapshots.lock().unwrap().clone();
    assert!(!snapshots.is_empty());
    // Mid-flight callbacks saw the live deployment
    assert!(snapshots.iter().any(|s| s.is_some()));
}

#[tokio::test]
async fn test_validation_failure_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(AdapterRegistry::new());
    let service = DeployService::new(&StateLayout::new(dir.path()), registry);

    // Real SSH adapter, empty options: validation must fail before any
    // transfer is attempted
    let config = DeployConfig::new(Platform::Ssh);
    let result = service
        .deploy(&config, Arc::new(NullObserver))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("host"));

    let history = service.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_second_deploy_rejected_while_busy() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with_stub(&dir, StubAdapter::slow()).await;

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.deploy(&stub_config(), Arc::new(NullObserver)).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = service.deploy(&stub_config(), Arc::new(NullObserver)).await;
    assert!(matches!(second, Err(DeployError::DeploymentInProgress)));
    assert!(service.current_deployment().is_some());

    service.cancel().unwrap();
    first.await.unwrap().unwrap();

    // The rejected call left no trace
    assert_eq!(service.history().await.len(), 1);
}

#[tokio::test]
async fn test_cancellation_mid_upload() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with_stub(&dir, StubAdapter::slow()).await;
    let recorder = Arc::new(Recorder::default());

    let handle = {
        let service = service.clone();
        let recorder = recorder.clone();
        tokio::spawn(async move { service.deploy(&stub_config(), recorder).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    service.cancel().unwrap();

    let result = handle.await.unwrap().unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("cancelled"));

    let statuses = recorder.statuses.lock().unwrap().clone();
    assert_eq!(statuses.last(), Some(&DeployStatus::Cancelled));

    let history = service.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, DeployStatus::Cancelled);

    // Nothing left to cancel afterwards
    assert!(service.cancel().is_err());
}

#[tokio::test]
async fn test_secrets_masked_in_history() {
    let dir = tempfile::tempdir().unwrap();
    let service = service_with_stub(&dir, StubAdapter::instant()).await;

    let mut config = stub_config();
    config.set_option("token", "tok_very_secret");
    config.set_option("command", "true");

    service
        .deploy(&config, Arc::new(NullObserver))
        .await
        .unwrap();

    let history = service.history().await;
    let stored = &history[0].config;
    assert_eq!(stored.option_str("token"), Some("********"));
    assert_eq!(stored.option_str("command"), Some("true"));
}

#[tokio::test]
async fn test_custom_noop_command_succeeds() {
    let state = tempfile::tempdir().unwrap();
    let dist = tempfile::tempdir().unwrap();
    std::fs::write(dist.path().join("index.html"), "<html>").unwrap();

    let service = DeployService::new(
        &StateLayout::new(state.path()),
        Arc::new(AdapterRegistry::new()),
    );

    let mut config = DeployConfig::new(Platform::Custom);
    config.build_before_deploy = false;
    config.dist_dir = dist.path().to_string_lossy().into_owned();
    config.set_option("command", "true");

    let result = service
        .deploy(&config, Arc::new(NullObserver))
        .await
        .unwrap();
    assert!(result.success, "error: {:?}", result.error);

    let history = service.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, DeployStatus::Success);
}

#[tokio::test]
async fn test_timeout_fails_deployment_with_slow_command() {
    let state = tempfile::tempdir().unwrap();
    let dist = tempfile::tempdir().unwrap();
    std::fs::write(dist.path().join("index.html"), "<html>").unwrap();

    let service = DeployService::new(
        &StateLayout::new(state.path()),
        Arc::new(AdapterRegistry::new()),
    );

    let mut config = DeployConfig::new(Platform::Custom);
    config.build_before_deploy = false;
    config.dist_dir = dist.path().to_string_lossy().into_owned();
    config.set_option("command", "sleep");
    config.set_option("args", "30");
    config.timeout_secs = 1;

    let started = std::time::Instant::now();
    let result = service
        .deploy(&config, Arc::new(NullObserver))
        .await
        .unwrap();

    // The slow command is abandoned (and its child killed), not waited for
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(10));

    let history = service.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_missing_dist_dir_fails_before_any_transfer() {
    let state = tempfile::tempdir().unwrap();
    let service = DeployService::new(
        &StateLayout::new(state.path()),
        Arc::new(AdapterRegistry::new()),
    );

    let mut config = DeployConfig::new(Platform::Custom);
    config.build_before_deploy = false;
    config.dist_dir = "/definitely/not/here".to_string();
    config.set_option("command", "true");

    let result = service
        .deploy(&config, Arc::new(NullObserver))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("/definitely/not/here"));
}

#[tokio::test]
async fn test_unknown_platform_reported_per_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(AdapterRegistry::new());
    registry
        .register(
            custom::INFO,
            Arc::new(|| Err(DeployError::ConfigError("cli missing".into()))),
        )
        .await;
    let service = DeployService::new(&StateLayout::new(dir.path()), registry);

    let result = service
        .deploy(&stub_config(), Arc::new(NullObserver))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("custom"));
    assert_eq!(service.history().await.len(), 1);
}
