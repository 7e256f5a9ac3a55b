//! Surge adapter

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use regex::Regex;

use crate::adapters::base::{self, CliRunner};
use crate::adapters::{DeployAdapter, PlatformInfo};
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{self, ConfigField, FieldType, ValidationReport};
use crate::models::{DeployConfig, DeployLogLevel, DeployPhase, DeployResult, Platform};

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "token",
        label: "Surge token",
        field_type: FieldType::Password,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("SURGE_TOKEN"),
    },
    ConfigField {
        name: "domain",
        label: "Domain",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: Some(r"^[\w.-]+\.[a-z]{2,}$"),
        env_var: Some("SURGE_DOMAIN"),
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::Surge,
    display_name: "Surge",
    icon: "⚡",
    requires_auth: true,
    fields: FIELDS,
};

pub struct SurgeAdapter {
    cancelled: AtomicBool,
}

impl SurgeAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for SurgeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployAdapter for SurgeAdapter {
    fn platform(&self) -> Platform {
        Platform::Surge
    }

    fn needs_build(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &DeployConfig) -> ValidationReport {
        fields::validate_fields(FIELDS, &config.options)
    }

    async fn deploy(
        &self,
        config: &DeployConfig,
        reporter: &Reporter,
    ) -> Result<DeployResult, DeployError> {
        self.cancelled.store(false, Ordering::SeqCst);

        let dist = base::check_artifact_dir(&config.dist_dir).await?;

        reporter.set_phase(DeployPhase::Prepare, "Preparing artifact files");
        let (files, total_bytes) = base::enumerate_files(&dist, &config.include, &config.exclude)?;
        reporter.progress_files(
            100,
            &format!(
                "{} files staged ({})",
                files.len(),
                base::format_size(total_bytes)
            ),
            0,
            files.len() as u64,
            Some(total_bytes),
        );

        let mut options = config.options.clone();
        fields::apply_defaults(FIELDS, &mut options);
        let token = options
            .get("token")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let domain = options
            .get("domain")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(DeployPhase::Upload, "Uploading to Surge");
        let mut runner = CliRunner::new("surge")
            .arg(dist.to_string_lossy())
            .url_pattern(Regex::new(r"(?:https?://)?[\w.-]+\.surge\.sh[^\s]*").unwrap());
        if let Some(domain) = &domain {
            runner = runner.arg(domain);
        }
        runner = runner.args(["--token", &token]);

        let output = runner.run(reporter).await?;

        reporter.set_phase(DeployPhase::Process, "Finalizing Surge deployment");

        // A custom domain beats whatever the CLI printed
        let url = domain
            .map(|d| format!("https://{}", d))
            .or_else(|| output.url.map(normalize_url));
        match &url {
            Some(url) => reporter.log(DeployLogLevel::Success, format!("Deployed to {}", url)),
            None => reporter.log(
                DeployLogLevel::Warn,
                "Deploy finished but no URL was found in the CLI output",
            ),
        }

        Ok(DeployResult::ok(url)
            .with_info("filesUploaded", files.len())
            .with_info("bytesTotal", total_bytes))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn normalize_url(url: String) -> String {
    if url.starts_with("http") {
        url
    } else {
        format!("https://{}", url)
    }
}
