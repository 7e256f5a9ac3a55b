//! Cloudflare Pages adapter
//!
//! Uses `wrangler pages deploy`; the API token travels to the child
//! process through the environment, never on the command line.

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
        name: "apiToken",
        label: "API token",
        field_type: FieldType::Password,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("CLOUDFLARE_API_TOKEN"),
    },
    ConfigField {
        name: "accountId",
        label: "Account ID",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("CLOUDFLARE_ACCOUNT_ID"),
    },
    ConfigField {
        name: "projectName",
        label: "Project name",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: Some(r"^[a-z0-9][a-z0-9-]*$"),
        env_var: Some("CLOUDFLARE_PROJECT"),
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::CloudflarePages,
    display_name: "Cloudflare Pages",
    icon: "☁",
    requires_auth: true,
    fields: FIELDS,
};

pub struct CloudflareAdapter {
    cancelled: AtomicBool,
}

impl CloudflareAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for CloudflareAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployAdapter for CloudflareAdapter {
    fn platform(&self) -> Platform {
        Platform::CloudflarePages
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
            .get("apiToken")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let project = options
            .get("projectName")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(DeployPhase::Upload, "Uploading to Cloudflare Pages");
        let mut runner = CliRunner::new("wrangler")
            .args(["pages", "deploy"])
            .arg(dist.to_string_lossy())
            .args(["--project-name", &project])
            .env("CLOUDFLARE_API_TOKEN", &token)
            .url_pattern(Regex::new(r"https://[\w.-]+\.pages\.dev[^\s]*").unwrap());

        if let Some(account) = options.get("accountId").and_then(|v| v.as_str()) {
            runner = runner.env("CLOUDFLARE_ACCOUNT_ID", account);
        }

        let output = runner.run(reporter).await?;

        reporter.set_phase(DeployPhase::Process, "Finalizing Cloudflare deployment");
        match &output.url {
            Some(url) => reporter.log(DeployLogLevel::Success, format!("Deployed to {}", url)),
            None => reporter.log(
                DeployLogLevel::Warn,
                "Deploy finished but no URL was found in the CLI output",
            ),
        }

        Ok(DeployResult::ok(output.url)
            .with_info("filesUploaded", files.len())
            .with_info("bytesTotal", total_bytes))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
