//! Netlify adapter
//!
//! Delegates the transfer to the `netlify` CLI as a subprocess and parses
//! its output for the deploy URL.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use regex::Regex;

use crate::adapters::base::{self, CliRunner};
use crate::adapters::{DeployAdapter, PlatformInfo};
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{self, ConfigField, FieldType, ValidationReport};
use crate::models::{DeployConfig, DeployLogLevel, DeployPhase, DeployResult, Environment, Platform};

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "authToken",
        label: "Auth token",
        field_type: FieldType::Password,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("NETLIFY_AUTH_TOKEN"),
    },
    ConfigField {
        name: "siteId",
        label: "Site ID",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("NETLIFY_SITE_ID"),
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::Netlify,
    display_name: "Netlify",
    icon: "◆",
    requires_auth: true,
    fields: FIELDS,
};

pub struct NetlifyAdapter {
    cancelled: AtomicBool,
}

impl NetlifyAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for NetlifyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployAdapter for NetlifyAdapter {
    fn platform(&self) -> Platform {
        Platform::Netlify
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
            .get("authToken")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(DeployPhase::Upload, "Uploading to Netlify");
        let mut runner = CliRunner::new("netlify")
            .args(["deploy", "--dir"])
            .arg(dist.to_string_lossy())
            .args(["--auth", &token])
            .url_pattern(Regex::new(r"https://[\w.-]+\.netlify\.app[^\s]*").unwrap());

        if let Some(site_id) = options.get("siteId").and_then(|v| v.as_str()) {
            runner = runner.args(["--site", site_id]);
        }
        if config.environment == Environment::Production {
            runner = runner.arg("--prod");
        }

        let output = runner.run(reporter).await?;

        reporter.set_phase(DeployPhase::Process, "Finalizing Netlify deployment");
        match &output.url {
            Some(url) => reporter.log(DeployLogLevel::Success, format!("Deployed to {}", url)),
            None => reporter.log(
                DeployLogLevel::Warn,
                "Deploy finished but no URL was found in the CLI output",
            ),
        }

        let mut result = DeployResult::ok(output.url.clone())
            .with_info("filesUploaded", files.len())
            .with_info("bytesTotal", total_bytes);
        if config.environment != Environment::Production {
            result.preview_url = output.url;
        }
        Ok(result)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
