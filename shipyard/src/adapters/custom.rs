//! Custom command adapter
//!
//! Escape hatch for platforms without a built-in adapter: runs a
//! user-supplied program and treats its exit status as the deployment
//! outcome. The last URL-shaped token in the output, if any, becomes the
//! deployment URL.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::adapters::base::{self, CliRunner};
use crate::adapters::{DeployAdapter, PlatformInfo};
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{self, ConfigField, FieldType, ValidationReport};
use crate::models::{DeployConfig, DeployLogLevel, DeployPhase, DeployResult, Platform};

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "command",
        label: "Command",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "args",
        label: "Arguments (whitespace separated)",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "workingDir",
        label: "Working directory",
        field_type: FieldType::FilePath,
        required: false,
        default: None,
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "envVars",
        label: "Environment overrides (KEY=VALUE, one per line)",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: None,
    },
];

/// Parse `KEY=VALUE` lines into environment pairs, skipping malformed ones
fn parse_env_lines(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::Custom,
    display_name: "Custom command",
    icon: "🔧",
    requires_auth: false,
    fields: FIELDS,
};

pub struct CustomAdapter {
    cancelled: AtomicBool,
}

impl CustomAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for CustomAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployAdapter for CustomAdapter {
    fn platform(&self) -> Platform {
        Platform::Custom
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

        base::check_artifact_dir(&config.dist_dir).await?;

        let mut options = config.options.clone();
        fields::apply_defaults(FIELDS, &mut options);
        let command = options
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let args: Vec<String> = options
            .get("args")
            .and_then(|v| v.as_str())
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(DeployPhase::Upload, &format!("Running {}", command));
        // Once spawned, the command runs to completion; cancellation is
        // only honored before the spawn
        let mut runner = CliRunner::new(&command)
            .args(args)
            .no_cancel()
            .url_pattern(base::generic_url_pattern());
        if let Some(dir) = options.get("workingDir").and_then(|v| v.as_str()) {
            runner = runner.cwd(dir);
        }
        if let Some(raw) = options.get("envVars").and_then(|v| v.as_str()) {
            for (key, value) in parse_env_lines(raw) {
                runner = runner.env(key, value);
            }
        }

        let output = runner.run(reporter).await?;

        reporter.set_phase(DeployPhase::Process, "Command finished");
        match &output.url {
            Some(url) => reporter.log(DeployLogLevel::Success, format!("Deployed to {}", url)),
            None => reporter.log(DeployLogLevel::Success, "Custom deploy command succeeded"),
        }

        Ok(DeployResult::ok(output.url).with_info("command", command))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
