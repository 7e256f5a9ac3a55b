//! GitHub Pages adapter
//!
//! Publishes the artifact directory to a pages branch with the `gh-pages`
//! CLI (run through `npx`). The public URL is derived from the repository
//! slug rather than parsed from CLI output, which prints none.

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
        name: "repo",
        label: "Repository (owner/name)",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: Some(r"^[\w.-]+/[\w.-]+$"),
        env_var: Some("GITHUB_REPOSITORY"),
    },
    ConfigField {
        name: "branch",
        label: "Pages branch",
        field_type: FieldType::Text,
        required: false,
        default: Some("gh-pages"),
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "token",
        label: "GitHub token",
        field_type: FieldType::Password,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("GITHUB_TOKEN"),
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::GithubPages,
    display_name: "GitHub Pages",
    icon: "🐙",
    requires_auth: false,
    fields: FIELDS,
};

pub struct GithubPagesAdapter {
    cancelled: AtomicBool,
}

impl GithubPagesAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for GithubPagesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployAdapter for GithubPagesAdapter {
    fn platform(&self) -> Platform {
        Platform::GithubPages
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
        let branch = options
            .get("branch")
            .and_then(|v| v.as_str())
            .unwrap_or("gh-pages")
            .to_string();

        if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(DeployPhase::Upload, "Publishing to GitHub Pages");
        let mut runner = CliRunner::new("npx")
            .args(["gh-pages", "-d"])
            .arg(dist.to_string_lossy())
            .args(["-b", &branch]);
        if let Some(token) = options.get("token").and_then(|v| v.as_str()) {
            runner = runner.env("GITHUB_TOKEN", token);
        }

        runner.run(reporter).await?;

        reporter.set_phase(DeployPhase::Process, "Finalizing GitHub Pages deployment");
        let url = options
            .get("repo")
            .and_then(|v| v.as_str())
            .and_then(pages_url);
        match &url {
            Some(url) => reporter.log(DeployLogLevel::Success, format!("Published at {}", url)),
            None => reporter.log(
                DeployLogLevel::Info,
                "Published; set the 'repo' field to derive the public URL",
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

fn pages_url(repo: &str) -> Option<String> {
    let (owner, name) = repo.split_once('/')?;
    Some(format!("https://{}.github.io/{}/", owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_url() {
        assert_eq!(
            pages_url("octocat/site").as_deref(),
            Some("https://octocat.github.io/site/")
        );
        assert_eq!(pages_url("not-a-slug"), None);
    }
}
