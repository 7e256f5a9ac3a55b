//! SSH/SCP adapter
//!
//! Orchestrates the system `ssh`/`scp` clients as black boxes: optional
//! pre-commands, optional remote-dir wipe, remote directory creation, then
//! a bulk per-file upload with bounded concurrency. Cancellation is
//! per-file: a file transfer already handed to `scp` runs to completion,
//! but no new transfer starts once the flag is set.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::process::Command;

use crate::adapters::base::{self, ArtifactFile, CliRunner};
use crate::adapters::{DeployAdapter, PlatformInfo};
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{self, ConfigField, FieldType, ValidationReport};
use crate::models::{DeployConfig, DeployLogLevel, DeployPhase, DeployResult, Platform};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Parallel `scp` transfers during the upload phase
const UPLOAD_CONCURRENCY: usize = 5;

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "host",
        label: "Host",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("SSH_HOST"),
    },
    ConfigField {
        name: "port",
        label: "Port",
        field_type: FieldType::Number,
        required: false,
        default: Some("22"),
        pattern: None,
        env_var: Some("SSH_PORT"),
    },
    ConfigField {
        name: "username",
        label: "Username",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("SSH_USER"),
    },
    ConfigField {
        name: "password",
        label: "Password",
        field_type: FieldType::Password,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("SSH_PASSWORD"),
    },
    ConfigField {
        name: "privateKey",
        label: "Private key path",
        field_type: FieldType::FilePath,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("SSH_KEY_PATH"),
    },
    ConfigField {
        name: "remotePath",
        label: "Remote path",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("SSH_REMOTE_PATH"),
    },
    ConfigField {
        name: "preDeployCommands",
        label: "Pre-deploy commands (one per line)",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "postDeployCommands",
        label: "Post-deploy commands (one per line)",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "cleanRemote",
        label: "Wipe remote path before upload",
        field_type: FieldType::Boolean,
        required: false,
        default: Some("false"),
        pattern: None,
        env_var: None,
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::Ssh,
    display_name: "SSH / SCP",
    icon: "🔐",
    requires_auth: true,
    fields: FIELDS,
};

pub struct SshAdapter {
    cancelled: AtomicBool,
}

impl SshAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    fn is_cancelled(&self, reporter: &Reporter) -> bool {
        self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled()
    }
}

impl Default for SshAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved connection parameters for the ssh/scp command builders
struct SshTarget {
    host: String,
    port: u64,
    username: String,
    password: Option<String>,
    private_key: Option<String>,
    remote_path: String,
}

impl SshTarget {
    fn from_options(options: &serde_json::Map<String, serde_json::Value>) -> Self {
        let get = |name: &str| {
            options
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Self {
            host: get("host").unwrap_or_default(),
            port: options
                .get("port")
                .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
                .unwrap_or(22),
            username: get("username").unwrap_or_default(),
            password: get("password"),
            private_key: get("privateKey"),
            remote_path: get("remotePath").unwrap_or_default(),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Program and arguments for running a command on the remote host
    fn ssh_invocation(&self, remote_cmd: &str) -> (String, Vec<String>) {
        let mut args = Vec::new();
        let program = if let Some(password) = &self.password {
            args.extend(["-p".to_string(), password.clone(), "ssh".to_string()]);
            "sshpass".to_string()
        } else {
            args.push("-oBatchMode=yes".to_string());
            "ssh".to_string()
        };
        args.push("-oStrictHostKeyChecking=accept-new".to_string());
        args.extend(["-p".to_string(), self.port.to_string()]);
        if let Some(key) = &self.private_key {
            args.extend(["-i".to_string(), key.clone()]);
        }
        args.push(self.destination());
        args.push(remote_cmd.to_string());
        (program, args)
    }

    /// Program and arguments for copying one local file to the remote host
    fn scp_invocation(&self, local: &Path, remote: &str) -> (String, Vec<String>) {
        let mut args = Vec::new();
        let program = if let Some(password) = &self.password {
            args.extend(["-p".to_string(), password.clone(), "scp".to_string()]);
            "sshpass".to_string()
        } else {
            args.push("-oBatchMode=yes".to_string());
            "scp".to_string()
        };
        args.push("-oStrictHostKeyChecking=accept-new".to_string());
        args.extend(["-P".to_string(), self.port.to_string()]);
        if let Some(key) = &self.private_key {
            args.extend(["-i".to_string(), key.clone()]);
        }
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}:{}", self.destination(), shell_quote(remote)));
        (program, args)
    }
}

/// Quote a path for the remote shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Join the remote base path and a relative artifact path
fn remote_join(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel)
}

/// Run one scp transfer, capturing stderr for the failure message
async fn transfer_file(target: &SshTarget, file: &ArtifactFile) -> Result<(), String> {
    let remote = remote_join(&target.remote_path, &file.relative);
    let (program, args) = target.scp_invocation(&file.path, &remote);

    let output = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("Failed to run {}: {}", program, e))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(stderr.trim().to_string())
    }
}

#[async_trait]
impl DeployAdapter for SshAdapter {
    fn platform(&self) -> Platform {
        Platform::Ssh
    }

    fn needs_build(&self) -> bool {
        true
    }

    fn validate_config(&self, config: &DeployConfig) -> ValidationReport {
        let mut report = fields::validate_fields(FIELDS, &config.options);

        // One of password/privateKey must resolve
        let has_credential = FIELDS
            .iter()
            .filter(|f| f.name == "password" || f.name == "privateKey")
            .any(|f| fields::resolve_value(f, &config.options).is_some());
        if !has_credential {
            report.push("Either password or privateKey is required");
        }

        report
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
        reporter.log(
            DeployLogLevel::Info,
            format!(
                "{} files to upload ({})",
                files.len(),
                base::format_size(total_bytes)
            ),
        );

        let mut options = config.options.clone();
        fields::apply_defaults(FIELDS, &mut options);
        let target = SshTarget::from_options(&options);

        // Pre-deploy commands
        for command in command_lines(&options, "preDeployCommands") {
            if self.is_cancelled(reporter) {
                return Err(DeployError::Cancelled);
            }
            reporter.log(DeployLogLevel::Info, format!("Running: {}", command));
            self.run_remote(&target, &command, reporter).await?;
        }

        // Optional remote wipe
        if options.get("cleanRemote").and_then(|v| v.as_bool()) == Some(true) {
            reporter.log(
                DeployLogLevel::Warn,
                format!("Wiping remote path {}", target.remote_path),
            );
            let wipe = format!("rm -rf -- {}/*", shell_quote(&target.remote_path));
            self.run_remote(&target, &wipe, reporter).await?;
        }

        // Create the remote directory tree up front so scp can write blindly
        reporter.progress(50, "Creating remote directories");
        let mkdir = mkdir_command(&target.remote_path, &files);
        self.run_remote(&target, &mkdir, reporter).await?;

        if self.is_cancelled(reporter) {
            return Err(DeployError::Cancelled);
        }

        reporter.set_phase(
            DeployPhase::Upload,
            &format!("Uploading to {}", target.destination()),
        );

        let counters = UploadCounters {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total: files.len() as u64,
            total_bytes,
        };
        let backoff = CooldownOptions {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        };

        let uploads: Vec<_> = files
            .iter()
            .map(|file| {
                self.upload_with_retry(&target, file, reporter, &counters, config.retries, &backoff)
            })
            .collect();
        futures::stream::iter(uploads)
            .buffer_unordered(UPLOAD_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;

        if self.is_cancelled(reporter) {
            return Err(DeployError::Cancelled);
        }

        let total = counters.total;
        let uploaded = counters.completed.load(Ordering::SeqCst);
        let failures = counters.failed.load(Ordering::SeqCst);
        if failures == total && total > 0 {
            return Err(DeployError::TransferError(format!(
                "All {} file uploads failed",
                total
            )));
        }
        if failures > 0 {
            reporter.log(
                DeployLogLevel::Warn,
                format!("{} of {} files failed to upload", failures, total),
            );
        }

        reporter.set_phase(DeployPhase::Process, "Running post-deploy commands");
        for command in command_lines(&options, "postDeployCommands") {
            if self.is_cancelled(reporter) {
                return Err(DeployError::Cancelled);
            }
            reporter.log(DeployLogLevel::Info, format!("Running: {}", command));
            self.run_remote(&target, &command, reporter).await?;
        }

        reporter.log(
            DeployLogLevel::Success,
            format!(
                "Uploaded {} files to {}:{}",
                uploaded,
                target.host,
                target.remote_path
            ),
        );

        // No public URL for plain server deployments
        Ok(DeployResult::ok(None)
            .with_info("filesUploaded", uploaded)
            .with_info("filesFailed", failures)
            .with_info("bytesTotal", total_bytes))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl SshAdapter {
    async fn run_remote(
        &self,
        target: &SshTarget,
        command: &str,
        reporter: &Reporter,
    ) -> Result<(), DeployError> {
        let (program, args) = target.ssh_invocation(command);
        CliRunner::new(program).args(args).run(reporter).await?;
        Ok(())
    }

    /// Upload one file, retrying failures with exponential backoff up to
    /// `retries` extra attempts. Named method so the upload stream maps
    /// each file to a plain future instead of a capturing async block.
    async fn upload_with_retry(
        &self,
        target: &SshTarget,
        file: &ArtifactFile,
        reporter: &Reporter,
        counters: &UploadCounters,
        retries: u32,
        backoff: &CooldownOptions,
    ) {
        // Skipped, not failed: cancellation is not an error on the file
        // level
        if self.is_cancelled(reporter) {
            return;
        }

        let mut attempt = 0u32;
        loop {
            match transfer_file(target, file).await {
                Ok(()) => {
                    let done = counters.completed.fetch_add(1, Ordering::SeqCst) + 1;
                    let pct =
                        ((done + counters.failed.load(Ordering::SeqCst)) * 100 / counters.total)
                            as u8;
                    reporter.progress_files(
                        pct,
                        &format!("Uploaded {}", file.relative),
                        done,
                        counters.total,
                        Some(counters.total_bytes),
                    );
                    return;
                }
                Err(e) if attempt < retries && !self.is_cancelled(reporter) => {
                    reporter.log(
                        DeployLogLevel::Warn,
                        format!("Retrying {} (attempt {}): {}", file.relative, attempt + 2, e),
                    );
                    tokio::time::sleep(calc_exp_backoff(backoff, attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    reporter.log(
                        DeployLogLevel::Error,
                        format!("Failed to upload {}: {}", file.relative, e),
                    );
                    return;
                }
            }
        }
    }
}

/// Shared counters for the concurrent upload stream
struct UploadCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    total: u64,
    total_bytes: u64,
}

/// Split a newline-separated command option into trimmed lines
fn command_lines(
    options: &serde_json::Map<String, serde_json::Value>,
    name: &str,
) -> Vec<String> {
    options
        .get(name)
        .and_then(|v| v.as_str())
        .map(|s| {
            s.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// One `mkdir -p` covering the remote base and every file's parent
fn mkdir_command(remote_path: &str, files: &[ArtifactFile]) -> String {
    let mut dirs: Vec<String> = vec![shell_quote(remote_path)];
    let mut seen = std::collections::BTreeSet::new();
    for file in files {
        if let Some((parent, _)) = file.relative.rsplit_once('/') {
            if seen.insert(parent.to_string()) {
                dirs.push(shell_quote(&remote_join(remote_path, parent)));
            }
        }
    }
    format!("mkdir -p {}", dirs.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::Map;

    use crate::deploy::reporter::NullObserver;

    #[test]
    fn test_validate_requires_host_and_credential() {
        let adapter = SshAdapter::new();
        let config = DeployConfig::new(Platform::Ssh);
        let report = adapter.validate_config(&config);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("host")));
        assert!(report.errors.iter().any(|e| e.contains("privateKey")));
    }

    #[test]
    fn test_ssh_invocation_with_key() {
        let target = SshTarget {
            host: "example.com".into(),
            port: 2222,
            username: "deploy".into(),
            password: None,
            private_key: Some("/home/me/.ssh/id_ed25519".into()),
            remote_path: "/srv/www".into(),
        };
        let (program, args) = target.ssh_invocation("uptime");
        assert_eq!(program, "ssh");
        assert!(args.contains(&"-oBatchMode=yes".to_string()));
        assert!(args.contains(&"2222".to_string()));
        assert!(args.contains(&"deploy@example.com".to_string()));
        assert_eq!(args.last().unwrap(), "uptime");
    }

    #[test]
    fn test_scp_invocation_with_password() {
        let target = SshTarget {
            host: "example.com".into(),
            port: 22,
            username: "deploy".into(),
            password: Some("hunter2".into()),
            private_key: None,
            remote_path: "/srv/www".into(),
        };
        let (program, args) =
            target.scp_invocation(Path::new("/tmp/index.html"), "/srv/www/index.html");
        assert_eq!(program, "sshpass");
        assert_eq!(args[0], "-p");
        assert_eq!(args[1], "hunter2");
        assert_eq!(args[2], "scp");
        assert!(args.last().unwrap().ends_with("'/srv/www/index.html'"));
    }

    #[test]
    fn test_mkdir_command_unique_parents() {
        let files = vec![
            ArtifactFile {
                path: "/tmp/a".into(),
                relative: "assets/css/app.css".into(),
                size: 1,
            },
            ArtifactFile {
                path: "/tmp/b".into(),
                relative: "assets/css/site.css".into(),
                size: 1,
            },
            ArtifactFile {
                path: "/tmp/c".into(),
                relative: "index.html".into(),
                size: 1,
            },
        ];
        let cmd = mkdir_command("/srv/www", &files);
        assert_eq!(cmd, "mkdir -p '/srv/www' '/srv/www/assets/css'");
    }

    #[tokio::test]
    async fn test_upload_retries_then_counts_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>").unwrap();

        let adapter = SshAdapter::new();
        // Port 1 on loopback refuses immediately; scp never succeeds
        let target = SshTarget {
            host: "localhost".into(),
            port: 1,
            username: "nobody".into(),
            password: None,
            private_key: Some("/nonexistent/id_ed25519".into()),
            remote_path: "/srv/www".into(),
        };
        let file = ArtifactFile {
            path: dir.path().join("index.html"),
            relative: "index.html".into(),
            size: 6,
        };
        let counters = UploadCounters {
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total: 1,
            total_bytes: 6,
        };
        let backoff = CooldownOptions {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };
        let reporter = Reporter::new(Arc::new(NullObserver), Arc::new(AtomicBool::new(false)));

        adapter
            .upload_with_retry(&target, &file, &reporter, &counters, 1, &backoff)
            .await;

        assert_eq!(counters.completed.load(Ordering::SeqCst), 0);
        assert_eq!(counters.failed.load(Ordering::SeqCst), 1);

        // One warn for the retry, one error for the final failure
        let logs = reporter.logs_snapshot();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].message.contains("Retrying"));
        assert!(logs[1].message.contains("Failed to upload"));
    }

    #[test]
    fn test_command_lines() {
        let mut options = Map::new();
        options.insert(
            "preDeployCommands".into(),
            serde_json::Value::String("  systemctl stop app \n\n echo ok ".into()),
        );
        assert_eq!(
            command_lines(&options, "preDeployCommands"),
            vec!["systemctl stop app", "echo ok"]
        );
    }
}
