//! FTP/FTPS/SFTP adapter
//!
//! Drives `curl -T` as the transfer client. Uploads are sequential; FTP
//! servers commonly cap concurrent data connections, and curl creates
//! missing remote directories itself with `--ftp-create-dirs`.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::process::Command;

use crate::adapters::base::{self, ArtifactFile};
use crate::adapters::{DeployAdapter, PlatformInfo};
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::fields::{self, ConfigField, FieldType, ValidationReport};
use crate::models::{DeployConfig, DeployLogLevel, DeployPhase, DeployResult, Platform};

const FIELDS: &[ConfigField] = &[
    ConfigField {
        name: "host",
        label: "Host",
        field_type: FieldType::Text,
        required: true,
        default: None,
        pattern: None,
        env_var: Some("FTP_HOST"),
    },
    ConfigField {
        name: "port",
        label: "Port",
        field_type: FieldType::Number,
        required: false,
        default: Some("21"),
        pattern: None,
        env_var: Some("FTP_PORT"),
    },
    ConfigField {
        name: "username",
        label: "Username",
        field_type: FieldType::Text,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("FTP_USER"),
    },
    ConfigField {
        name: "password",
        label: "Password",
        field_type: FieldType::Password,
        required: false,
        default: None,
        pattern: None,
        env_var: Some("FTP_PASSWORD"),
    },
    ConfigField {
        name: "protocol",
        label: "Protocol",
        field_type: FieldType::Select(&["ftp", "ftps", "sftp"]),
        required: false,
        default: Some("ftp"),
        pattern: None,
        env_var: None,
    },
    ConfigField {
        name: "remotePath",
        label: "Remote path",
        field_type: FieldType::Text,
        required: false,
        default: Some("/"),
        pattern: None,
        env_var: Some("FTP_REMOTE_PATH"),
    },
];

pub const INFO: PlatformInfo = PlatformInfo {
    platform: Platform::Ftp,
    display_name: "FTP / SFTP",
    icon: "📁",
    requires_auth: true,
    fields: FIELDS,
};

pub struct FtpAdapter {
    cancelled: AtomicBool,
}

impl FtpAdapter {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Default for FtpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved curl upload parameters
struct FtpTarget {
    scheme: String,
    host: String,
    port: u64,
    credentials: Option<String>,
    remote_path: String,
}

impl FtpTarget {
    fn from_options(options: &serde_json::Map<String, serde_json::Value>) -> Self {
        let get = |name: &str| {
            options
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let scheme = get("protocol").unwrap_or_else(|| "ftp".to_string());
        let port = options
            .get("port")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
            .unwrap_or(if scheme == "sftp" { 22 } else { 21 });
        let credentials = match (get("username"), get("password")) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            (Some(user), None) => Some(user),
            _ => None,
        };
        Self {
            scheme,
            host: get("host").unwrap_or_default(),
            port,
            credentials,
            remote_path: get("remotePath").unwrap_or_else(|| "/".to_string()),
        }
    }

    fn remote_url(&self, relative: &str) -> String {
        // ftps uploads go over the plain ftp scheme with --ssl-reqd
        let scheme = if self.scheme == "ftps" { "ftp" } else { &self.scheme };
        let base = self.remote_path.trim_matches('/');
        if base.is_empty() {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, relative)
        } else {
            format!(
                "{}://{}:{}/{}/{}",
                scheme, self.host, self.port, base, relative
            )
        }
    }
}

/// Upload one file with curl, capturing stderr for the failure message
async fn upload_file(target: &FtpTarget, file: &ArtifactFile) -> Result<(), String> {
    let mut cmd = Command::new("curl");
    cmd.arg("-sS")
        .arg("--ftp-create-dirs")
        .arg("-T")
        .arg(&file.path)
        .arg(target.remote_url(&file.relative));
    if let Some(credentials) = &target.credentials {
        cmd.arg("-u").arg(credentials);
    }
    if target.scheme == "ftps" {
        cmd.arg("--ssl-reqd");
    }

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("Failed to run curl: {}", e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

#[async_trait]
impl DeployAdapter for FtpAdapter {
    fn platform(&self) -> Platform {
        Platform::Ftp
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
        let target = FtpTarget::from_options(&options);

        reporter.set_phase(
            DeployPhase::Upload,
            &format!("Uploading to {}://{}", target.scheme, target.host),
        );

        let total = files.len() as u64;
        let mut uploaded = 0u64;
        let mut failures = 0u64;
        for file in &files {
            if self.cancelled.load(Ordering::SeqCst) || reporter.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            match upload_file(&target, file).await {
                Ok(()) => {
                    uploaded += 1;
                    let pct = ((uploaded + failures) * 100 / total) as u8;
                    reporter.progress_files(
                        pct,
                        &format!("Uploaded {}", file.relative),
                        uploaded,
                        total,
                        Some(total_bytes),
                    );
                }
                Err(e) => {
                    failures += 1;
                    reporter.log(
                        DeployLogLevel::Error,
                        format!("Failed to upload {}: {}", file.relative, e),
                    );
                }
            }
        }

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

        reporter.set_phase(DeployPhase::Process, "Finalizing FTP deployment");
        reporter.log(
            DeployLogLevel::Success,
            format!(
                "Uploaded {} files to {}:{}",
                uploaded, target.host, target.remote_path
            ),
        );

        Ok(DeployResult::ok(None)
            .with_info("filesUploaded", uploaded)
            .with_info("filesFailed", failures)
            .with_info("bytesTotal", total_bytes))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn options(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_remote_url() {
        let mut opts = options(&[
            ("host", "ftp.example.com"),
            ("username", "anna"),
            ("password", "s3cret"),
            ("remotePath", "/site/"),
        ]);
        fields::apply_defaults(FIELDS, &mut opts);
        let target = FtpTarget::from_options(&opts);
        assert_eq!(
            target.remote_url("assets/app.js"),
            "ftp://ftp.example.com:21/site/assets/app.js"
        );
        assert_eq!(target.credentials.as_deref(), Some("anna:s3cret"));
    }

    #[test]
    fn test_remote_url_at_server_root() {
        let mut opts = options(&[("host", "ftp.example.com")]);
        fields::apply_defaults(FIELDS, &mut opts);
        let target = FtpTarget::from_options(&opts);
        // remotePath defaults to "/"; no double slash in the upload URL
        assert_eq!(
            target.remote_url("index.html"),
            "ftp://ftp.example.com:21/index.html"
        );
    }

    #[test]
    fn test_sftp_defaults_port_22() {
        let opts = options(&[("host", "example.com"), ("protocol", "sftp")]);
        let target = FtpTarget::from_options(&opts);
        assert_eq!(target.port, 22);
        assert!(target.remote_url("index.html").starts_with("sftp://"));
    }

    #[test]
    fn test_ftps_uses_ftp_scheme() {
        let opts = options(&[("host", "example.com"), ("protocol", "ftps")]);
        let target = FtpTarget::from_options(&opts);
        assert!(target.remote_url("index.html").starts_with("ftp://"));
    }

    #[test]
    fn test_validate_requires_host() {
        let adapter = FtpAdapter::new();
        let report = adapter.validate_config(&DeployConfig::new(Platform::Ftp));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("host")));
    }
}
