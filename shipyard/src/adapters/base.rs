//! Shared adapter behavior: artifact checks, file enumeration, size
//! formatting, and the external-CLI runner used by adapters that shell out
//! to a platform command instead of speaking the protocol directly.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::models::DeployLogLevel;

/// Directories never uploaded, regardless of filters
const ALWAYS_EXCLUDED_DIRS: &[&str] = &["node_modules", "target", "__pycache__", "vendor"];

/// One file staged for upload
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the artifact root, with `/` separators
    pub relative: String,

    /// File size in bytes
    pub size: u64,
}

/// Resolve and verify the artifact directory: it must exist and contain at
/// least one entry. Fails fast with an error naming the directory.
pub async fn check_artifact_dir(dist_dir: &str) -> Result<PathBuf, DeployError> {
    let dir = Dir::new(dist_dir);

    if !dir.exists().await {
        return Err(DeployError::ValidationError(format!(
            "Artifact directory does not exist: {}",
            dist_dir
        )));
    }

    if dir.is_empty().await? {
        return Err(DeployError::ValidationError(format!(
            "Artifact directory is empty: {}",
            dist_dir
        )));
    }

    Ok(dir.path().to_path_buf())
}

/// Recursively enumerate the files to upload under `root`.
///
/// Hidden entries and dependency directories are always skipped; `include`
/// and `exclude` are gitignore-style glob filters. Returns the files and
/// their aggregate size.
pub fn enumerate_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<(Vec<ArtifactFile>, u64), DeployError> {
    let exclude_matcher = build_matcher(root, exclude)?;
    let include_matcher = if include.is_empty() {
        None
    } else {
        Some(build_matcher(root, include)?)
    };

    let mut files = Vec::new();
    let mut total_bytes = 0u64;

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() > 0 && name.starts_with('.') {
            return false;
        }
        if entry.file_type().is_dir() && ALWAYS_EXCLUDED_DIRS.contains(&name.as_ref()) {
            return false;
        }
        true
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            DeployError::ValidationError(format!("Failed to enumerate artifact files: {}", e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        if exclude_matcher
            .matched_path_or_any_parents(&rel, false)
            .is_ignore()
        {
            continue;
        }
        if let Some(matcher) = &include_matcher {
            if !matcher.matched_path_or_any_parents(&rel, false).is_ignore() {
                continue;
            }
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        total_bytes += size;
        files.push(ArtifactFile {
            path: entry.path().to_path_buf(),
            relative: unix_path(&rel),
            size,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok((files, total_bytes))
}

fn build_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore, DeployError> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder.add_line(None, pattern).map_err(|e| {
            DeployError::ValidationError(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?;
    }
    builder
        .build()
        .map_err(|e| DeployError::ValidationError(format!("Invalid glob filters: {}", e)))
}

fn unix_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Human-readable size formatting
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Strip ANSI color codes from CLI output
pub fn strip_ansi(line: &str) -> String {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    let re = ANSI_RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());
    re.replace_all(line, "").into_owned()
}

/// Default pattern matching a URL-shaped token in CLI output
pub fn generic_url_pattern() -> Regex {
    Regex::new(r#"https?://[^\s"')\]]+"#).unwrap()
}

/// Captured output of an external CLI run
#[derive(Debug)]
pub struct CliOutput {
    /// Last URL matched in the output, if any
    pub url: Option<String>,

    /// All output lines, ANSI-stripped, stdout and stderr interleaved
    pub lines: Vec<String>,
}

/// Runs an external command and streams its output line-by-line through
/// the log callback, stripping ANSI codes and pattern-matching a deploy
/// URL along the way.
pub struct CliRunner {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    url_pattern: Option<Regex>,
    cancellable: bool,
}

impl CliRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            url_pattern: None,
            cancellable: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Pattern used to pick the deploy URL out of the output
    pub fn url_pattern(mut self, pattern: Regex) -> Self {
        self.url_pattern = Some(pattern);
        self
    }

    /// Disable the cooperative cancellation check; the process runs to
    /// completion (used by the custom-command adapter)
    pub fn no_cancel(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Spawn the command and stream its output. Non-zero exit is a
    /// transfer error; cancellation kills the child between lines.
    pub async fn run(&self, reporter: &Reporter) -> Result<CliOutput, DeployError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The deploy future can be dropped by the orchestrator timeout;
            // the child must not outlive it
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| {
            DeployError::TransferError(format!("Failed to run {}: {}", self.program, e))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout_lines = stdout.map(|s| BufReader::new(s).lines());
        let mut stderr_lines = stderr.map(|s| BufReader::new(s).lines());

        let mut url: Option<String> = None;
        let mut lines: Vec<String> = Vec::new();

        loop {
            if self.cancellable && reporter.is_cancelled() {
                let _ = child.kill().await;
                return Err(DeployError::Cancelled);
            }

            tokio::select! {
                line = next_line(&mut stdout_lines), if stdout_lines.is_some() => {
                    match line? {
                        Some(raw) => self.note_line(&raw, DeployLogLevel::Info, reporter, &mut url, &mut lines),
                        None => stdout_lines = None,
                    }
                }
                line = next_line(&mut stderr_lines), if stderr_lines.is_some() => {
                    match line? {
                        Some(raw) => self.note_line(&raw, DeployLogLevel::Warn, reporter, &mut url, &mut lines),
                        None => stderr_lines = None,
                    }
                }
                // Re-check the cancellation flag even when the child is quiet
                _ = tokio::time::sleep(std::time::Duration::from_millis(200)),
                    if self.cancellable && (stdout_lines.is_some() || stderr_lines.is_some()) => {}
                else => break,
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(DeployError::TransferError(format!(
                "{} exited with status {}",
                self.program, code
            )));
        }

        Ok(CliOutput { url, lines })
    }

    fn note_line(
        &self,
        raw: &str,
        level: DeployLogLevel,
        reporter: &Reporter,
        url: &mut Option<String>,
        lines: &mut Vec<String>,
    ) {
        let line = strip_ansi(raw.trim_end());
        if line.trim().is_empty() {
            return;
        }
        if let Some(pattern) = &self.url_pattern {
            if let Some(m) = pattern.find(&line) {
                *url = Some(m.as_str().trim_end_matches(['.', ',']).to_string());
            }
        }
        reporter.log(level, line.clone());
        lines.push(line);
    }
}

async fn next_line(
    lines: &mut Option<tokio::io::Lines<BufReader<impl tokio::io::AsyncRead + Unpin>>>,
) -> Result<Option<String>, std::io::Error> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m done"), "ok done");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_url_pattern() {
        let re = generic_url_pattern();
        let m = re.find("Deployed to https://demo.netlify.app now").unwrap();
        assert_eq!(m.as_str(), "https://demo.netlify.app");
    }

    #[test]
    fn test_enumerate_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("index.html"), "<html>").unwrap();
        std::fs::create_dir_all(root.join("assets")).unwrap();
        std::fs::write(root.join("assets/app.js"), "js").unwrap();
        std::fs::write(root.join(".hidden"), "nope").unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "nope").unwrap();

        let (files, total) = enumerate_files(root, &[], &[]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["assets/app.js", "index.html"]);
        assert_eq!(total, 8);
    }

    #[test]
    fn test_enumerate_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("index.html"), "x").unwrap();
        std::fs::write(root.join("readme.md"), "x").unwrap();
        std::fs::write(root.join("app.map"), "x").unwrap();

        let (files, _) = enumerate_files(root, &[], &["*.map".to_string()]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["index.html", "readme.md"]);

        let (files, _) = enumerate_files(root, &["*.html".to_string()], &[]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["index.html"]);
    }

    #[tokio::test]
    async fn test_check_artifact_dir_missing() {
        let err = check_artifact_dir("/definitely/not/here").await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[tokio::test]
    async fn test_check_artifact_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_artifact_dir(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
