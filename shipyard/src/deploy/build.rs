//! Pre-deploy build step
//!
//! Runs the configured build command through the shell, streaming its
//! output into the deployment log. A missing build tool is reported but
//! does not block the attempt; the command itself decides whether it can
//! run.

use tracing::debug;

use crate::adapters::base::CliRunner;
use crate::deploy::reporter::Reporter;
use crate::errors::DeployError;
use crate::models::{DeployLogLevel, DeployPhase};

/// Default build command when `build_before_deploy` is set and no command
/// is configured
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";

/// Run the build command, mapping subprocess failures to build errors
pub async fn run_build(command: &str, reporter: &Reporter) -> Result<(), DeployError> {
    reporter.set_phase(DeployPhase::Build, &format!("Building: {}", command));

    if let Some(tool) = first_word(command) {
        if !tool_on_path(tool).await {
            reporter.log(
                DeployLogLevel::Warn,
                format!("Build tool '{}' not found on PATH", tool),
            );
        }
    }

    let outcome = CliRunner::new("bash")
        .args(["-c", command])
        .run(reporter)
        .await;

    match outcome {
        Ok(_) => {
            reporter.progress(100, "Build finished");
            Ok(())
        }
        Err(DeployError::Cancelled) => Err(DeployError::Cancelled),
        Err(DeployError::TransferError(msg)) => Err(DeployError::BuildError(msg)),
        Err(e) => Err(DeployError::BuildError(e.to_string())),
    }
}

/// Whether a program resolves on PATH.
///
/// Advisory only; shell builtins and aliases resolve at run time, so a
/// negative answer must not block the build.
pub async fn tool_on_path(tool: &str) -> bool {
    let found = tokio::process::Command::new("which")
        .arg(tool)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);
    debug!(tool, found, "Build tool probe");
    found
}

fn first_word(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_word() {
        assert_eq!(first_word("npm run build"), Some("npm"));
        assert_eq!(first_word("   "), None);
    }

    #[tokio::test]
    async fn test_tool_on_path() {
        assert!(tool_on_path("ls").await);
        assert!(!tool_on_path("definitely-not-a-real-tool-9c4e").await);
    }
}
