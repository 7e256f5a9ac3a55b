//! On-disk state layout
//!
//! All persistent state lives under one root (default `~/.shipyard`):
//!
//! ```text
//! .shipyard/
//!   history.json    deployment history, bounded
//!   configs.json    saved deployment configs, secrets encrypted
//! ```

use std::path::PathBuf;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

pub const STATE_DIR_NAME: &str = ".shipyard";
pub const HISTORY_FILE: &str = "history.json";
pub const CONFIGS_FILE: &str = "configs.json";

#[derive(Debug, Clone)]
pub struct StateLayout {
    root: Dir,
}

impl StateLayout {
    /// Layout rooted at an explicit directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Dir::new(root),
        }
    }

    /// Layout under the user's home directory, falling back to the
    /// current directory when no home is set
    pub fn default_location() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(STATE_DIR_NAME))
    }

    pub fn root(&self) -> &Dir {
        &self.root
    }

    /// Create the state directory
    pub async fn ensure(&self) -> Result<(), DeployError> {
        self.root.create().await
    }

    pub fn history_file(&self) -> File {
        self.root.file(HISTORY_FILE)
    }

    pub fn configs_file(&self) -> File {
        self.root.file(CONFIGS_FILE)
    }
}
