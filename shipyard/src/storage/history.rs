//! Deployment history persistence
//!
//! A bounded, most-recent-first list persisted as one JSON file. A
//! corrupt or unreadable file is treated as empty so one bad write can
//! never wedge future deployments.

use tracing::warn;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::models::DeployHistoryEntry;

pub const DEFAULT_MAX_ENTRIES: usize = 50;

pub struct HistoryStore {
    file: File,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(file: File) -> Self {
        Self {
            file,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(file: File, max_entries: usize) -> Self {
        Self { file, max_entries }
    }

    /// All entries, most recent first
    pub async fn load(&self) -> Vec<DeployHistoryEntry> {
        if !self.file.exists().await {
            return Vec::new();
        }
        match self.file.read_json().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    path = %self.file.path().display(),
                    error = %e,
                    "Discarding unreadable history file"
                );
                Vec::new()
            }
        }
    }

    /// Prepend an entry and drop the oldest beyond the cap
    pub async fn append(&self, entry: DeployHistoryEntry) -> Result<(), DeployError> {
        let mut entries = self.load().await;
        entries.insert(0, entry);
        entries.truncate(self.max_entries);
        self.file.write_json_atomic(&entries).await
    }

    pub async fn clear(&self) -> Result<(), DeployError> {
        self.file.delete().await
    }
}
