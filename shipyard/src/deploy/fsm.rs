//! Deployment status machine
//!
//! Guards the [`DeployStatus`] lifecycle: `Idle → Preparing → (Building) →
//! Uploading → Processing → Success`, with `Failed` and `Cancelled`
//! reachable from every active state. Terminal states accept no further
//! transitions.

use tracing::debug;

use crate::errors::DeployError;
use crate::models::DeployStatus;

#[derive(Debug)]
pub struct StatusMachine {
    status: DeployStatus,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            status: DeployStatus::Idle,
        }
    }

    pub fn status(&self) -> DeployStatus {
        self.status
    }

    /// Move to `next`, or fail without changing state if the step is not
    /// a legal one
    pub fn advance(&mut self, next: DeployStatus) -> Result<DeployStatus, DeployError> {
        if self.can_advance(next) {
            debug!(from = ?self.status, to = ?next, "Deployment status change");
            self.status = next;
            Ok(next)
        } else {
            Err(DeployError::Internal(format!(
                "Illegal status transition: {:?} -> {:?}",
                self.status, next
            )))
        }
    }

    fn can_advance(&self, next: DeployStatus) -> bool {
        use DeployStatus::*;

        if self.status.is_terminal() {
            return false;
        }
        // Every active state may fail or be cancelled
        if matches!(next, Failed | Cancelled) {
            return self.status != Idle || next == Failed;
        }
        matches!(
            (self.status, next),
            (Idle, Preparing)
                | (Preparing, Building)
                | (Preparing, Uploading)
                | (Building, Uploading)
                | (Uploading, Processing)
                | (Processing, Success)
        )
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}
