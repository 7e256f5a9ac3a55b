//! Progress, log and status streaming for an in-flight deployment.
//!
//! The caller supplies a [`DeployObserver`]; the orchestrator wraps it in a
//! [`Reporter`] that buffers log entries for history, maps per-phase
//! progress into the overall 0-100 scale, and keeps the overall value
//! monotonic across phases. Adapters only ever talk to the `Reporter`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;

use crate::models::{DeployLogEntry, DeployLogLevel, DeployPhase, DeployProgress, DeployStatus};

/// Narrow observer interface for deployment events.
///
/// All methods have no-op defaults; callers override what they need.
/// Volumes are small (tens to low-hundreds of events per deployment), so
/// delivery is synchronous and in order.
pub trait DeployObserver: Send + Sync {
    fn on_progress(&self, _progress: &DeployProgress) {}
    fn on_log(&self, _entry: &DeployLogEntry) {}
    fn on_status(&self, _status: DeployStatus) {}
}

/// Observer that discards everything
pub struct NullObserver;

impl DeployObserver for NullObserver {}

/// Event sink handed to adapters during one deployment
pub struct Reporter {
    observer: Arc<dyn DeployObserver>,
    logs: Mutex<Vec<DeployLogEntry>>,
    phase: Mutex<DeployPhase>,
    overall: AtomicU8,
    cancelled: Arc<AtomicBool>,
}

impl Reporter {
    pub fn new(observer: Arc<dyn DeployObserver>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            observer,
            logs: Mutex::new(Vec::new()),
            phase: Mutex::new(DeployPhase::Init),
            overall: AtomicU8::new(0),
            cancelled,
        }
    }

    /// Whether cancellation has been requested.
    ///
    /// Adapters poll this between file operations; it never interrupts an
    /// in-flight transfer.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Current phase
    pub fn phase(&self) -> DeployPhase {
        *self.phase.lock().unwrap()
    }

    /// Overall progress reached so far, 0-100
    pub fn overall_progress(&self) -> u8 {
        self.overall.load(Ordering::SeqCst)
    }

    /// Enter a phase and emit a progress event at its floor
    pub fn set_phase(&self, phase: DeployPhase, message: &str) {
        *self.phase.lock().unwrap() = phase;
        self.emit(0, message, None, None, None);
    }

    /// Emit a progress event within the current phase (0-100 within the
    /// phase; mapped into the phase's overall range)
    pub fn progress(&self, phase_progress: u8, message: &str) {
        self.emit(phase_progress, message, None, None, None);
    }

    /// Emit a progress event carrying file counters
    pub fn progress_files(
        &self,
        phase_progress: u8,
        message: &str,
        files_completed: u64,
        files_total: u64,
        bytes_total: Option<u64>,
    ) {
        self.emit(
            phase_progress,
            message,
            Some(files_completed),
            Some(files_total),
            bytes_total,
        );
    }

    fn emit(
        &self,
        phase_progress: u8,
        message: &str,
        files_completed: Option<u64>,
        files_total: Option<u64>,
        bytes_total: Option<u64>,
    ) {
        let phase = self.phase();
        let (floor, ceiling) = phase.range();
        let phase_progress = phase_progress.min(100);
        let span = (ceiling - floor) as u16;
        let mapped = floor + ((phase_progress as u16 * span) / 100) as u8;

        // Overall progress is monotonic across phases
        let previous = self.overall.fetch_max(mapped, Ordering::SeqCst);
        let overall = previous.max(mapped);

        self.observer.on_progress(&DeployProgress {
            phase,
            progress: overall,
            phase_progress,
            message: message.to_string(),
            files_completed,
            files_total,
            bytes_total,
        });
    }

    /// Append a log entry and forward it to the observer
    pub fn log(&self, level: DeployLogLevel, message: impl Into<String>) {
        self.log_inner(level, message.into(), None);
    }

    /// Append a log entry with a structured payload
    pub fn log_data(&self, level: DeployLogLevel, message: impl Into<String>, data: Value) {
        self.log_inner(level, message.into(), Some(data));
    }

    fn log_inner(&self, level: DeployLogLevel, message: String, data: Option<Value>) {
        let entry = DeployLogEntry {
            timestamp: Utc::now(),
            level,
            message,
            phase: self.phase(),
            data,
        };
        self.observer.on_log(&entry);
        self.logs.lock().unwrap().push(entry);
    }

    /// Forward a status change to the observer
    pub fn status(&self, status: DeployStatus) {
        self.observer.on_status(status);
    }

    /// Snapshot of the log buffer so far
    pub fn logs_snapshot(&self) -> Vec<DeployLogEntry> {
        self.logs.lock().unwrap().clone()
    }

    /// Drain the log buffer (called once when the deployment ends)
    pub fn take_logs(&self) -> Vec<DeployLogEntry> {
        std::mem::take(&mut *self.logs.lock().unwrap())
    }
}
