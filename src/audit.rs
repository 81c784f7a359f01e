//! Audit trail for access decisions.
//!
//! Every admission and denial produces one [`AuditEntry`]. The default sink
//! forwards entries to `tracing` under the `remo::audit` target, leaving
//! formatting and retention to whatever subscriber is installed.
//! [`RecentAuditLog`] additionally keeps the latest entries for the
//! dashboard log view.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use serde::Serialize;

/// Entries kept by [`RecentAuditLog`] by default.
pub const DEFAULT_RECENT_CAPACITY: usize = 200;

/// Longest message served to the dashboard, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEvent {
    CommandAdmitted,
    CallbackAdmitted,
    Unauthorized,
    RateLimited,
    ConfirmationRequested,
    ConfirmationCancelled,
    LoginSucceeded,
    LoginFailed,
    LoginRateLimited,
    Logout,
    CsrfMismatch,
    CollaboratorFailure,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandAdmitted => "command_admitted",
            Self::CallbackAdmitted => "callback_admitted",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::ConfirmationRequested => "confirmation_requested",
            Self::ConfirmationCancelled => "confirmation_cancelled",
            Self::LoginSucceeded => "login_succeeded",
            Self::LoginFailed => "login_failed",
            Self::LoginRateLimited => "login_rate_limited",
            Self::Logout => "logout",
            Self::CsrfMismatch => "csrf_mismatch",
            Self::CollaboratorFailure => "collaborator_failure",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub level: AuditLevel,
    /// Caller identity, handle or client IP.
    pub subject: String,
    pub event: AuditEvent,
    pub detail: String,
}

impl AuditEntry {
    pub fn info(subject: impl Into<String>, event: AuditEvent, detail: impl Into<String>) -> Self {
        Self::new(AuditLevel::Info, subject, event, detail)
    }

    pub fn warn(subject: impl Into<String>, event: AuditEvent, detail: impl Into<String>) -> Self {
        Self::new(AuditLevel::Warn, subject, event, detail)
    }

    pub fn error(subject: impl Into<String>, event: AuditEvent, detail: impl Into<String>) -> Self {
        Self::new(AuditLevel::Error, subject, event, detail)
    }

    fn new(
        level: AuditLevel,
        subject: impl Into<String>,
        event: AuditEvent,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            level,
            subject: subject.into(),
            event,
            detail: detail.into(),
        }
    }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Sink that emits entries as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        let AuditEntry {
            level,
            subject,
            event,
            detail,
        } = entry;
        match level {
            AuditLevel::Info => {
                tracing::info!(target: "remo::audit", %subject, %event, "{}", detail)
            }
            AuditLevel::Warn => {
                tracing::warn!(target: "remo::audit", %subject, %event, "{}", detail)
            }
            AuditLevel::Error => {
                tracing::error!(target: "remo::audit", %subject, %event, "{}", detail)
            }
        }
    }
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of entries recorded for `event`.
    pub fn count(&self, event: AuditEvent) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event == event)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// One line of the dashboard log view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub time: String,
    pub level: AuditLevel,
    pub message: String,
}

impl LogRecord {
    fn from_entry(entry: &AuditEntry, time: String) -> Self {
        Self {
            time,
            level: entry.level,
            message: entry.detail.chars().take(MAX_MESSAGE_CHARS).collect(),
        }
    }
}

/// Bounded ring buffer of recent entries that forwards every entry to an
/// inner sink.
pub struct RecentAuditLog {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
    inner: Arc<dyn AuditSink>,
}

impl RecentAuditLog {
    pub fn new(capacity: usize, inner: Arc<dyn AuditSink>) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            inner,
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, record: LogRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

impl fmt::Debug for RecentAuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentAuditLog")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl AuditSink for RecentAuditLog {
    fn record(&self, entry: AuditEntry) {
        let time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.push(LogRecord::from_entry(&entry, time));
        self.inner.record(entry);
    }
}
