//! Two-step confirmation for destructive commands.
//!
//! Commands flagged in the [`ConfirmationPolicy`] are parked as a
//! [`PendingConfirmation`] for the requesting user. They run only when the
//! same user answers with the matching affirm callback before the entry
//! expires.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::request::UserId;

/// Callback data prefix for an affirm button.
pub const CONFIRM_PREFIX: &str = "confirm_";

/// Callback data for a cancel button.
pub const CANCEL_DATA: &str = "cancel";

/// Which commands need an explicit affirm.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationPolicy {
    flags: HashMap<String, bool>,
}

impl ConfirmationPolicy {
    /// Command names are matched case-insensitively. When two entries differ
    /// only in case, either one asking for confirmation wins.
    pub fn new(flags: HashMap<String, bool>) -> Self {
        let mut normalized = HashMap::with_capacity(flags.len());
        for (name, flag) in flags {
            let entry = normalized.entry(name.to_ascii_lowercase()).or_insert(false);
            *entry |= flag;
        }
        Self { flags: normalized }
    }

    /// Unlisted commands run without confirmation.
    pub fn requires(&self, command: &str) -> bool {
        self.flags
            .get(&command.to_ascii_lowercase())
            .copied()
            .unwrap_or(false)
    }

    /// Every listed command with its flag, in no particular order.
    pub fn commands(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.flags.iter().map(|(name, flag)| (name.as_str(), *flag))
    }
}

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Confirm(String),
    Cancel,
    Unknown,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        if data == CANCEL_DATA {
            return Self::Cancel;
        }
        match data.strip_prefix(CONFIRM_PREFIX) {
            Some(command) if !command.is_empty() => Self::Confirm(command.to_string()),
            _ => Self::Unknown,
        }
    }
}

/// Affirm callback data for `command`.
pub fn confirm_data(command: &str) -> String {
    format!("{}{}", CONFIRM_PREFIX, command)
}

/// A command waiting for its affirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub command: String,
    pub args: Vec<String>,
    requested_at: Instant,
}

/// Pending confirmations, at most one per user.
#[derive(Debug)]
pub struct PendingConfirmations {
    pending: Mutex<HashMap<UserId, PendingConfirmation>>,
    ttl: Duration,
}

impl Default for PendingConfirmations {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl PendingConfirmations {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Park `command` for `user`, replacing any earlier pending command.
    pub fn request(&self, user: UserId, command: &str, args: &[String]) {
        self.request_at(user, command, args, Instant::now());
    }

    pub fn request_at(&self, user: UserId, command: &str, args: &[String], now: Instant) {
        let entry = PendingConfirmation {
            command: command.to_string(),
            args: args.to_vec(),
            requested_at: now,
        };
        self.lock().insert(user, entry);
    }

    /// Take the pending command if it is `command` and still fresh.
    ///
    /// A mismatching command leaves the entry in place; an expired one is
    /// discarded.
    pub fn take_confirmed(&self, user: UserId, command: &str) -> Option<PendingConfirmation> {
        self.take_confirmed_at(user, command, Instant::now())
    }

    pub fn take_confirmed_at(
        &self,
        user: UserId,
        command: &str,
        now: Instant,
    ) -> Option<PendingConfirmation> {
        let mut pending = self.lock();
        let entry = pending.get(&user)?;

        if now.saturating_duration_since(entry.requested_at) > self.ttl {
            pending.remove(&user);
            return None;
        }
        if entry.command != command {
            return None;
        }
        pending.remove(&user)
    }

    /// Drop whatever `user` had pending.
    pub fn cancel(&self, user: UserId) -> Option<PendingConfirmation> {
        self.lock().remove(&user)
    }

    /// Command currently pending for `user`.
    pub fn pending_for(&self, user: UserId) -> Option<PendingConfirmation> {
        self.lock().get(&user).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, PendingConfirmation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
