//! # remo
//!
//! Access control for a remote-control service reachable through a chat bot
//! and a web dashboard.
//!
//! Both entry points end in the same action layer (power, audio, display,
//! status), which is out of scope here. This crate decides whether a
//! command may reach it.
//!
//! ## Features
//!
//! - **Bot gate**: single privileged user, per-user sliding-window command
//!   limit, two-step confirmation for destructive commands
//! - **Dashboard guard**: per-IP login throttling, constant-time credential
//!   check, HMAC-signed stateless session cookies, CSRF tokens
//! - **Audit trail**: every admission and denial is recorded
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use remo::{api, Config, DryRunActions, TracingAuditSink};
//!
//! #[tokio::main]
//! async fn main() -> remo::Result<()> {
//!     remo::logging::try_init().ok();
//!
//!     let mut config = Config::default();
//!     config.apply_env();
//!     config.validate()?;
//!
//!     let state = api::AppState::from_config(
//!         &config,
//!         Arc::new(DryRunActions),
//!         Arc::new(TracingAuditSink),
//!     )?;
//!     api::serve(config.to_server_config()?, state).await
//! }
//! ```

pub mod action;
pub mod api;
pub mod audit;
pub mod bot;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod security;

// Re-export commonly used types
pub use action::{ActionError, ActionLayer, ActionOutcome, DryRunActions};
pub use audit::{
    AuditEntry, AuditEvent, AuditLevel, AuditSink, LogRecord, MemoryAuditSink, RecentAuditLog,
    TracingAuditSink,
};
pub use bot::{AuthorizationGate, BotReply, BotRequest, Caller, CommandDispatcher, GateDecision};
pub use config::{Config, ConfigError};
pub use dashboard::{DashboardSession, DashboardSessionGuard, LoginError};
pub use error::{Denial, RemoError, Result};
pub use security::{
    CredentialValidator, CsrfGuard, RateLimitConfig, SessionCodec, SigningKey,
    SlidingWindowLimiter,
};
