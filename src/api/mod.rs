//! HTTP layer for remo.
//!
//! ## Endpoints
//!
//! ### Public
//! - `GET /health` - Health check
//! - `GET /` - Login page context
//! - `POST /login` - Login form submission (throttled per client IP)
//! - `GET|POST /logout` - Clear the session
//! - `POST /webhook/{secret}` - Chat transport updates
//!
//! ### Session required
//! - `GET /dashboard` - Dashboard page context (includes the CSRF token)
//! - `GET /api/status` - Machine status
//! - `GET /api/logs` - Recent audit entries, newest first
//! - `POST /api/commands/{command}` - Run a command (CSRF required, throttled per user)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use remo::api::{serve, AppState, ServerConfig};
//! use remo::{Config, DryRunActions, TracingAuditSink};
//!
//! #[tokio::main]
//! async fn main() -> remo::Result<()> {
//!     let config = Config::default();
//!     let state = AppState::from_config(&config, Arc::new(DryRunActions), Arc::new(TracingAuditSink))?;
//!     serve(ServerConfig::new("127.0.0.1", 8443), state).await
//! }
//! ```

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;
pub mod webhook;

// Re-export commonly used types
pub use middleware::{ClientIp, CSRF_HEADER, LOGIN_ROUTE};
pub use router::{create_router, serve, ServerConfig};
pub use state::AppState;
pub use types::{
    CommandInfo, CommandRequest, DashboardPage, ErrorResponse, LoginForm, LoginPage, LogsResponse,
};
pub use webhook::{MethodCall, Update};
