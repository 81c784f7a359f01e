//! Web dashboard access control.
//!
//! Public routes (login, logout) go through the per-IP login limiter and the
//! credential check. Protected routes need a valid signed session cookie,
//! and state-changing ones also a matching CSRF token.

pub mod client_ip;
mod guard;

pub use client_ip::{ClientIpResolver, ForwardedHeader, PeerAddress, UNKNOWN_CLIENT};
pub use guard::{
    cookie_value, DashboardSession, DashboardSessionGuard, LoginError,
    INVALID_CREDENTIALS_MESSAGE, SESSION_COOKIE, USERNAME_CLAIM,
};
