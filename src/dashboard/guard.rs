//! Session guard for dashboard routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::COOKIE, HeaderMap};
use serde_json::Value;
use thiserror::Error;

use super::client_ip::ClientIpResolver;
use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::error::Denial;
use crate::security::{
    validate_credentials_blocking, Claims, CredentialValidator, CsrfGuard, SessionCodec,
    SessionError, SlidingWindowLimiter,
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Claim holding the signed-in username.
pub const USERNAME_CLAIM: &str = "username";

/// Generic failure message; never says which field was wrong.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// Why a login was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Too many attempts from this client; credentials were not evaluated.
    #[error("too many login attempts")]
    RateLimited { retry_after: Duration },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A verified dashboard session.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSession {
    pub username: String,
    pub claims: Claims,
}

/// Protects dashboard routes: login throttling, credential check, session
/// cookies and CSRF verification.
pub struct DashboardSessionGuard {
    codec: SessionCodec,
    csrf: CsrfGuard,
    credentials: Arc<CredentialValidator>,
    login_limiter: Arc<SlidingWindowLimiter<String>>,
    ip_resolver: Arc<dyn ClientIpResolver>,
    audit: Arc<dyn AuditSink>,
    secure_cookie: bool,
}

impl DashboardSessionGuard {
    pub fn new(
        codec: SessionCodec,
        credentials: Arc<CredentialValidator>,
        login_limiter: Arc<SlidingWindowLimiter<String>>,
        ip_resolver: Arc<dyn ClientIpResolver>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            codec,
            csrf: CsrfGuard::default(),
            credentials,
            login_limiter,
            ip_resolver,
            audit,
            secure_cookie: false,
        }
    }

    /// Mark the session cookie `Secure` (HTTPS deployments).
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    /// Client address of a request, per the configured strategy.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        self.ip_resolver.resolve(headers, peer)
    }

    /// Attempt a login from `ip`. Returns the session token on success.
    pub async fn login(&self, ip: &str, username: &str, secret: &str) -> Result<String, LoginError> {
        let ip_key = ip.to_string();
        if let Err(retry_after) = self.login_limiter.check(&ip_key) {
            self.audit.record(AuditEntry::warn(
                ip,
                AuditEvent::LoginRateLimited,
                format!("Rate limit exceeded for IP: {}", ip),
            ));
            return Err(LoginError::RateLimited { retry_after });
        }

        let valid = validate_credentials_blocking(
            Arc::clone(&self.credentials),
            username.to_string(),
            secret.to_string(),
        )
        .await;

        if !valid {
            self.audit.record(AuditEntry::warn(
                ip,
                AuditEvent::LoginFailed,
                format!("Failed login attempt from IP: {} (username: {})", ip, username),
            ));
            return Err(LoginError::InvalidCredentials);
        }

        self.login_limiter.reset(&ip_key);

        let mut claims = Claims::new();
        claims.insert(USERNAME_CLAIM.to_string(), Value::String(username.to_string()));
        self.csrf.attach(&mut claims);
        let token = self.codec.issue(claims)?;

        self.audit.record(AuditEntry::info(
            ip,
            AuditEvent::LoginSucceeded,
            format!("Successful login from IP: {}", ip),
        ));
        Ok(token)
    }

    /// Session carried by the request's cookie, if valid.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<DashboardSession> {
        let token = cookie_value(headers, SESSION_COOKIE)?;
        match self.session_from_token(token) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!("rejected session cookie: {}", e);
                None
            }
        }
    }

    /// Verify a raw session token.
    pub fn session_from_token(&self, token: &str) -> Result<DashboardSession, Denial> {
        let claims = self
            .codec
            .verify(token)
            .map_err(|_| Denial::SessionInvalid)?;
        let username = claims
            .get(USERNAME_CLAIM)
            .and_then(Value::as_str)
            .ok_or(Denial::SessionInvalid)?
            .to_string();
        Ok(DashboardSession { username, claims })
    }

    /// CSRF token bound to a session.
    pub fn csrf_token<'a>(&self, session: &'a DashboardSession) -> Option<&'a str> {
        self.csrf.token_from(&session.claims)
    }

    /// Check the token submitted with a state-changing request.
    pub fn verify_csrf(
        &self,
        session: &DashboardSession,
        supplied: Option<&str>,
        ip: &str,
    ) -> Result<(), Denial> {
        let ok = supplied.is_some_and(|token| self.csrf.verify(&session.claims, token));
        if ok {
            return Ok(());
        }
        self.audit.record(AuditEntry::warn(
            ip,
            AuditEvent::CsrfMismatch,
            format!("CSRF verification failed for user {}", session.username),
        ));
        Err(Denial::CsrfMismatch)
    }

    /// Record a logout.
    pub fn logout(&self, ip: &str) {
        self.audit.record(AuditEntry::info(
            ip,
            AuditEvent::Logout,
            format!("User logged out from IP: {}", ip),
        ));
    }

    /// `Set-Cookie` value carrying a session token.
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
            SESSION_COOKIE,
            token,
            self.codec.timeout().as_secs()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value removing the session.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict",
            SESSION_COOKIE
        )
    }

    /// Human-readable lockout message for the login form.
    pub fn rate_limited_message(&self) -> String {
        let minutes = self.login_limiter.config().window.as_secs().div_ceil(60).max(1);
        format!(
            "Too many login attempts. Please try again in {} minutes.",
            minutes
        )
    }
}

/// Value of the named cookie in the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
