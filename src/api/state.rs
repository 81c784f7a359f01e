//! Shared application state.

use std::sync::Arc;

use crate::action::ActionLayer;
use crate::audit::{AuditSink, RecentAuditLog, DEFAULT_RECENT_CAPACITY};
use crate::bot::{
    AuthorizationGate, CommandDispatcher, ConfirmationPolicy, PendingConfirmations, UserId,
};
use crate::config::{Config, DeviceSection};
use crate::dashboard::{client_ip, DashboardSessionGuard};
use crate::security::{
    load_or_create_secret, CredentialValidator, SessionCodec, SigningKey, SlidingWindowLimiter,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<DashboardSessionGuard>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub actions: Arc<dyn ActionLayer>,
    pub policy: Arc<ConfirmationPolicy>,
    /// Throttles dashboard commands per signed-in user.
    pub command_limiter: Arc<SlidingWindowLimiter<String>>,
    pub audit: Arc<dyn AuditSink>,
    /// Recent audit entries; also the sink behind `audit`.
    pub logs: Arc<RecentAuditLog>,
    pub webhook_secret: Arc<str>,
    /// Updates must carry the secret token header.
    pub require_secret_header: bool,
    pub bot_user_id: UserId,
    pub device: DeviceSection,
}

impl AppState {
    /// Build state from configuration, loading or generating the signing key
    /// and webhook secret under `data_dir` when they are not configured.
    pub fn from_config(
        config: &Config,
        actions: Arc<dyn ActionLayer>,
        audit: Arc<dyn AuditSink>,
    ) -> crate::Result<Self> {
        let key = match config.dashboard.secret_key {
            Some(ref hex_key) => SigningKey::from_hex(hex_key)?,
            None => SigningKey::load_or_generate(&config.session_key_path())?,
        };
        let webhook_secret = match config.bot.webhook_secret {
            Some(ref secret) => secret.clone(),
            None => load_or_create_secret(&config.webhook_secret_path())?,
        };
        Self::from_parts(config, &key, webhook_secret, actions, audit)
    }

    /// Build state from configuration and already-resolved secrets.
    pub fn from_parts(
        config: &Config,
        key: &SigningKey,
        webhook_secret: String,
        actions: Arc<dyn ActionLayer>,
        audit: Arc<dyn AuditSink>,
    ) -> crate::Result<Self> {
        let policy = config.confirmation_policy();
        let logs = Arc::new(RecentAuditLog::new(DEFAULT_RECENT_CAPACITY, audit));
        let audit: Arc<dyn AuditSink> = logs.clone();

        let command_limiter = Arc::new(SlidingWindowLimiter::new(config.command_rate_limit()));
        let gate = AuthorizationGate::new(config.bot.user_id, command_limiter, Arc::clone(&audit));
        let dispatcher = CommandDispatcher::new(
            gate,
            policy.clone(),
            PendingConfirmations::new(config.confirmation_ttl()),
            Arc::clone(&actions),
            Arc::clone(&audit),
        );

        let codec = SessionCodec::new(key, config.session_timeout())?;
        let credentials = CredentialValidator::new(
            config.dashboard.username.trim(),
            &config.dashboard.password,
        );
        let guard = DashboardSessionGuard::new(
            codec,
            Arc::new(credentials),
            Arc::new(SlidingWindowLimiter::new(config.login_rate_limit())),
            client_ip::resolver(config.dashboard.trust_proxy_headers, config.proxy_header()?),
            Arc::clone(&audit),
        )
        .with_secure_cookie(config.dashboard.secure_cookie);

        Ok(Self {
            guard: Arc::new(guard),
            dispatcher: Arc::new(dispatcher),
            actions,
            policy: Arc::new(policy),
            command_limiter: Arc::new(SlidingWindowLimiter::new(
                config.dashboard_command_rate_limit(),
            )),
            audit,
            logs,
            webhook_secret: Arc::from(webhook_secret),
            require_secret_header: config.bot.require_secret_header,
            bot_user_id: config.bot.user_id,
            device: config.device.clone(),
        })
    }
}
