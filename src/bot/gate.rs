//! Authorization gate for bot commands.
//!
//! A request travels `Received -> IdentityCheck -> RateCheck -> Admitted`.
//! Each check is an [`Interceptor`]; the first one to reject ends the chain
//! with a [`Denial`] and the gate writes the audit entry for it.

use std::sync::Arc;

use super::request::{BotRequest, UserId};
use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::error::Denial;
use crate::security::SlidingWindowLimiter;

/// Result of one interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here.
    Reject(Denial),
}

/// One stage of the gate.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &BotRequest) -> Flow;
}

/// Only the configured privileged user passes.
#[derive(Debug, Clone, Copy)]
pub struct IdentityCheck {
    privileged: UserId,
}

impl IdentityCheck {
    pub fn new(privileged: UserId) -> Self {
        Self { privileged }
    }
}

impl Interceptor for IdentityCheck {
    fn intercept(&self, request: &BotRequest) -> Flow {
        if request.caller.user_id == self.privileged {
            Flow::Continue
        } else {
            Flow::Reject(Denial::Unauthorized)
        }
    }
}

/// Per-user command throttling.
#[derive(Debug, Clone)]
pub struct RateCheck {
    limiter: Arc<SlidingWindowLimiter<UserId>>,
}

impl RateCheck {
    pub fn new(limiter: Arc<SlidingWindowLimiter<UserId>>) -> Self {
        Self { limiter }
    }
}

impl Interceptor for RateCheck {
    fn intercept(&self, request: &BotRequest) -> Flow {
        match self.limiter.check(&request.caller.user_id) {
            Ok(_) => Flow::Continue,
            Err(retry_after) => Flow::Reject(Denial::RateLimited { retry_after }),
        }
    }
}

/// Outcome of running a request through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Admitted,
    Denied(Denial),
}

impl GateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateDecision::Admitted)
    }
}

/// Single-identity gate in front of privileged commands.
pub struct AuthorizationGate {
    command_chain: Vec<Box<dyn Interceptor>>,
    callback_chain: Vec<Box<dyn Interceptor>>,
    audit: Arc<dyn AuditSink>,
}

impl AuthorizationGate {
    /// Gate admitting only `privileged`, throttled by `limiter`.
    ///
    /// Button callbacks pass the identity check only; they answer a prompt
    /// that already consumed a command admission.
    pub fn new(
        privileged: UserId,
        limiter: Arc<SlidingWindowLimiter<UserId>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            command_chain: vec![
                Box::new(IdentityCheck::new(privileged)),
                Box::new(RateCheck::new(limiter)),
            ],
            callback_chain: vec![Box::new(IdentityCheck::new(privileged))],
            audit,
        }
    }

    /// Append a stage to the command chain.
    pub fn with_command_stage(mut self, stage: impl Interceptor + 'static) -> Self {
        self.command_chain.push(Box::new(stage));
        self
    }

    /// Run a command through the gate.
    pub fn admit_command(&self, request: &BotRequest) -> GateDecision {
        let decision = run_chain(&self.command_chain, request);
        match &decision {
            GateDecision::Admitted => self.audit.record(AuditEntry::info(
                request.caller.user_id.to_string(),
                AuditEvent::CommandAdmitted,
                format!("Command from {}: {}", request.caller, request.text),
            )),
            GateDecision::Denied(denial) => self.record_denial(request, denial, "access"),
        }
        decision
    }

    /// Run a button callback through the gate.
    pub fn admit_callback(&self, request: &BotRequest) -> GateDecision {
        let decision = run_chain(&self.callback_chain, request);
        match &decision {
            GateDecision::Admitted => self.audit.record(AuditEntry::info(
                request.caller.user_id.to_string(),
                AuditEvent::CallbackAdmitted,
                format!("Callback from {}: {}", request.caller, request.text),
            )),
            GateDecision::Denied(denial) => self.record_denial(request, denial, "callback"),
        }
        decision
    }

    fn record_denial(&self, request: &BotRequest, denial: &Denial, what: &str) {
        let subject = request.caller.user_id.to_string();
        let entry = match denial {
            Denial::Unauthorized => AuditEntry::warn(
                subject,
                AuditEvent::Unauthorized,
                format!("Unauthorized {} attempt from user {}", what, request.caller),
            ),
            Denial::RateLimited { retry_after } => AuditEntry::warn(
                subject,
                AuditEvent::RateLimited,
                format!(
                    "Rate limit exceeded for user {}, retry after {}s",
                    request.caller,
                    retry_after.as_secs()
                ),
            ),
            other => AuditEntry::warn(
                subject,
                AuditEvent::Unauthorized,
                format!("Request from {} refused: {}", request.caller, other),
            ),
        };
        self.audit.record(entry);
    }
}

fn run_chain(chain: &[Box<dyn Interceptor>], request: &BotRequest) -> GateDecision {
    for stage in chain {
        if let Flow::Reject(denial) = stage.intercept(request) {
            return GateDecision::Denied(denial);
        }
    }
    GateDecision::Admitted
}
