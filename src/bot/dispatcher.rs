//! Routes gated bot requests to the action layer.

use std::sync::Arc;

use serde::Serialize;

use super::confirm::{confirm_data, CallbackAction, ConfirmationPolicy, PendingConfirmations, CANCEL_DATA};
use super::gate::{AuthorizationGate, GateDecision};
use super::request::{BotRequest, Caller};
use crate::action::{ActionLayer, ActionOutcome};
use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::error::Denial;

pub const UNAUTHORIZED_REPLY: &str = "⛔ Access denied. You are not authorized to use this bot.";
pub const CALLBACK_UNAUTHORIZED_REPLY: &str = "⛔ Access denied";
pub const RATE_LIMITED_REPLY: &str = "⚠️ Too many commands. Please wait a moment.";
pub const FAILURE_REPLY: &str = "❌ Something went wrong while running that command.";
pub const CANCELLED_REPLY: &str = "❌ Cancelled";
pub const NOTHING_PENDING_REPLY: &str = "⌛ Nothing to confirm. Send the command again.";

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotReply {
    /// The gate refused the request.
    Denied { message: String },
    /// Affirm/cancel prompt for a destructive command.
    ConfirmationRequired {
        command: String,
        message: String,
        confirm_data: String,
        cancel_data: String,
    },
    /// The action layer reported an outcome.
    Completed(ActionOutcome),
    /// The action layer failed.
    Failed { message: String },
    /// Informational reply (cancelled, nothing pending).
    Notice { message: String },
    /// Nothing to answer.
    Ignored,
}

impl BotReply {
    /// Text to show the user, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Denied { message }
            | Self::ConfirmationRequired { message, .. }
            | Self::Failed { message }
            | Self::Notice { message } => Some(message),
            Self::Completed(outcome) => Some(&outcome.message),
            Self::Ignored => None,
        }
    }
}

/// Bot entry point: gate, confirmation workflow, action layer.
pub struct CommandDispatcher {
    gate: AuthorizationGate,
    policy: ConfirmationPolicy,
    pending: PendingConfirmations,
    actions: Arc<dyn ActionLayer>,
    audit: Arc<dyn AuditSink>,
}

impl CommandDispatcher {
    pub fn new(
        gate: AuthorizationGate,
        policy: ConfirmationPolicy,
        pending: PendingConfirmations,
        actions: Arc<dyn ActionLayer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            gate,
            policy,
            pending,
            actions,
            audit,
        }
    }

    /// Handle a text message.
    pub async fn handle_command(&self, request: &BotRequest) -> BotReply {
        let Some(command) = request.command() else {
            return BotReply::Ignored;
        };

        match self.gate.admit_command(request) {
            GateDecision::Admitted => {}
            GateDecision::Denied(denial) => return denied(&denial, UNAUTHORIZED_REPLY),
        }

        if self.policy.requires(&command.name) {
            self.pending
                .request(request.caller.user_id, &command.name, &command.args);
            self.audit.record(AuditEntry::info(
                request.caller.user_id.to_string(),
                AuditEvent::ConfirmationRequested,
                format!("Confirmation requested for /{}", command.name),
            ));
            return BotReply::ConfirmationRequired {
                message: format!(
                    "⚠️ Confirmation Required\n\nAre you sure you want to run /{}?",
                    command.name
                ),
                confirm_data: confirm_data(&command.name),
                cancel_data: CANCEL_DATA.to_string(),
                command: command.name,
            };
        }

        self.perform(&request.caller, &command.name, &command.args)
            .await
    }

    /// Handle a button press on a confirmation prompt.
    pub async fn handle_callback(&self, request: &BotRequest) -> BotReply {
        match self.gate.admit_callback(request) {
            GateDecision::Admitted => {}
            GateDecision::Denied(denial) => return denied(&denial, CALLBACK_UNAUTHORIZED_REPLY),
        }

        let user = request.caller.user_id;
        match CallbackAction::parse(&request.text) {
            CallbackAction::Cancel => {
                if let Some(cancelled) = self.pending.cancel(user) {
                    self.audit.record(AuditEntry::info(
                        user.to_string(),
                        AuditEvent::ConfirmationCancelled,
                        format!("Cancelled /{}", cancelled.command),
                    ));
                }
                BotReply::Notice {
                    message: CANCELLED_REPLY.to_string(),
                }
            }
            CallbackAction::Confirm(command) => match self.pending.take_confirmed(user, &command) {
                Some(confirmed) => {
                    self.perform(&request.caller, &confirmed.command, &confirmed.args)
                        .await
                }
                None => BotReply::Notice {
                    message: NOTHING_PENDING_REPLY.to_string(),
                },
            },
            CallbackAction::Unknown => BotReply::Ignored,
        }
    }

    async fn perform(&self, caller: &Caller, command: &str, args: &[String]) -> BotReply {
        match self.actions.execute(command, args).await {
            Ok(outcome) => BotReply::Completed(outcome),
            Err(e) => {
                self.audit.record(AuditEntry::error(
                    caller.user_id.to_string(),
                    AuditEvent::CollaboratorFailure,
                    format!("/{} failed: {}", command, e),
                ));
                BotReply::Failed {
                    message: FAILURE_REPLY.to_string(),
                }
            }
        }
    }
}

fn denied(denial: &Denial, unauthorized_message: &str) -> BotReply {
    let message = match denial {
        Denial::RateLimited { .. } => RATE_LIMITED_REPLY,
        _ => unauthorized_message,
    };
    BotReply::Denied {
        message: message.to_string(),
    }
}
