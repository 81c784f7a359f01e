//! Seam to the action layer (power, audio, display, status).
//!
//! The access-control core never performs actions itself. It decides whether
//! a command may proceed and then hands it to an [`ActionLayer`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result reported by the action layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    /// Opaque payload (e.g. screenshot bytes, status figures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// The action layer raised instead of reporting an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    Failed(String),
}

/// Performs admitted commands.
#[async_trait]
pub trait ActionLayer: Send + Sync {
    async fn execute(&self, command: &str, args: &[String]) -> Result<ActionOutcome, ActionError>;
}

/// Action layer that only logs what it was asked to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunActions;

#[async_trait]
impl ActionLayer for DryRunActions {
    async fn execute(&self, command: &str, args: &[String]) -> Result<ActionOutcome, ActionError> {
        tracing::info!(command, ?args, "dry run: action not performed");
        let message = if args.is_empty() {
            format!("Dry run: /{} accepted", command)
        } else {
            format!("Dry run: /{} {} accepted", command, args.join(" "))
        };
        Ok(ActionOutcome::ok(message))
    }
}
