//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::audit::LogRecord;
use crate::bot::UserId;
use crate::error::Denial;

/// Login form submission.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Context for rendering the login page.
#[derive(Debug, Clone, Serialize)]
pub struct LoginPage {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginPage {
    pub fn new() -> Self {
        Self {
            title: "REMO Login".to_string(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

impl Default for LoginPage {
    fn default() -> Self {
        Self::new()
    }
}

/// A command offered on the dashboard.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub requires_confirmation: bool,
}

/// Context for rendering the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPage {
    pub username: String,
    /// Must accompany every state-changing request as `X-CSRF-Token`.
    pub csrf_token: String,
    pub bot_user_id: UserId,
    pub device_id: String,
    pub device_name: String,
    pub commands: Vec<CommandInfo>,
}

/// Body of `GET /api/logs`.
#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogRecord>,
}

/// Body of `POST /api/commands/{command}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandRequest {
    pub args: Vec<String>,
    /// Explicit affirm for commands that need one.
    pub confirm: bool,
}

/// API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "CSRF_MISMATCH").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn from_denial(denial: &Denial) -> Self {
        let message = match denial {
            Denial::CollaboratorFailure(_) => "The command could not be completed".to_string(),
            other => other.to_string(),
        };
        Self::new(denial.code(), message)
    }

    pub fn confirmation_required(command: &str) -> Self {
        Self::new(
            "CONFIRMATION_REQUIRED",
            format!("Are you sure you want to run /{}?", command),
        )
        .with_details("resubmit with \"confirm\": true")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}
