//! Inbound bot requests.

use std::fmt;

/// Numeric chat user id.
pub type UserId = i64;

/// Who sent a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// Public handle, when the user has one.
    pub handle: Option<String>,
}

impl Caller {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "{} (@{})", self.user_id, handle),
            None => write!(f, "{}", self.user_id),
        }
    }
}

/// A message or button press from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRequest {
    pub caller: Caller,
    /// Raw message text, or callback data for button presses.
    pub text: String,
}

impl BotRequest {
    pub fn new(caller: Caller, text: impl Into<String>) -> Self {
        Self {
            caller,
            text: text.into(),
        }
    }

    /// Parse the text as a slash command.
    pub fn command(&self) -> Option<ParsedCommand> {
        ParsedCommand::parse(&self.text)
    }
}

/// A slash command split into name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased name without the leading slash or `@botname` suffix.
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Parse `/name[@bot] arg1 arg2 ...`.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        if !is_command_name(&name) {
            return None;
        }

        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }
}

/// Command names are non-empty ASCII alphanumerics and underscores.
pub fn is_command_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
