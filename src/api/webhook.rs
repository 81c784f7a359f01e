//! Chat transport webhook.
//!
//! Updates arrive at `/webhook/{secret}`. The reply is returned in the
//! webhook response body as a Bot API method call, so no outbound client is
//! needed.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};

use super::state::AppState;
use crate::bot::{BotReply, BotRequest, Caller, UserId};

/// Header carrying the `secret_token` registered with the webhook.
pub const SECRET_TOKEN_HEADER: HeaderName =
    HeaderName::from_static("x-telegram-bot-api-secret-token");

/// Incoming update. Only the fields the bot reacts to are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub id: String,
    pub from: User,
    pub data: Option<String>,
    pub message: Option<Message>,
}

/// Bot API call answered in the webhook response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MethodCall {
    pub method: &'static str,
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        let caller = Caller::new(user.id);
        match user.username {
            Some(ref handle) => caller.with_handle(handle.as_str()),
            None => caller,
        }
    }
}

/// Webhook endpoint.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !constant_time_eq(secret.as_bytes(), state.webhook_secret.as_bytes()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if !secret_header_matches(&state, &headers) {
        tracing::warn!("webhook update rejected: secret token header mismatch");
        return StatusCode::NOT_FOUND.into_response();
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!("ignoring unparsable update: {}", e);
            return StatusCode::OK.into_response();
        }
    };

    match handle_update(&state, &update).await {
        Some(call) => Json(call).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

/// A present header must match; a missing one is accepted unless required.
fn secret_header_matches(state: &AppState, headers: &HeaderMap) -> bool {
    match headers.get(&SECRET_TOKEN_HEADER) {
        Some(value) => constant_time_eq(value.as_bytes(), state.webhook_secret.as_bytes()),
        None => !state.require_secret_header,
    }
}

/// Dispatch one update and build the reply call, if any.
pub async fn handle_update(state: &AppState, update: &Update) -> Option<MethodCall> {
    if let Some(ref query) = update.callback_query {
        let data = query.data.as_deref()?;
        let origin = query.message.as_ref()?;
        let request = BotRequest::new(Caller::from(&query.from), data);
        let reply = state.dispatcher.handle_callback(&request).await;
        return reply_call(&reply, origin.chat.id, Some(origin.message_id));
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref()?;
    let text = message.text.as_deref()?;
    let request = BotRequest::new(Caller::from(from), text);
    let reply = state.dispatcher.handle_command(&request).await;
    reply_call(&reply, message.chat.id, None)
}

/// Callback answers edit the prompt in place; command answers are new
/// messages.
fn reply_call(reply: &BotReply, chat_id: i64, edit: Option<i64>) -> Option<MethodCall> {
    let text = reply.text()?.to_string();
    let reply_markup = match reply {
        BotReply::ConfirmationRequired {
            confirm_data,
            cancel_data,
            ..
        } => Some(InlineKeyboardMarkup {
            inline_keyboard: vec![vec![
                InlineKeyboardButton {
                    text: "✅ Yes".to_string(),
                    callback_data: confirm_data.clone(),
                },
                InlineKeyboardButton {
                    text: "❌ No".to_string(),
                    callback_data: cancel_data.clone(),
                },
            ]],
        }),
        _ => None,
    };
    Some(MethodCall {
        method: if edit.is_some() {
            "editMessageText"
        } else {
            "sendMessage"
        },
        chat_id,
        message_id: edit,
        text,
        reply_markup,
    })
}
