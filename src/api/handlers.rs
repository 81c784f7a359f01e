//! Dashboard handlers.

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::{
        header::{RETRY_AFTER, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};

use super::middleware::{denial_response, ClientIp, LOGIN_ROUTE};
use super::state::AppState;
use super::types::{
    CommandInfo, CommandRequest, DashboardPage, ErrorResponse, LoginForm, LoginPage, LogsResponse,
};
use crate::audit::{AuditEntry, AuditEvent};
use crate::bot::is_command_name;
use crate::dashboard::{DashboardSession, LoginError, INVALID_CREDENTIALS_MESSAGE};
use crate::error::Denial;

/// Landing page after login.
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Entries returned by the log view.
pub const RECENT_LOG_LIMIT: usize = 20;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Login page; signed-in visitors go straight to the dashboard.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.guard.authenticate(&headers).is_some() {
        return Redirect::to(DASHBOARD_ROUTE).into_response();
    }
    Json(LoginPage::new()).into_response()
}

/// Login form submission.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();

    match state.guard.login(&ip, username, &form.password).await {
        Ok(token) => (
            [(SET_COOKIE, state.guard.session_cookie(&token))],
            Redirect::to(DASHBOARD_ROUTE),
        )
            .into_response(),
        Err(LoginError::RateLimited { retry_after }) => (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, retry_after.as_secs().max(1).to_string())],
            Json(LoginPage::new().with_error(state.guard.rate_limited_message())),
        )
            .into_response(),
        Err(LoginError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(LoginPage::new().with_error(INVALID_CREDENTIALS_MESSAGE)),
        )
            .into_response(),
        Err(LoginError::Session(e)) => {
            tracing::error!("failed to issue session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("INTERNAL_ERROR", "Could not start a session")),
            )
                .into_response()
        }
    }
}

/// Clear the session cookie and return to the login page.
pub async fn logout(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Response {
    if state.guard.authenticate(&headers).is_some() {
        state.guard.logout(&ip);
    }
    (
        [(SET_COOKIE, state.guard.clear_cookie())],
        Redirect::to(LOGIN_ROUTE),
    )
        .into_response()
}

/// Dashboard page context.
pub async fn dashboard_page(
    State(state): State<AppState>,
    Extension(session): Extension<DashboardSession>,
) -> Response {
    let Some(csrf_token) = state.guard.csrf_token(&session) else {
        return denial_response(&Denial::SessionInvalid);
    };

    let mut commands: Vec<CommandInfo> = state
        .policy
        .commands()
        .map(|(name, requires_confirmation)| CommandInfo {
            name: name.to_string(),
            requires_confirmation,
        })
        .collect();
    commands.sort_by(|a, b| a.name.cmp(&b.name));

    Json(DashboardPage {
        username: session.username.clone(),
        csrf_token: csrf_token.to_string(),
        bot_user_id: state.bot_user_id,
        device_id: state.device.id.clone(),
        device_name: state.device.name.clone(),
        commands,
    })
    .into_response()
}

/// Current machine status from the action layer.
pub async fn status(
    State(state): State<AppState>,
    Extension(session): Extension<DashboardSession>,
) -> Response {
    run_action(&state, &session.username, "status", &[]).await
}

/// Run a command from the dashboard.
pub async fn run_command(
    State(state): State<AppState>,
    Extension(session): Extension<DashboardSession>,
    Path(command): Path<String>,
    body: Bytes,
) -> Response {
    let request: CommandRequest = if body.is_empty() {
        CommandRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::bad_request(format!("invalid body: {}", e))),
                )
                    .into_response()
            }
        }
    };

    let name = command.to_ascii_lowercase();
    if !is_command_name(&name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!("invalid command: {}", command))),
        )
            .into_response();
    }

    if state.policy.requires(&name) && !request.confirm {
        state.audit.record(AuditEntry::info(
            session.username.as_str(),
            AuditEvent::ConfirmationRequested,
            format!("Confirmation requested for /{} from dashboard", name),
        ));
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse::confirmation_required(&name)),
        )
            .into_response();
    }

    if let Err(retry_after) = state.command_limiter.check(&session.username) {
        state.audit.record(AuditEntry::warn(
            session.username.as_str(),
            AuditEvent::RateLimited,
            format!("Dashboard command rate limit hit by {}: /{}", session.username, name),
        ));
        let mut response = denial_response(&Denial::RateLimited { retry_after });
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs().max(1)));
        return response;
    }

    state.audit.record(AuditEntry::info(
        session.username.as_str(),
        AuditEvent::CommandAdmitted,
        format!("Dashboard command from {}: /{}", session.username, name),
    ));
    run_action(&state, &session.username, &name, &request.args).await
}

/// Most recent audit entries, newest first.
pub async fn logs(State(state): State<AppState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        logs: state.logs.recent(RECENT_LOG_LIMIT),
    })
}

async fn run_action(state: &AppState, subject: &str, command: &str, args: &[String]) -> Response {
    match state.actions.execute(command, args).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            state.audit.record(AuditEntry::error(
                subject,
                AuditEvent::CollaboratorFailure,
                format!("/{} failed: {}", command, e),
            ));
            denial_response(&Denial::CollaboratorFailure(e.to_string()))
        }
    }
}
