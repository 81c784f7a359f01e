//! Request extractors and middleware guarding dashboard routes.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};

use super::state::AppState;
use super::types::ErrorResponse;
use crate::dashboard::DashboardSession;
use crate::error::Denial;

/// Header carrying the anti-forgery token on state-changing requests.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Where unauthenticated visitors are sent.
pub const LOGIN_ROUTE: &str = "/";

/// Client address as seen by the configured resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(state.guard.client_ip(&parts.headers, peer)))
    }
}

/// Require a valid session cookie; otherwise redirect to the login page.
///
/// The verified [`DashboardSession`] is stored in the request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.guard.authenticate(request.headers()) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => Redirect::to(LOGIN_ROUTE).into_response(),
    }
}

/// Reject state-changing requests whose CSRF header does not match the
/// session. Must run inside [`require_session`].
pub async fn require_csrf(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<DashboardSession>() else {
        return denial_response(&Denial::SessionInvalid);
    };
    let supplied = request
        .headers()
        .get(&CSRF_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.guard.verify_csrf(session, supplied, &ip) {
        Ok(()) => next.run(request).await,
        Err(denial) => denial_response(&denial),
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Map a denial onto an HTTP error.
pub fn denial_response(denial: &Denial) -> Response {
    let status = match denial {
        Denial::Unauthorized | Denial::SessionInvalid => StatusCode::UNAUTHORIZED,
        Denial::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Denial::CsrfMismatch => StatusCode::FORBIDDEN,
        Denial::CollaboratorFailure(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse::from_denial(denial))).into_response()
}
