//! Page access gate.
//!
//! Runs in front of every page request. API routes pass straight through;
//! their handlers check the session themselves.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;
use url::form_urlencoded;

use crate::auth::session_from_headers;
use crate::state::AppState;

pub const PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/upload", "/teacher-portal"];
pub const AUTH_ONLY_PATHS: &[&str] = &["/login", "/signup"];
pub const DEBUG_PREFIX: &str = "/debug";
const LOGIN_PATH: &str = "/login";
const HOME_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a session.
    Protected,
    /// Only for visitors without a session.
    AuthOnly,
    /// Reachable in every configuration.
    AlwaysOpen,
    /// Not gated.
    Ungated,
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

pub fn classify(path: &str) -> RouteClass {
    if path.starts_with(DEBUG_PREFIX) {
        RouteClass::AlwaysOpen
    } else if PROTECTED_PREFIXES.iter().any(|prefix| under(path, prefix)) {
        RouteClass::Protected
    } else if AUTH_ONLY_PATHS.contains(&path) {
        RouteClass::AuthOnly
    } else {
        RouteClass::Ungated
    }
}

/// What the gate does with a request, given its path and session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Redirect(String),
}

pub fn decide(path: &str, has_session: bool, bypass: bool) -> Decision {
    match classify(path) {
        RouteClass::AlwaysOpen | RouteClass::Ungated => Decision::Pass,
        _ if bypass => Decision::Pass,
        RouteClass::Protected if !has_session => Decision::Redirect(login_redirect(path)),
        RouteClass::AuthOnly if has_session => Decision::Redirect(HOME_PATH.to_string()),
        _ => Decision::Pass,
    }
}

pub fn login_redirect(from: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirectedFrom", from)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

fn has_session(state: &AppState, headers: &HeaderMap) -> bool {
    session_from_headers(headers, &state.config.session_cookie_name, &state.sessions).is_some()
}

pub async fn access_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let class = classify(&path);
    if matches!(class, RouteClass::AlwaysOpen | RouteClass::Ungated) {
        return next.run(request).await;
    }

    let session = has_session(&state, request.headers());
    match decide(&path, session, state.config.auth_bypass) {
        Decision::Pass => next.run(request).await,
        Decision::Redirect(location) => {
            debug!(path = %path, location = %location, "access gate redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
