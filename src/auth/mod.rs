pub mod provider;
pub mod roles;
pub mod session;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt};
use serde_json::Value;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

use self::session::SessionVerifier;

/// An authenticated visitor, rebuilt from the access token on every request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub user_metadata: Value,
    pub access_token: String,
}

impl Session {
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Bearer header first, then the session cookie.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_owned());
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(cookie_name).map(str::to_owned))
}

pub fn session_from_headers(
    headers: &HeaderMap,
    cookie_name: &str,
    verifier: &SessionVerifier,
) -> Option<Session> {
    let token = session_token(headers, cookie_name)?;
    let claims = verifier.verify_token(&token).ok()?;
    Some(Session {
        user_id: claims.sub,
        email: claims.email,
        user_metadata: claims.user_metadata,
        access_token: token,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        session_from_headers(
            &parts.headers,
            &state.config.session_cookie_name,
            &state.sessions,
        )
        .ok_or_else(AppError::unauthorized)
    }
}
