use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        provider::{AuthSession, SignOutScope, UserUpdate},
        Session,
    },
    error::{AppError, AppResult},
    models::Role,
    state::AppState,
};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub email_confirmed: bool,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordUpdateRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
}

fn required_email(value: &str) -> AppResult<String> {
    let email = value.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    Ok(email.to_string())
}

fn check_password(value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let email = required_email(&payload.email)?;
    check_password(&payload.password)?;

    let user = state
        .auth
        .sign_up(
            &email,
            &payload.password,
            json!({ "full_name": payload.name.trim() }),
        )
        .await
        .map_err(|err| {
            warn!(error = %err, "sign up rejected");
            AppError::bad_request(format!("{err:#}"))
        })?;

    if let Err(err) = state.roles.assign(user.id, Role::Student).await {
        warn!(user_id = %user.id, error = %err, "failed to record student role");
    }

    info!(user_id = %user.id, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.id,
            email: user.email,
            role: Role::Student,
            email_confirmed: user.email_confirmed_at.is_some(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let email = required_email(&payload.email)?;
    let auth_session = state
        .auth
        .sign_in(&email, &payload.password)
        .await
        .map_err(|err| {
            warn!(error = %err, "sign in rejected");
            AppError::unauthorized()
        })?;

    if auth_session.user.email_confirmed_at.is_none() {
        return Err(AppError::forbidden(
            "please verify your email before logging in",
        ));
    }

    let session = session_from_auth(&auth_session);
    let role = state.roles.resolve(&session).await;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        build_session_cookie(&state, &auth_session.access_token, auth_session.expires_in)?,
    );

    info!(user_id = %session.user_id, role = %role, "user signed in");
    Ok((
        headers,
        Json(LoginResponse {
            access_token: auth_session.access_token,
            refresh_token: auth_session.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: auth_session.expires_in,
            user_id: session.user_id,
            role,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<(HeaderMap, StatusCode)> {
    if let Err(err) = state.auth.sign_out(&session, SignOutScope::Local).await {
        warn!(user_id = %session.user_id, error = %err, "sign out failed");
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_session_cookie(&state)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> AppResult<StatusCode> {
    let email = required_email(&payload.email)?;
    let redirect_to = format!("{}/reset-password", state.config.site_url);
    state
        .auth
        .send_password_reset(&email, &redirect_to)
        .await
        .map_err(AppError::from)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn update_password(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<PasswordUpdateRequest>,
) -> AppResult<StatusCode> {
    check_password(&payload.password)?;
    let update = UserUpdate {
        password: Some(payload.password),
        ..UserUpdate::default()
    };
    state
        .auth
        .update_user(&session, &update)
        .await
        .map_err(AppError::from)?;
    info!(user_id = %session.user_id, "password updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, session: Session) -> Json<MeResponse> {
    let role = state.roles.resolve(&session).await;
    Json(MeResponse {
        user_id: session.user_id,
        full_name: session.full_name().map(str::to_owned),
        email: session.email,
        role,
    })
}

fn session_from_auth(auth_session: &AuthSession) -> Session {
    Session {
        user_id: auth_session.user.id,
        email: auth_session.user.email.clone(),
        user_metadata: auth_session.user.user_metadata.clone(),
        access_token: auth_session.access_token.clone(),
    }
}

fn cookie_attributes(state: &AppState, parts: &mut Vec<String>) {
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    if state.config.session_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.session_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }
}

fn build_session_cookie(state: &AppState, token: &str, max_age: i64) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{}={}", state.config.session_cookie_name, token)];
    parts.push(format!("Max-Age={}", max_age.max(0)));
    cookie_attributes(state, &mut parts);
    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

pub(crate) fn build_clear_session_cookie(state: &AppState) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{}=", state.config.session_cookie_name)];
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    cookie_attributes(state, &mut parts);
    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}
