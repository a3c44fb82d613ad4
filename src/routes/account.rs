use axum::extract::{Json, State};
use axum::http::{header::SET_COOKIE, HeaderMap};
use serde::Serialize;

use super::auth::build_clear_session_cookie;
use crate::auth::Session;
use crate::error::AppResult;
use crate::services::account::{self as service, CleanupReport};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub cleanup: CleanupReport,
}

pub async fn delete_account(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<(HeaderMap, Json<DeleteAccountResponse>)> {
    let cleanup = service::delete_account(&state, &session).await?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_session_cookie(&state)?);
    Ok((
        headers,
        Json(DeleteAccountResponse {
            success: true,
            cleanup,
        }),
    ))
}
