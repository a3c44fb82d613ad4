use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::auth::Session;
use crate::error::{AppError, AppResult};
use crate::services::maintenance::{self as service, FileAccessError, RefreshSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FileAccessRequest {
    #[serde(rename = "filePath", default)]
    pub file_path: Option<String>,
}

pub async fn refresh_urls(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<RefreshSummary>> {
    if !state.roles.resolve(&session).await.is_teacher() {
        return Err(AppError::forbidden("teacher access required"));
    }
    Ok(Json(service::refresh_all_urls(&state).await?))
}

pub async fn test_file_access(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<FileAccessRequest>,
) -> AppResult<Response> {
    let path = payload
        .file_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| AppError::bad_request("File path is required"))?;

    let response = match service::probe_file_access(&state, &session, path).await {
        Ok(report) => Json(json!({
            "success": true,
            "message": "File access test successful",
            "fileSize": report.file_size,
            "fileType": report.file_type,
            "signedUrl": report.signed_url,
            "publicUrl": report.public_url,
        }))
        .into_response(),
        Err(err) => {
            warn!(path = %path, error = %err, details = %err.details(), "file access probe failed");
            let (status, download_success) = match &err {
                FileAccessError::PermissionDenied(_) => (StatusCode::FORBIDDEN, false),
                FileAccessError::Download(_) => (StatusCode::INTERNAL_SERVER_ERROR, false),
                FileAccessError::SignedUrl(_) => (StatusCode::INTERNAL_SERVER_ERROR, true),
            };
            (
                status,
                Json(json!({
                    "success": false,
                    "error": err.to_string(),
                    "details": err.details(),
                    "downloadSuccess": download_success,
                })),
            )
                .into_response()
        }
    };
    Ok(response)
}
