//! Operator tasks: bulk signed-URL refresh and a single-file access probe.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::Session;
use crate::models::Document;
use crate::services::documents::signed_url_expiry;
use crate::state::AppState;

const PROBE_URL_EXPIRY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RefreshSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Re-signs and persists the URL of every stored document.
///
/// Only the initial listing can fail the run; per-row failures are counted.
pub async fn refresh_all_urls(state: &AppState) -> anyhow::Result<RefreshSummary> {
    let documents = state.records.list_documents(None).await?;
    let expiry = signed_url_expiry(state);

    let outcomes = join_all(
        documents
            .iter()
            .map(|document| refresh_one(state, document, expiry)),
    )
    .await;

    let mut summary = RefreshSummary {
        total: documents.len(),
        ..RefreshSummary::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(()) => summary.success += 1,
            Err(message) => {
                summary.failed += 1;
                summary.errors.push(message);
            }
        }
    }

    info!(
        total = summary.total,
        success = summary.success,
        failed = summary.failed,
        "document urls refreshed"
    );
    Ok(summary)
}

async fn refresh_one(state: &AppState, document: &Document, expiry: Duration) -> Result<(), String> {
    let url = state
        .storage
        .presign_get_object(&document.file_path, expiry)
        .await
        .map_err(|err| {
            warn!(document_id = %document.id, error = %err, "failed to sign document url");
            format!("Error for {}: {err:#}", document.file_name)
        })?;

    state
        .records
        .update_document_url(document.id, &url)
        .await
        .map_err(|err| {
            warn!(document_id = %document.id, error = %err, "failed to store refreshed url");
            format!("Error updating {}: {err:#}", document.file_name)
        })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileAccessReport {
    pub file_size: usize,
    pub file_type: Option<String>,
    pub signed_url: String,
    pub public_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("Permission denied. The current user cannot access this file.")]
    PermissionDenied(String),
    #[error("{0}")]
    Download(String),
    #[error("File found but could not create signed URL")]
    SignedUrl(String),
}

impl FileAccessError {
    pub fn details(&self) -> &str {
        match self {
            FileAccessError::PermissionDenied(details)
            | FileAccessError::Download(details)
            | FileAccessError::SignedUrl(details) => details,
        }
    }
}

fn is_permission_error(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ["permission", "accessdenied", "access denied", "forbidden"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

/// Students may only probe keys under their own folder.
pub fn may_read_path(session: &Session, is_teacher: bool, path: &str) -> bool {
    is_teacher
        || path
            .strip_prefix(&format!("{}/", session.user_id))
            .is_some_and(|rest| !rest.is_empty())
}

/// Downloads `path`, then signs and resolves its URLs.
pub async fn probe_file_access(
    state: &AppState,
    session: &Session,
    path: &str,
) -> Result<FileAccessReport, FileAccessError> {
    let is_teacher = state.roles.resolve(session).await.is_teacher();
    if !may_read_path(session, is_teacher, path) {
        return Err(FileAccessError::PermissionDenied(format!(
            "{path} is outside the caller's folder"
        )));
    }

    let blob = state.storage.get_object(path).await.map_err(|err| {
        let message = format!("{err:#}");
        if is_permission_error(&message) {
            FileAccessError::PermissionDenied(message)
        } else {
            FileAccessError::Download(message)
        }
    })?;

    let signed_url = state
        .storage
        .presign_get_object(path, PROBE_URL_EXPIRY)
        .await
        .map_err(|err| FileAccessError::SignedUrl(format!("{err:#}")))?;

    let public_url = state.storage.public_url(path).ok();

    Ok(FileAccessReport {
        file_size: blob.bytes.len(),
        file_type: blob.content_type,
        signed_url,
        public_url,
    })
}
