//! Self-service account deletion.
//!
//! Owned files and rows are removed best-effort; the auth record is then
//! scrambled so the account can no longer sign in. Only the scramble is
//! allowed to fail the request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::auth::provider::{SignOutScope, UserUpdate};
use crate::auth::Session;
use crate::error::AppError;
use crate::saga::{Saga, StepFailure};
use crate::state::AppState;
use crate::utils::random::{lowercase_token, token};

pub const DELETED_EMAIL_DOMAIN: &str = "deleted.account";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("teacher account cannot be deleted")]
    TeacherAccount,
    #[error("failed to disable account: {0}")]
    Scramble(StepFailure),
}

impl From<AccountError> for AppError {
    fn from(value: AccountError) -> Self {
        match value {
            AccountError::TeacherAccount => AppError::forbidden(value.to_string()),
            AccountError::Scramble(_) => AppError::internal(value),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CleanupReport {
    pub documents_found: usize,
    pub files_removed: usize,
    pub files_failed: usize,
    pub rows_removed: usize,
    pub rows_failed: usize,
    pub signed_out: bool,
    pub failures: Vec<StepFailure>,
}

/// Replacement credentials for a deleted account.
///
/// The original address is kept only as a SHA-256 digest of its trimmed,
/// lowercased form.
pub fn scrambled_credentials(original_email: &str, requested_at: DateTime<Utc>) -> UserUpdate {
    let digest = Sha256::digest(original_email.trim().to_lowercase().as_bytes());
    UserUpdate {
        email: Some(format!(
            "deleted-{}@{DELETED_EMAIL_DOMAIN}",
            lowercase_token(13)
        )),
        password: Some(token(26)),
        data: Some(json!({
            "deleted": true,
            "delete_requested_at": requested_at.to_rfc3339(),
            "original_email_hash": hex::encode(digest),
        })),
    }
}

async fn is_designated_teacher(state: &AppState, session: &Session) -> bool {
    state.config.is_teacher_email(session.email())
        || state.roles.resolve(session).await.is_teacher()
}

pub async fn delete_account(
    state: &AppState,
    session: &Session,
) -> Result<CleanupReport, AccountError> {
    if is_designated_teacher(state, session).await {
        info!(user_id = %session.user_id, "refused to delete teacher account");
        return Err(AccountError::TeacherAccount);
    }

    let mut saga = Saga::new("account-delete");
    let mut report = CleanupReport::default();

    let documents = saga
        .tolerate(
            "list documents",
            state.records.list_documents(Some(session.user_id)).await,
        )
        .unwrap_or_default();
    report.documents_found = documents.len();

    for document in &documents {
        let outcome = state.storage.delete_object(&document.file_path).await;
        match saga.tolerate(format!("delete file {}", document.file_path), outcome) {
            Some(()) => report.files_removed += 1,
            None => report.files_failed += 1,
        }
    }

    for document in &documents {
        let outcome = state.records.delete_document(document.id).await;
        match saga.tolerate(format!("delete row {}", document.id), outcome) {
            Some(_) => report.rows_removed += 1,
            None => report.rows_failed += 1,
        }
    }

    let update = scrambled_credentials(session.email(), Utc::now());
    saga.require(
        "scramble credentials",
        state.auth.update_user(session, &update).await,
    )
    .map_err(AccountError::Scramble)?;

    report.signed_out = saga
        .tolerate(
            "sign out everywhere",
            state.auth.sign_out(session, SignOutScope::Global).await,
        )
        .is_some();

    report.failures = saga.into_failures();
    info!(
        user_id = %session.user_id,
        files_removed = report.files_removed,
        files_failed = report.files_failed,
        rows_removed = report.rows_removed,
        rows_failed = report.rows_failed,
        signed_out = report.signed_out,
        "account deleted"
    );
    Ok(report)
}
