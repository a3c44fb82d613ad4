//! Student/teacher document exchange.
//!
//! Uploads write the blob first and the row second; deletions remove the
//! blob first and the row second. Neither pair is atomic.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::Session;
use crate::config::DocumentUrlMode;
use crate::error::AppError;
use crate::models::{Document, NewDocument, Role};
use crate::saga::{Saga, StepFailure};
use crate::state::AppState;
use crate::utils::random::lowercase_token;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf", "image/png"];
const UNKNOWN_USER_NAME: &str = "Unknown User";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file field is required")]
    MissingFile,
    #[error("file must not be empty")]
    Empty,
    #[error("filename is required")]
    MissingFileName,
    #[error("only PDF and PNG files are allowed (got {0})")]
    UnsupportedType(String),
    #[error("file is too large: {0} bytes exceeds the 10 MB limit")]
    TooLarge(usize),
    #[error("only teachers can upload to a student's folder")]
    NotTeacher,
    #[error("student {0} has no documents folder")]
    UnknownStudent(Uuid),
    #[error("failed to load students: {0}")]
    Directory(String),
    #[error("upload failed: {0}")]
    Step(StepFailure),
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        match value {
            UploadError::NotTeacher => AppError::forbidden(value.to_string()),
            UploadError::Directory(_) | UploadError::Step(_) => AppError::internal(value),
            _ => AppError::bad_request(value.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("document not found")]
    NotFound,
    #[error("failed to load document: {0}")]
    Lookup(String),
    #[error("failed to delete the file: {0}")]
    Blob(String),
    #[error("file deleted but the document record could not be removed: {0}")]
    Row(String),
}

impl From<DeleteError> for AppError {
    fn from(value: DeleteError) -> Self {
        match value {
            DeleteError::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// The signed-in user's own folder.
    Own,
    /// A student's folder, teacher only.
    Student(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// Checks type, size and naming. Runs before any storage or record call.
pub fn validate_upload(file: &UploadFile) -> Result<(String, String), UploadError> {
    let file_name = file
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(UploadError::MissingFileName)?
        .to_string();

    if file.bytes.is_empty() {
        return Err(UploadError::Empty);
    }

    let content_type = match file.content_type.as_deref() {
        Some(value) if !value.trim().is_empty() => normalize_content_type(value),
        _ => mime_guess::from_path(&file_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    };

    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(UploadError::UnsupportedType(content_type));
    }

    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge(file.bytes.len()));
    }

    Ok((file_name, content_type))
}

fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// `<owner>/<random>_<millis>.<ext>`; the original name never appears in the path.
/// The extension follows the validated content type, never the client's name.
pub fn storage_path(owner: Uuid, content_type: &str) -> String {
    let extension = match content_type {
        "application/pdf" => "pdf",
        "image/png" => "png",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|extensions| extensions.first())
            .copied()
            .unwrap_or("bin"),
    };

    format!(
        "{owner}/{}_{}.{extension}",
        lowercase_token(12),
        Utc::now().timestamp_millis()
    )
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

fn email_local_part(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

pub fn signed_url_expiry(state: &AppState) -> Duration {
    Duration::from_secs(state.config.signed_url_expiry_seconds)
}

async fn document_url(state: &AppState, path: &str) -> anyhow::Result<String> {
    match state.config.document_url_mode {
        DocumentUrlMode::Signed => {
            state
                .storage
                .presign_get_object(path, signed_url_expiry(state))
                .await
        }
        DocumentUrlMode::Public => state.storage.public_url(path),
    }
}

pub async fn upload(
    state: &AppState,
    session: &Session,
    file: UploadFile,
    target: UploadTarget,
) -> Result<Document, UploadError> {
    let (file_name, content_type) = validate_upload(&file)?;

    let (owner, user_email, user_name, teacher_email) = match target {
        UploadTarget::Own => (
            session.user_id,
            session.email().to_string(),
            Some(
                session
                    .full_name()
                    .unwrap_or(UNKNOWN_USER_NAME)
                    .to_string(),
            ),
            None,
        ),
        UploadTarget::Student(student_id) => {
            if !state.roles.resolve(session).await.is_teacher() {
                return Err(UploadError::NotTeacher);
            }
            let student = students(state)
                .await
                .map_err(|err| UploadError::Directory(format!("{err:#}")))?
                .into_iter()
                .find(|student| student.id == student_id)
                .ok_or(UploadError::UnknownStudent(student_id))?;
            (
                student.id,
                student.email,
                None,
                Some(session.email().to_string()),
            )
        }
    };

    let path = storage_path(owner, &content_type);
    let size = file.bytes.len() as i64;
    let mut saga = Saga::new("document-upload");

    saga.require(
        "upload blob",
        state
            .storage
            .put_object(
                &path,
                file.bytes,
                Some(content_type.clone()),
                inline_content_disposition(&file_name),
            )
            .await,
    )
    .map_err(UploadError::Step)?;

    let url = saga
        .require("resolve url", document_url(state, &path).await)
        .map_err(|failure| {
            error!(path = %path, "blob stored without a document row");
            UploadError::Step(failure)
        })?;

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        user_id: owner,
        file_name,
        file_type: content_type,
        file_size: size,
        file_path: path.clone(),
        url,
        user_email,
        user_name,
        uploaded_by_teacher: teacher_email.is_some(),
        teacher_email,
    };

    let document = saga
        .require(
            "insert row",
            state.records.insert_document(new_document).await,
        )
        .map_err(|failure| {
            error!(path = %path, "blob stored without a document row");
            UploadError::Step(failure)
        })?;

    info!(
        document_id = %document.id,
        owner = %document.user_id,
        uploaded_by_teacher = document.uploaded_by_teacher,
        size_bytes = document.file_size,
        "document uploaded"
    );
    Ok(document)
}

/// Students see their own rows, teachers see every row. Newest first.
pub async fn list_visible(
    state: &AppState,
    session: &Session,
    role: Role,
) -> anyhow::Result<Vec<Document>> {
    let owner = (!role.is_teacher()).then_some(session.user_id);
    let documents = state.records.list_documents(owner).await?;
    Ok(refresh_signed_urls(state, documents).await)
}

/// Re-signs every row concurrently. A row whose signing fails keeps its
/// previous URL; order and length are preserved.
pub async fn refresh_signed_urls(state: &AppState, documents: Vec<Document>) -> Vec<Document> {
    let expiry = signed_url_expiry(state);
    let refreshed = documents.into_iter().map(|mut document| async move {
        match state
            .storage
            .presign_get_object(&document.file_path, expiry)
            .await
        {
            Ok(url) => document.url = url,
            Err(err) => warn!(
                document_id = %document.id,
                file_name = %document.file_name,
                error = %err,
                "failed to refresh signed url, keeping previous url"
            ),
        }
        normalize_display_name(&mut document);
        document
    });
    join_all(refreshed).await
}

/// Student rows fall back to the email local part; teacher uploads carry no name.
pub fn normalize_display_name(document: &mut Document) {
    if document.uploaded_by_teacher {
        document.user_name = None;
    } else if document
        .user_name
        .as_deref()
        .map(str::is_empty)
        .unwrap_or(true)
        && !document.user_email.is_empty()
    {
        document.user_name = Some(email_local_part(&document.user_email));
    }
}

/// Distinct document owners, ordered by email.
pub async fn students(state: &AppState) -> anyhow::Result<Vec<Student>> {
    let documents = state.records.list_documents(None).await?;
    let mut by_id: BTreeMap<Uuid, Student> = BTreeMap::new();

    for document in documents {
        let named = document
            .user_name
            .clone()
            .filter(|name| !name.is_empty() && !document.uploaded_by_teacher);
        match by_id.get_mut(&document.user_id) {
            Some(existing) => {
                if let Some(name) = named {
                    if existing.display_name == email_local_part(&existing.email) {
                        existing.display_name = name;
                    }
                }
            }
            None => {
                let display_name =
                    named.unwrap_or_else(|| email_local_part(&document.user_email));
                by_id.insert(
                    document.user_id,
                    Student {
                        id: document.user_id,
                        email: document.user_email,
                        display_name,
                    },
                );
            }
        }
    }

    let mut students: Vec<Student> = by_id.into_values().collect();
    students.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(students)
}

/// Removes the blob, then the row. A blob failure leaves the row untouched.
pub async fn delete(
    state: &AppState,
    session: &Session,
    role: Role,
    document_id: Uuid,
) -> Result<(), DeleteError> {
    let document = state
        .records
        .find_document(document_id)
        .await
        .map_err(|err| DeleteError::Lookup(format!("{err:#}")))?
        .ok_or(DeleteError::NotFound)?;

    if document.user_id != session.user_id && !role.is_teacher() {
        return Err(DeleteError::NotFound);
    }

    let mut saga = Saga::new("document-delete");
    saga.require(
        "delete blob",
        state.storage.delete_object(&document.file_path).await,
    )
    .map_err(|failure| DeleteError::Blob(failure.error))?;

    saga.require(
        "delete row",
        state.records.delete_document(document.id).await,
    )
    .map_err(|failure| {
        error!(
            document_id = %document.id,
            path = %document.file_path,
            "document row left without its blob"
        );
        DeleteError::Row(failure.error)
    })?;

    info!(document_id = %document.id, deleted_by = %session.user_id, "document deleted");
    Ok(())
}
