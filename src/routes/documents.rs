use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{AppError, AppResult};
use crate::models::{Document, Role};
use crate::services::documents::{self as service, Student, UploadError, UploadFile, UploadTarget};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: String,
    pub url: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub uploaded_by_teacher: bool,
    pub teacher_email: Option<String>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            created_at: document.created_at,
            user_id: document.user_id,
            file_name: document.file_name,
            file_type: document.file_type,
            file_size: document.file_size,
            file_path: document.file_path,
            url: document.url,
            user_email: document.user_email,
            user_name: document.user_name,
            uploaded_by_teacher: document.uploaded_by_teacher,
            teacher_email: document.teacher_email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub role: Role,
    pub documents: Vec<DocumentResponse>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            email: student.email,
            display_name: student.display_name,
        }
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<DocumentListResponse>> {
    let role = state.roles.resolve(&session).await;
    let documents = service::list_visible(&state, &session, role).await?;
    Ok(Json(DocumentListResponse {
        role,
        documents: documents.into_iter().map(DocumentResponse::from).collect(),
    }))
}

pub async fn upload_document(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let mut file: Option<UploadFile> = None;
    let mut target = UploadTarget::Own;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().map(|n| n.to_string());
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    let msg = format!("failed to read file bytes: {err}");
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(msg)
                })?;
                file = Some(UploadFile {
                    bytes: data.to_vec(),
                    file_name,
                    content_type,
                });
            }
            Some("student_id") => {
                let value = field.text().await.map_err(|err| {
                    let msg = format!("invalid student id: {err}");
                    error!(error = %err, "invalid student id");
                    AppError::bad_request(msg)
                })?;
                if !value.trim().is_empty() {
                    let parsed = Uuid::parse_str(value.trim())
                        .map_err(|_| AppError::bad_request("student_id must be a valid UUID"))?;
                    target = UploadTarget::Student(parsed);
                }
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::from(UploadError::MissingFile)
    })?;
    let original_name = file.file_name.clone().unwrap_or_default();

    match service::upload(&state, &session, file, target).await {
        Ok(document) => Ok((StatusCode::CREATED, Json(document.into()))),
        Err(err) => {
            error!(error = %err, original_name = %original_name, "document upload failed");
            Err(err.into())
        }
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    session: Session,
    Path(document_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let role = state.roles.resolve(&session).await;
    service::delete(&state, &session, role, document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_students(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Vec<StudentResponse>>> {
    if !state.roles.resolve(&session).await.is_teacher() {
        return Err(AppError::forbidden("teacher access required"));
    }
    let students = service::students(&state).await?;
    info!(count = students.len(), "student directory listed");
    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}
