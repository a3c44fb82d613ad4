use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppResult;
use crate::services::forum::{self as service, PostedReply, TopicDetail, TopicView};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TopicListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyRequest {
    pub content: String,
}

pub async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<TopicListQuery>,
) -> AppResult<Json<Vec<TopicView>>> {
    let topics = service::list_topics(&state, query.category.as_deref()).await?;
    Ok(Json(topics))
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<Uuid>,
) -> AppResult<Json<TopicDetail>> {
    Ok(Json(service::topic_detail(&state, topic_id).await?))
}

pub async fn create_topic(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CreateTopicRequest>,
) -> AppResult<(StatusCode, Json<TopicView>)> {
    let topic = service::create_topic(
        &state,
        &session,
        &payload.title,
        &payload.content,
        &payload.category,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn create_reply(
    State(state): State<AppState>,
    session: Session,
    Path(topic_id): Path<Uuid>,
    Json(payload): Json<CreateReplyRequest>,
) -> AppResult<(StatusCode, Json<PostedReply>)> {
    let posted = service::create_reply(&state, &session, topic_id, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(posted)))
}
