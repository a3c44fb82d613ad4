//! Forum topics and replies with author display data.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::models::{ForumCategory, ForumReply, ForumTopic, NewForumReply, NewForumTopic, Profile};
use crate::saga::{Saga, StepFailure};
use crate::state::AppState;

const DEFAULT_AUTHOR_NAME: &str = "User";

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("title is required")]
    EmptyTitle,
    #[error("content is required")]
    EmptyContent,
    #[error("unknown category: {0}")]
    InvalidCategory(String),
    #[error("topic not found")]
    TopicNotFound,
    #[error("forum store failed: {0}")]
    Store(String),
    #[error("failed to post reply: {0}")]
    Step(StepFailure),
}

impl From<ForumError> for AppError {
    fn from(value: ForumError) -> Self {
        match value {
            ForumError::EmptyTitle | ForumError::EmptyContent | ForumError::InvalidCategory(_) => {
                AppError::bad_request(value.to_string())
            }
            ForumError::TopicNotFound => AppError::not_found(),
            ForumError::Store(_) | ForumError::Step(_) => AppError::internal(value),
        }
    }
}

fn store_error(err: anyhow::Error) -> ForumError {
    ForumError::Store(format!("{err:#}"))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub initials: String,
    pub avatar_url: Option<String>,
}

impl Author {
    fn from_profile(id: Uuid, profile: Option<&Profile>) -> Self {
        let name = profile
            .and_then(|profile| profile.full_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_AUTHOR_NAME)
            .to_string();
        Self {
            id,
            initials: initials(&name),
            name,
            avatar_url: profile.and_then(|profile| profile.avatar_url.clone()),
        }
    }
}

/// First letter of each word, uppercased.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub reply_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Author,
}

impl TopicView {
    fn new(topic: ForumTopic, profiles: &HashMap<Uuid, Profile>) -> Self {
        Self {
            author: Author::from_profile(topic.user_id, profiles.get(&topic.user_id)),
            id: topic.id,
            title: topic.title,
            content: topic.content,
            category: topic.category,
            reply_count: topic.reply_count,
            created_at: topic.created_at,
            updated_at: topic.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

impl ReplyView {
    fn new(reply: ForumReply, profiles: &HashMap<Uuid, Profile>) -> Self {
        Self {
            author: Author::from_profile(reply.user_id, profiles.get(&reply.user_id)),
            id: reply.id,
            topic_id: reply.topic_id,
            content: reply.content,
            created_at: reply.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicDetail {
    pub topic: TopicView,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostedReply {
    pub reply: ReplyView,
    pub reply_count: i32,
    /// `false` when the reply was stored but the topic counter was not bumped.
    pub counter_updated: bool,
}

fn required(value: &str, missing: ForumError) -> Result<String, ForumError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(missing);
    }
    Ok(trimmed.to_string())
}

pub fn parse_category(value: &str) -> Result<ForumCategory, ForumError> {
    value
        .parse()
        .map_err(|_| ForumError::InvalidCategory(value.to_string()))
}

async fn profiles_for(
    state: &AppState,
    ids: impl IntoIterator<Item = Uuid>,
) -> HashMap<Uuid, Profile> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    match state.records.profiles_by_ids(&ids).await {
        Ok(profiles) => profiles,
        Err(err) => {
            // Authors render with the default name.
            error!(error = %err, "failed to load author profiles");
            HashMap::new()
        }
    }
}

/// Topics ordered by most recent activity.
pub async fn list_topics(
    state: &AppState,
    category: Option<&str>,
) -> Result<Vec<TopicView>, ForumError> {
    let category = category
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse_category)
        .transpose()?;

    let topics = state
        .records
        .list_topics(category)
        .await
        .map_err(store_error)?;
    let profiles = profiles_for(state, topics.iter().map(|topic| topic.user_id)).await;
    Ok(topics
        .into_iter()
        .map(|topic| TopicView::new(topic, &profiles))
        .collect())
}

pub async fn topic_detail(state: &AppState, topic_id: Uuid) -> Result<TopicDetail, ForumError> {
    let topic = state
        .records
        .find_topic(topic_id)
        .await
        .map_err(store_error)?
        .ok_or(ForumError::TopicNotFound)?;
    let replies = state
        .records
        .list_replies(topic_id)
        .await
        .map_err(store_error)?;

    let profiles = profiles_for(
        state,
        std::iter::once(topic.user_id).chain(replies.iter().map(|reply| reply.user_id)),
    )
    .await;

    Ok(TopicDetail {
        topic: TopicView::new(topic, &profiles),
        replies: replies
            .into_iter()
            .map(|reply| ReplyView::new(reply, &profiles))
            .collect(),
    })
}

pub async fn create_topic(
    state: &AppState,
    session: &Session,
    title: &str,
    content: &str,
    category: &str,
) -> Result<TopicView, ForumError> {
    let title = required(title, ForumError::EmptyTitle)?;
    let content = required(content, ForumError::EmptyContent)?;
    let category = parse_category(category.trim())?;

    let topic = state
        .records
        .insert_topic(NewForumTopic {
            id: Uuid::new_v4(),
            title,
            content,
            category: category.as_str().to_string(),
            user_id: session.user_id,
            reply_count: 0,
        })
        .await
        .map_err(store_error)?;

    info!(topic_id = %topic.id, category = %topic.category, "forum topic created");
    let profiles = profiles_for(state, [topic.user_id]).await;
    Ok(TopicView::new(topic, &profiles))
}

/// Inserts the reply, then bumps the topic counter in place. The two writes
/// are independent; a failed bump leaves the counter one behind.
pub async fn create_reply(
    state: &AppState,
    session: &Session,
    topic_id: Uuid,
    content: &str,
) -> Result<PostedReply, ForumError> {
    let content = required(content, ForumError::EmptyContent)?;
    let topic = state
        .records
        .find_topic(topic_id)
        .await
        .map_err(store_error)?
        .ok_or(ForumError::TopicNotFound)?;

    let mut saga = Saga::new("forum-reply");
    let reply = saga
        .require(
            "insert reply",
            state
                .records
                .insert_reply(NewForumReply {
                    id: Uuid::new_v4(),
                    topic_id,
                    user_id: session.user_id,
                    content,
                })
                .await,
        )
        .map_err(ForumError::Step)?;

    let bumped_count = saga.tolerate(
        "update topic activity",
        state
            .records
            .bump_topic_activity(topic_id, Utc::now())
            .await,
    );
    let counter_updated = bumped_count.is_some();

    info!(
        topic_id = %topic_id,
        reply_id = %reply.id,
        counter_updated,
        "forum reply posted"
    );

    let profiles = profiles_for(state, [reply.user_id]).await;
    Ok(PostedReply {
        reply: ReplyView::new(reply, &profiles),
        reply_count: bumped_count.unwrap_or(topic.reply_count),
        counter_updated,
    })
}
