use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{
    Document, ForumCategory, ForumReply, ForumTopic, NewDocument, NewForumReply, NewForumTopic,
    NewUserRole, Profile, Role, UserRole,
};
use crate::schema::{documents, forum_replies, forum_topics, profiles, user_roles};

/// Row access to the hosted relational store.
///
/// Every call is a single statement; none of the workflows built on top of
/// this trait get a transaction spanning more than one call.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn insert_document(&self, document: NewDocument) -> Result<Document>;

    /// Rows ordered by `created_at` descending. `None` returns every row.
    async fn list_documents(&self, owner: Option<Uuid>) -> Result<Vec<Document>>;

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>>;

    async fn update_document_url(&self, id: Uuid, url: &str) -> Result<()>;

    /// Returns false when no row matched.
    async fn delete_document(&self, id: Uuid) -> Result<bool>;

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>>;

    async fn upsert_role(&self, user_id: Uuid, role: Role) -> Result<()>;

    /// Topics ordered by `updated_at` descending.
    async fn list_topics(&self, category: Option<ForumCategory>) -> Result<Vec<ForumTopic>>;

    async fn find_topic(&self, id: Uuid) -> Result<Option<ForumTopic>>;

    async fn insert_topic(&self, topic: NewForumTopic) -> Result<ForumTopic>;

    /// Replies ordered by `created_at` ascending.
    async fn list_replies(&self, topic_id: Uuid) -> Result<Vec<ForumReply>>;

    async fn insert_reply(&self, reply: NewForumReply) -> Result<ForumReply>;

    /// Increments the reply counter in place and returns the new count.
    async fn bump_topic_activity(&self, topic_id: Uuid, updated_at: DateTime<Utc>) -> Result<i32>;

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("database pool error: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("database task panicked")?
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        self.with_conn(move |conn| {
            diesel::insert_into(documents::table)
                .values(&document)
                .get_result(conn)
                .context("failed to insert document row")
        })
        .await
    }

    async fn list_documents(&self, owner: Option<Uuid>) -> Result<Vec<Document>> {
        self.with_conn(move |conn| {
            let mut query = documents::table.into_boxed();
            if let Some(owner) = owner {
                query = query.filter(documents::user_id.eq(owner));
            }
            query
                .order(documents::created_at.desc())
                .load(conn)
                .context("failed to load documents")
        })
        .await
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.with_conn(move |conn| {
            documents::table
                .find(id)
                .first(conn)
                .optional()
                .context("failed to load document")
        })
        .await
    }

    async fn update_document_url(&self, id: Uuid, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            diesel::update(documents::table.find(id))
                .set(documents::url.eq(url))
                .execute(conn)
                .context("failed to update document url")?;
            Ok(())
        })
        .await
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(documents::table.find(id))
                .execute(conn)
                .context("failed to delete document row")?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>> {
        self.with_conn(move |conn| {
            let row: Option<UserRole> = user_roles::table
                .filter(user_roles::user_id.eq(user_id))
                .first(conn)
                .optional()
                .context("failed to load user role")?;
            row.map(|row| row.role.parse::<Role>().map_err(|err| anyhow!(err)))
                .transpose()
        })
        .await
    }

    async fn upsert_role(&self, user_id: Uuid, role: Role) -> Result<()> {
        self.with_conn(move |conn| {
            let new_role = NewUserRole {
                id: Uuid::new_v4(),
                user_id,
                role: role.to_string(),
            };
            diesel::insert_into(user_roles::table)
                .values(&new_role)
                .on_conflict(user_roles::user_id)
                .do_update()
                .set(user_roles::role.eq(role.as_str()))
                .execute(conn)
                .context("failed to store user role")?;
            Ok(())
        })
        .await
    }

    async fn list_topics(&self, category: Option<ForumCategory>) -> Result<Vec<ForumTopic>> {
        self.with_conn(move |conn| {
            let mut query = forum_topics::table.into_boxed();
            if let Some(category) = category {
                query = query.filter(forum_topics::category.eq(category.as_str()));
            }
            query
                .order(forum_topics::updated_at.desc())
                .load(conn)
                .context("failed to load forum topics")
        })
        .await
    }

    async fn find_topic(&self, id: Uuid) -> Result<Option<ForumTopic>> {
        self.with_conn(move |conn| {
            forum_topics::table
                .find(id)
                .first(conn)
                .optional()
                .context("failed to load forum topic")
        })
        .await
    }

    async fn insert_topic(&self, topic: NewForumTopic) -> Result<ForumTopic> {
        self.with_conn(move |conn| {
            diesel::insert_into(forum_topics::table)
                .values(&topic)
                .get_result(conn)
                .context("failed to insert forum topic")
        })
        .await
    }

    async fn list_replies(&self, topic_id: Uuid) -> Result<Vec<ForumReply>> {
        self.with_conn(move |conn| {
            forum_replies::table
                .filter(forum_replies::topic_id.eq(topic_id))
                .order(forum_replies::created_at.asc())
                .load(conn)
                .context("failed to load forum replies")
        })
        .await
    }

    async fn insert_reply(&self, reply: NewForumReply) -> Result<ForumReply> {
        self.with_conn(move |conn| {
            diesel::insert_into(forum_replies::table)
                .values(&reply)
                .get_result(conn)
                .context("failed to insert forum reply")
        })
        .await
    }

    async fn bump_topic_activity(&self, topic_id: Uuid, updated_at: DateTime<Utc>) -> Result<i32> {
        self.with_conn(move |conn| {
            diesel::update(forum_topics::table.find(topic_id))
                .set((
                    forum_topics::reply_count.eq(forum_topics::reply_count + 1),
                    forum_topics::updated_at.eq(updated_at),
                ))
                .returning(forum_topics::reply_count)
                .get_result::<i32>(conn)
                .optional()
                .context("failed to update forum topic")?
                .ok_or_else(|| anyhow!("forum topic {topic_id} no longer exists"))
        })
        .await
    }

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let rows: Vec<Profile> = profiles::table
                .filter(profiles::id.eq_any(ids))
                .load(conn)
                .context("failed to load profiles")?;
            Ok(rows.into_iter().map(|profile| (profile.id, profile)).collect())
        })
        .await
    }
}
