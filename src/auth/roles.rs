//! Role resolution for authenticated sessions.
//!
//! Exactly one [`RoleStrategy`] is active per process, picked from
//! `ROLE_SOURCE`. Whatever the strategy, [`RoleResolver::resolve`] never
//! fails: missing data and lookup errors both resolve to [`Role::Student`].

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Session;
use crate::config::{AppConfig, RoleSource};
use crate::models::Role;
use crate::store::RecordStore;

/// Memo of users known to be teachers.
///
/// Entries are added on promotion and never removed, so a demoted teacher
/// keeps teacher access until the process restarts.
#[async_trait]
pub trait RoleCache: Send + Sync + 'static {
    async fn is_teacher(&self, user_id: Uuid) -> bool;

    async fn remember_teacher(&self, user_id: Uuid);
}

#[derive(Default)]
pub struct InMemoryRoleCache {
    teachers: RwLock<HashSet<Uuid>>,
}

#[async_trait]
impl RoleCache for InMemoryRoleCache {
    async fn is_teacher(&self, user_id: Uuid) -> bool {
        self.teachers.read().await.contains(&user_id)
    }

    async fn remember_teacher(&self, user_id: Uuid) {
        self.teachers.write().await.insert(user_id);
    }
}

#[async_trait]
pub trait RoleStrategy: Send + Sync + 'static {
    /// `Ok(None)` means the source holds no role for this user.
    async fn lookup(&self, session: &Session) -> Result<Option<Role>>;
}

/// Reads the `user_roles` mapping, memoizing teachers.
pub struct TableRoleStrategy {
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn RoleCache>,
}

impl TableRoleStrategy {
    pub fn new(records: Arc<dyn RecordStore>, cache: Arc<dyn RoleCache>) -> Self {
        Self { records, cache }
    }
}

#[async_trait]
impl RoleStrategy for TableRoleStrategy {
    async fn lookup(&self, session: &Session) -> Result<Option<Role>> {
        if self.cache.is_teacher(session.user_id).await {
            debug!(user_id = %session.user_id, "teacher role served from cache");
            return Ok(Some(Role::Teacher));
        }

        let role = self.records.find_role(session.user_id).await?;
        if role == Some(Role::Teacher) {
            self.cache.remember_teacher(session.user_id).await;
        }
        Ok(role)
    }
}

/// Compares the session email with the single configured teacher address.
pub struct EmailRoleStrategy {
    teacher_email: String,
}

impl EmailRoleStrategy {
    pub fn new(teacher_email: impl Into<String>) -> Self {
        Self {
            teacher_email: teacher_email.into(),
        }
    }
}

#[async_trait]
impl RoleStrategy for EmailRoleStrategy {
    async fn lookup(&self, session: &Session) -> Result<Option<Role>> {
        let matches = session
            .email
            .as_deref()
            .map(|email| email.trim().eq_ignore_ascii_case(self.teacher_email.trim()))
            .unwrap_or(false);
        Ok(matches.then_some(Role::Teacher))
    }
}

/// Reads `user_metadata.role` from the access token.
///
/// Users can edit their own `user_metadata`, so any account can claim the
/// teacher role under this strategy. Only use it where every account is
/// provisioned by an operator.
pub struct MetadataRoleStrategy;

#[async_trait]
impl RoleStrategy for MetadataRoleStrategy {
    async fn lookup(&self, session: &Session) -> Result<Option<Role>> {
        Ok(session
            .user_metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(|value| value.parse::<Role>().ok()))
    }
}

#[derive(Clone)]
pub struct RoleResolver {
    strategy: Arc<dyn RoleStrategy>,
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn RoleCache>,
}

impl RoleResolver {
    pub fn new(
        strategy: Arc<dyn RoleStrategy>,
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn RoleCache>,
    ) -> Self {
        Self {
            strategy,
            records,
            cache,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn RoleCache>,
    ) -> Self {
        let strategy: Arc<dyn RoleStrategy> = match config.role_source {
            RoleSource::Table => Arc::new(TableRoleStrategy::new(records.clone(), cache.clone())),
            RoleSource::Email => Arc::new(EmailRoleStrategy::new(
                config.teacher_email.clone().unwrap_or_default(),
            )),
            RoleSource::Metadata => Arc::new(MetadataRoleStrategy),
        };
        if config.role_source.is_user_editable() {
            warn!(
                role_source = ?config.role_source,
                "roles are read from user-editable metadata, any user can claim teacher"
            );
        }
        Self::new(strategy, records, cache)
    }

    pub async fn resolve(&self, session: &Session) -> Role {
        match self.strategy.lookup(session).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                debug!(user_id = %session.user_id, "no role found, defaulting to student");
                Role::Student
            }
            Err(err) => {
                warn!(
                    user_id = %session.user_id,
                    error = %err,
                    "role lookup failed, defaulting to student"
                );
                Role::Student
            }
        }
    }

    /// Persists a role mapping. Promotions are written through to the cache.
    pub async fn assign(&self, user_id: Uuid, role: Role) -> Result<()> {
        self.records.upsert_role(user_id, role).await?;
        if role.is_teacher() {
            self.cache.remember_teacher(user_id).await;
        }
        Ok(())
    }
}
