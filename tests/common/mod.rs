use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use tutor_portal::auth::provider::{
    AuthProvider, AuthSession, AuthUser, SignOutScope, UserUpdate,
};
use tutor_portal::auth::roles::{InMemoryRoleCache, RoleCache, RoleResolver};
use tutor_portal::auth::Session;
use tutor_portal::config::{AppConfig, DocumentUrlMode, RoleSource};
use tutor_portal::models::{
    Document, ForumCategory, ForumReply, ForumTopic, NewDocument, NewForumReply, NewForumTopic,
    Profile, Role,
};
use tutor_portal::routes;
use tutor_portal::state::AppState;
use tutor_portal::storage::{ObjectStorage, StoredBlob};
use tutor_portal::store::RecordStore;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";
pub const JWT_AUDIENCE: &str = "authenticated";
pub const COOKIE_NAME: &str = "sb-access-token";
pub const TEACHER_EMAIL: &str = "teacher@example.com";

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

/// In-memory bucket with per-key failure injection.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    calls: AtomicUsize,
    signatures: AtomicUsize,
    fail_put: AtomicBool,
    fail_presign: Mutex<HashSet<String>>,
    fail_delete: Mutex<HashSet<String>>,
    deny_get: Mutex<HashSet<String>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
            content_disposition,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure!(
            !self.fail_presign.lock().await.contains(key),
            "signing failed for {key}"
        );
        let signature = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}&sig={signature}",
            expires_in.as_secs()
        ))
    }

    fn public_url(&self, key: &str) -> Result<String> {
        Ok(format!("https://public-storage/documents/{key}"))
    }

    async fn get_object(&self, key: &str) -> Result<StoredBlob> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_get.lock().await.contains(key) {
            bail!("AccessDenied: Permission denied for {key}");
        }
        let guard = self.objects.lock().await;
        guard
            .get(key)
            .map(|obj| StoredBlob {
                bytes: Bytes::from(obj.bytes.clone()),
                content_type: obj.content_type.clone(),
            })
            .ok_or_else(|| anyhow!("NoSuchKey: object {key} missing"))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.lock().await.contains(key) {
            bail!("delete failed for {key}");
        }
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }

    async fn ensure_bucket(&self) -> Result<bool> {
        Ok(false)
    }
}

#[allow(dead_code)]
impl FakeStorage {
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }

    pub async fn remove(&self, key: &str) {
        self.objects.lock().await.remove(key);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_uploads(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub async fn fail_signing(&self, key: &str) {
        self.fail_presign.lock().await.insert(key.to_string());
    }

    pub async fn fail_deleting(&self, key: &str) {
        self.fail_delete.lock().await.insert(key.to_string());
    }

    pub async fn deny_reading(&self, key: &str) {
        self.deny_get.lock().await.insert(key.to_string());
    }
}

/// In-memory relational store with failure injection.
#[derive(Default)]
pub struct FakeRecords {
    documents: Mutex<Vec<Document>>,
    roles: Mutex<HashMap<Uuid, Role>>,
    topics: Mutex<Vec<ForumTopic>>,
    replies: Mutex<Vec<ForumReply>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    calls: AtomicUsize,
    role_lookups: AtomicUsize,
    clock: std::sync::Mutex<Option<DateTime<Utc>>>,
    fail_insert_document: AtomicBool,
    fail_list_documents: AtomicBool,
    fail_find_role: AtomicBool,
    fail_topic_activity: AtomicBool,
    fail_delete_rows: Mutex<HashSet<Uuid>>,
    fail_url_updates: Mutex<HashSet<Uuid>>,
}

impl FakeRecords {
    /// Wall-clock timestamps, nudged forward so no two rows share one.
    fn tick(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock().expect("clock lock");
        let now = Utc::now();
        let next = match *last {
            Some(previous) if previous >= now => previous + ChronoDuration::nanoseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

#[async_trait]
impl RecordStore for FakeRecords {
    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert_document.load(Ordering::SeqCst) {
            bail!("insert rejected");
        }
        let row = Document {
            id: document.id,
            created_at: self.tick(),
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
        };
        self.documents.lock().await.push(row.clone());
        Ok(row)
    }

    async fn list_documents(&self, owner: Option<Uuid>) -> Result<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_documents.load(Ordering::SeqCst) {
            bail!("select rejected");
        }
        let mut rows: Vec<Document> = self
            .documents
            .lock()
            .await
            .iter()
            .filter(|row| owner.map(|id| row.user_id == id).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .documents
            .lock()
            .await
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn update_document_url(&self, id: Uuid, url: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure!(
            !self.fail_url_updates.lock().await.contains(&id),
            "update rejected for {id}"
        );
        let mut rows = self.documents.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| anyhow!("document {id} missing"))?;
        row.url = url.to_string();
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ensure!(
            !self.fail_delete_rows.lock().await.contains(&id),
            "delete rejected for {id}"
        );
        let mut rows = self.documents.lock().await;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() != before)
    }

    async fn find_role(&self, user_id: Uuid) -> Result<Option<Role>> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_find_role.load(Ordering::SeqCst) {
            bail!("user_roles unavailable");
        }
        Ok(self.roles.lock().await.get(&user_id).copied())
    }

    async fn upsert_role(&self, user_id: Uuid, role: Role) -> Result<()> {
        self.roles.lock().await.insert(user_id, role);
        Ok(())
    }

    async fn list_topics(&self, category: Option<ForumCategory>) -> Result<Vec<ForumTopic>> {
        let mut topics: Vec<ForumTopic> = self
            .topics
            .lock()
            .await
            .iter()
            .filter(|topic| {
                category
                    .map(|category| topic.category == category.as_str())
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(topics)
    }

    async fn find_topic(&self, id: Uuid) -> Result<Option<ForumTopic>> {
        Ok(self
            .topics
            .lock()
            .await
            .iter()
            .find(|topic| topic.id == id)
            .cloned())
    }

    async fn insert_topic(&self, topic: NewForumTopic) -> Result<ForumTopic> {
        let now = self.tick();
        let row = ForumTopic {
            id: topic.id,
            title: topic.title,
            content: topic.content,
            category: topic.category,
            user_id: topic.user_id,
            reply_count: topic.reply_count,
            created_at: now,
            updated_at: now,
        };
        self.topics.lock().await.push(row.clone());
        Ok(row)
    }

    async fn list_replies(&self, topic_id: Uuid) -> Result<Vec<ForumReply>> {
        let mut replies: Vec<ForumReply> = self
            .replies
            .lock()
            .await
            .iter()
            .filter(|reply| reply.topic_id == topic_id)
            .cloned()
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(replies)
    }

    async fn insert_reply(&self, reply: NewForumReply) -> Result<ForumReply> {
        let row = ForumReply {
            id: reply.id,
            topic_id: reply.topic_id,
            user_id: reply.user_id,
            content: reply.content,
            created_at: self.tick(),
        };
        self.replies.lock().await.push(row.clone());
        Ok(row)
    }

    async fn bump_topic_activity(&self, topic_id: Uuid, updated_at: DateTime<Utc>) -> Result<i32> {
        if self.fail_topic_activity.load(Ordering::SeqCst) {
            bail!("topic update rejected");
        }
        let mut topics = self.topics.lock().await;
        let topic = topics
            .iter_mut()
            .find(|topic| topic.id == topic_id)
            .ok_or_else(|| anyhow!("topic {topic_id} missing"))?;
        topic.reply_count += 1;
        topic.updated_at = updated_at;
        Ok(topic.reply_count)
    }

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
        let profiles = self.profiles.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|profile| (*id, profile.clone())))
            .collect())
    }
}

#[allow(dead_code)]
impl FakeRecords {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn role_lookups(&self) -> usize {
        self.role_lookups.load(Ordering::SeqCst)
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.lock().await.clone()
    }

    pub async fn document(&self, id: Uuid) -> Option<Document> {
        self.documents
            .lock()
            .await
            .iter()
            .find(|row| row.id == id)
            .cloned()
    }

    pub async fn role(&self, user_id: Uuid) -> Option<Role> {
        self.roles.lock().await.get(&user_id).copied()
    }

    pub async fn remove_role(&self, user_id: Uuid) {
        self.roles.lock().await.remove(&user_id);
    }

    pub async fn topic(&self, id: Uuid) -> Option<ForumTopic> {
        self.topics
            .lock()
            .await
            .iter()
            .find(|topic| topic.id == id)
            .cloned()
    }

    pub async fn reply_count_for(&self, topic_id: Uuid) -> usize {
        self.replies
            .lock()
            .await
            .iter()
            .filter(|reply| reply.topic_id == topic_id)
            .count()
    }

    pub async fn add_profile(&self, id: Uuid, full_name: Option<&str>) {
        self.profiles.lock().await.insert(
            id,
            Profile {
                id,
                full_name: full_name.map(str::to_owned),
                avatar_url: None,
            },
        );
    }

    pub fn fail_document_inserts(&self) {
        self.fail_insert_document.store(true, Ordering::SeqCst);
    }

    pub fn fail_document_listing(&self) {
        self.fail_list_documents.store(true, Ordering::SeqCst);
    }

    pub fn fail_role_lookups(&self) {
        self.fail_find_role.store(true, Ordering::SeqCst);
    }

    pub fn fail_topic_updates(&self) {
        self.fail_topic_activity.store(true, Ordering::SeqCst);
    }

    pub async fn fail_row_delete(&self, id: Uuid) {
        self.fail_delete_rows.lock().await.insert(id);
    }

    pub async fn fail_url_update(&self, id: Uuid) {
        self.fail_url_updates.lock().await.insert(id);
    }
}

#[derive(Clone)]
pub struct FakeUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
    pub confirmed: bool,
    pub metadata: Value,
}

/// Auth service double. Issues real HS256 tokens signed with [`JWT_SECRET`].
#[derive(Default)]
pub struct FakeAuth {
    users: Mutex<HashMap<Uuid, FakeUser>>,
    updates: Mutex<Vec<(Uuid, UserUpdate)>>,
    sign_outs: Mutex<Vec<(Uuid, SignOutScope)>>,
    resets: Mutex<Vec<(String, String)>>,
    fail_update: AtomicBool,
    fail_sign_out: AtomicBool,
}

impl FakeAuth {
    fn auth_user(user: &FakeUser) -> AuthUser {
        AuthUser {
            id: user.id,
            email: Some(user.email.clone()),
            email_confirmed_at: user.confirmed.then(Utc::now),
            user_metadata: user.metadata.clone(),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser> {
        let mut users = self.users.lock().await;
        ensure!(
            !users.values().any(|user| user.email == email),
            "User already registered"
        );
        let user = FakeUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
            confirmed: false,
            metadata,
        };
        users.insert(user.id, user.clone());
        Ok(Self::auth_user(&user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let users = self.users.lock().await;
        let user = users
            .values()
            .find(|user| user.email == email && user.password == password)
            .ok_or_else(|| anyhow!("Invalid login credentials"))?;
        Ok(AuthSession {
            access_token: mint_token(user.id, &user.email, user.metadata.clone()),
            refresh_token: format!("refresh-{}", user.id),
            expires_in: 3600,
            user: Self::auth_user(user),
        })
    }

    async fn sign_out(&self, session: &Session, scope: SignOutScope) -> Result<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            bail!("logout failed");
        }
        self.sign_outs.lock().await.push((session.user_id, scope));
        Ok(())
    }

    async fn update_user(&self, session: &Session, update: &UserUpdate) -> Result<AuthUser> {
        if self.fail_update.load(Ordering::SeqCst) {
            bail!("update rejected");
        }
        self.updates
            .lock()
            .await
            .push((session.user_id, update.clone()));

        let mut users = self.users.lock().await;
        let user = users.entry(session.user_id).or_insert_with(|| FakeUser {
            id: session.user_id,
            email: session.email().to_string(),
            password: String::new(),
            confirmed: true,
            metadata: json!({}),
        });
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(password) = &update.password {
            user.password = password.clone();
        }
        if let (Some(Value::Object(data)), Value::Object(existing)) =
            (&update.data, &mut user.metadata)
        {
            existing.extend(data.clone());
        }
        Ok(Self::auth_user(user))
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.resets
            .lock()
            .await
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

#[allow(dead_code)]
impl FakeAuth {
    pub async fn register(&self, email: &str, password: &str, confirmed: bool) -> Uuid {
        let user = FakeUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password: password.to_string(),
            confirmed,
            metadata: json!({}),
        };
        let id = user.id;
        self.users.lock().await.insert(id, user);
        id
    }

    pub async fn user(&self, id: Uuid) -> Option<FakeUser> {
        self.users.lock().await.get(&id).cloned()
    }

    pub async fn user_by_email(&self, email: &str) -> Option<FakeUser> {
        self.users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned()
    }

    pub async fn updates(&self) -> Vec<(Uuid, UserUpdate)> {
        self.updates.lock().await.clone()
    }

    pub async fn sign_outs(&self) -> Vec<(Uuid, SignOutScope)> {
        self.sign_outs.lock().await.clone()
    }

    pub async fn resets(&self) -> Vec<(String, String)> {
        self.resets.lock().await.clone()
    }

    pub fn fail_updates(&self) {
        self.fail_update.store(true, Ordering::SeqCst);
    }

    pub fn fail_sign_outs(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }
}

pub fn mint_token(user_id: Uuid, email: &str, user_metadata: Value) -> String {
    let exp = (Utc::now() + ChronoDuration::hours(1)).timestamp() as usize;
    let claims = json!({
        "sub": user_id,
        "email": email,
        "aud": JWT_AUDIENCE,
        "exp": exp,
        "role": "authenticated",
        "user_metadata": user_metadata,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("test token encodes")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused@localhost/unused".to_string(),
        database_max_pool_size: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        site_url: "http://portal.test".to_string(),
        baas_url: "http://baas.test".to_string(),
        baas_anon_key: "anon".to_string(),
        baas_jwt_secret: JWT_SECRET.to_string(),
        jwt_audience: JWT_AUDIENCE.to_string(),
        session_cookie_name: COOKIE_NAME.to_string(),
        session_cookie_secure: false,
        session_cookie_domain: None,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        storage_bucket: "documents".to_string(),
        storage_public_url: None,
        document_url_mode: DocumentUrlMode::Signed,
        signed_url_expiry_seconds: 604_800,
        role_source: RoleSource::Table,
        teacher_email: Some(TEACHER_EMAIL.to_string()),
        auth_bypass: false,
        static_dir: None,
    }
}

/// A signed-in visitor for request helpers.
#[derive(Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
    records: Arc<FakeRecords>,
    auth: Arc<FakeAuth>,
    cache: Arc<InMemoryRoleCache>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let storage = Arc::new(FakeStorage::default());
        let records = Arc::new(FakeRecords::default());
        let auth = Arc::new(FakeAuth::default());
        let cache = Arc::new(InMemoryRoleCache::default());

        let records_for_state: Arc<dyn RecordStore> = records.clone();
        let cache_for_state: Arc<dyn RoleCache> = cache.clone();
        let roles = RoleResolver::from_config(&config, records_for_state.clone(), cache_for_state);
        let state = AppState::new(
            config,
            records_for_state,
            storage.clone(),
            auth.clone(),
            roles,
        );
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
            records,
            auth,
            cache,
        })
    }

    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub fn records(&self) -> Arc<FakeRecords> {
        self.records.clone()
    }

    pub fn auth(&self) -> Arc<FakeAuth> {
        self.auth.clone()
    }

    pub fn cache(&self) -> Arc<InMemoryRoleCache> {
        self.cache.clone()
    }

    pub fn user(&self, email: &str, metadata: Value) -> TestUser {
        let id = Uuid::new_v4();
        TestUser {
            id,
            email: email.to_string(),
            token: mint_token(id, email, metadata),
        }
    }

    pub async fn student(&self, email: &str, full_name: &str) -> Result<TestUser> {
        let user = self.user(email, json!({ "full_name": full_name }));
        self.records.upsert_role(user.id, Role::Student).await?;
        Ok(user)
    }

    pub async fn teacher(&self) -> Result<TestUser> {
        let user = self.user(TEACHER_EMAIL, json!({ "full_name": "Ms Teacher" }));
        self.records.upsert_role(user.id, Role::Teacher).await?;
        Ok(user)
    }

    /// Writes a blob and its row directly, bypassing the upload workflow.
    pub async fn seed_document(&self, owner: &TestUser, name: &str) -> Result<Document> {
        let path = format!("{}/{}", owner.id, Uuid::new_v4().simple());
        self.storage
            .put_object(&path, b"%PDF-1.4".to_vec(), Some("application/pdf".into()), None)
            .await?;
        self.records
            .insert_document(NewDocument {
                id: Uuid::new_v4(),
                user_id: owner.id,
                file_name: name.to_string(),
                file_type: "application/pdf".to_string(),
                file_size: 8,
                file_path: path.clone(),
                url: format!("https://stale/{path}"),
                user_email: owner.email.clone(),
                user_name: None,
                uploaded_by_teacher: false,
                teacher_email: None,
            })
            .await
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body))?).await
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn get_with_cookie(
        &self,
        path: &str,
        cookie: &str,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("cookie", cookie)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        self.send(builder.body(Body::empty())?).await
    }

    pub async fn upload_document(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
        student_id: Option<Uuid>,
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");

        if let Some(student) = student_id {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"student_id\"\r\n\r\n");
            body.extend(student.to_string().as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/documents")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        self.send(request).await
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_json(response: hyper::Response<Body>) -> Result<Value> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}
