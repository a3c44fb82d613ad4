use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::Session;
use crate::config::AppConfig;

/// User record as returned by the hosted auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutScope {
    Local,
    Global,
}

impl SignOutScope {
    fn as_str(&self) -> &'static str {
        match self {
            SignOutScope::Local => "local",
            SignOutScope::Global => "global",
        }
    }
}

/// Partial update of the signed-in user. `data` is merged into user metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self, session: &Session, scope: SignOutScope) -> Result<()>;

    async fn update_user(&self, session: &Session, update: &UserUpdate) -> Result<AuthUser>;

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()>;
}

/// REST client for a GoTrue-compatible auth service.
pub struct GoTrueClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GoTrueClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("tutor-portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build auth HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", config.baas_url),
            api_key: config.baas_anon_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
    }
}

async fn check(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("unexpected response")
        .to_string();
    Err(anyhow!("{action} failed ({status}): {message}"))
}

#[async_trait]
impl AuthProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<AuthUser> {
        let response = self
            .request(reqwest::Method::POST, "/signup")
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .context("sign up request failed")?;
        let body: Value = check(response, "sign up")
            .await?
            .json()
            .await
            .context("invalid sign up response")?;

        // With autoconfirm the service answers with a session, otherwise with the bare user.
        let user = body.get("user").cloned().unwrap_or(body);
        serde_json::from_value(user).context("invalid user in sign up response")
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .request(reqwest::Method::POST, "/token?grant_type=password")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("sign in request failed")?;
        check(response, "sign in")
            .await?
            .json()
            .await
            .context("invalid sign in response")
    }

    async fn sign_out(&self, session: &Session, scope: SignOutScope) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/logout?scope={}", scope.as_str()),
            )
            .bearer_auth(&session.access_token)
            .send()
            .await
            .context("sign out request failed")?;
        check(response, "sign out").await?;
        Ok(())
    }

    async fn update_user(&self, session: &Session, update: &UserUpdate) -> Result<AuthUser> {
        let response = self
            .request(reqwest::Method::PUT, "/user")
            .bearer_auth(&session.access_token)
            .json(update)
            .send()
            .await
            .context("update user request failed")?;
        check(response, "update user")
            .await?
            .json()
            .await
            .context("invalid update user response")
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .context("password reset request failed")?;
        check(response, "password reset").await?;
        Ok(())
    }
}
