use std::env;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_SIGNED_URL_EXPIRY_SECONDS: u64 = 60 * 60 * 24 * 7;

/// Where the role of an authenticated user is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleSource {
    Table,
    Email,
    Metadata,
}

impl FromStr for RoleSource {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "email" => Ok(Self::Email),
            "metadata" => Ok(Self::Metadata),
            other => Err(anyhow!(
                "unknown role source '{other}', expected table, email or metadata"
            )),
        }
    }
}

impl RoleSource {
    /// True when the role comes from a claim the user can rewrite through
    /// the auth provider's `PUT /user`.
    pub fn is_user_editable(&self) -> bool {
        matches!(self, Self::Metadata)
    }
}

/// Which URL is stored on a document row right after upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentUrlMode {
    Signed,
    Public,
}

impl FromStr for DocumentUrlMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "signed" => Ok(Self::Signed),
            "public" => Ok(Self::Public),
            other => Err(anyhow!(
                "unknown document url mode '{other}', expected signed or public"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub site_url: String,
    pub baas_url: String,
    pub baas_anon_key: String,
    pub baas_jwt_secret: String,
    pub jwt_audience: String,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub session_cookie_domain: Option<String>,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub storage_bucket: String,
    pub storage_public_url: Option<String>,
    pub document_url_mode: DocumentUrlMode,
    pub signed_url_expiry_seconds: u64,
    pub role_source: RoleSource,
    pub teacher_email: Option<String>,
    pub auth_bypass: bool,
    pub static_dir: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://{server_host}:{server_port}"))
            .trim_end_matches('/')
            .to_string();
        let baas_url = env::var("BAAS_URL")
            .context("BAAS_URL must be set")?
            .trim_end_matches('/')
            .to_string();
        let baas_anon_key = env::var("BAAS_ANON_KEY").context("BAAS_ANON_KEY must be set")?;
        let baas_jwt_secret =
            env::var("BAAS_JWT_SECRET").context("BAAS_JWT_SECRET must be set")?;
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let session_cookie_name =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "sb-access-token".to_string());
        let session_cookie_secure = env_flag("SESSION_COOKIE_SECURE");
        let session_cookie_domain = env::var("SESSION_COOKIE_DOMAIN").ok();
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let storage_bucket =
            env::var("STORAGE_BUCKET").unwrap_or_else(|_| "documents".to_string());
        let storage_public_url = env::var("STORAGE_PUBLIC_URL")
            .ok()
            .map(|value| value.trim_end_matches('/').to_string());
        let document_url_mode = env::var("DOCUMENT_URL_MODE")
            .unwrap_or_else(|_| "signed".to_string())
            .parse()?;
        let signed_url_expiry_seconds = env::var("SIGNED_URL_EXPIRY_SECONDS")
            .unwrap_or_else(|_| DEFAULT_SIGNED_URL_EXPIRY_SECONDS.to_string())
            .parse()
            .context("SIGNED_URL_EXPIRY_SECONDS must be an integer")?;
        let role_source = env::var("ROLE_SOURCE")
            .unwrap_or_else(|_| "table".to_string())
            .parse()?;
        let teacher_email = env::var("TEACHER_EMAIL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let auth_bypass = env_flag("AUTH_BYPASS");
        let static_dir = env::var("STATIC_DIR").ok();

        let config = Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            site_url,
            baas_url,
            baas_anon_key,
            baas_jwt_secret,
            jwt_audience,
            session_cookie_name,
            session_cookie_secure,
            session_cookie_domain,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            storage_bucket,
            storage_public_url,
            document_url_mode,
            signed_url_expiry_seconds,
            role_source,
            teacher_email,
            auth_bypass,
            static_dir,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.role_source == RoleSource::Email && self.teacher_email.is_none() {
            bail!("TEACHER_EMAIL must be set when ROLE_SOURCE=email");
        }
        if self.document_url_mode == DocumentUrlMode::Public && self.storage_public_url.is_none()
        {
            bail!("STORAGE_PUBLIC_URL must be set when DOCUMENT_URL_MODE=public");
        }
        Ok(())
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }

    /// True when `email` belongs to the single designated teacher account.
    pub fn is_teacher_email(&self, email: &str) -> bool {
        self.teacher_email
            .as_deref()
            .map(|teacher| teacher.eq_ignore_ascii_case(email.trim()))
            .unwrap_or(false)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
