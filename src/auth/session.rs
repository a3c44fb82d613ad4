use anyhow::Result;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::AppConfig;

/// Verifies access tokens minted by the hosted auth service.
#[derive(Clone)]
pub struct SessionVerifier {
    decoding: DecodingKey,
    audience: String,
}

impl SessionVerifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.baas_jwt_secret, &config.jwt_audience)
    }

    pub fn new(secret: &str, audience: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.to_owned(),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.clone()]);
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub user_metadata: Value,
}
