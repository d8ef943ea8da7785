use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::AuthzConfig;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub application: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Client-credential claims the frontend presents to backend services.
    pub fn client_credentials(user: impl Into<String>, scope: impl Into<String>, expires_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            user: user.into(),
            scope: scope.into(),
            kind: "client_credentials".to_string(),
            application: "FOXDEN".to_string(),
            exp: (now + Duration::seconds(expires_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Generation(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    Invalid(String),
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| TokenError::Generation(e.to_string()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| TokenError::Invalid(e.to_string()))
}

/// Source of bearer tokens for calls to backend services.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - now > REFRESH_MARGIN_SECS
    }
}

/// Mints client-credential JWTs and reuses one until it is close to expiry.
pub struct JwtTokenProvider {
    client_id: String,
    scope: String,
    secret: String,
    expires_secs: i64,
    cache: RwLock<Option<CachedToken>>,
}

impl JwtTokenProvider {
    pub fn new(config: &AuthzConfig) -> Self {
        let expires_secs = if config.token_expires_secs > 0 { config.token_expires_secs } else { 7200 };
        Self {
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            secret: config.jwt_secret.clone(),
            expires_secs,
            cache: RwLock::new(None),
        }
    }

    fn mint(&self) -> Result<CachedToken, TokenError> {
        let claims = Claims::client_credentials(&self.client_id, &self.scope, self.expires_secs);
        let value = generate_jwt(&claims, &self.secret)?;
        Ok(CachedToken { value, expires_at: claims.exp })
    }
}

#[async_trait]
impl TokenProvider for JwtTokenProvider {
    async fn token(&self) -> Result<String, TokenError> {
        // Fast path: try read lock
        {
            let cached = self.cache.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now().timestamp())) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cache.write().await;
        // Another caller may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now().timestamp())) {
            return Ok(token.value.clone());
        }

        let token = self.mint()?;
        tracing::debug!(scope = %self.scope, expires_at = token.expires_at, "refreshed service token");
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}
