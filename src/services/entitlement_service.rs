use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{TokenError, TokenProvider};
use crate::config::FrontendConfig;
use crate::filter::EntitlementContext;

/// Organizational attributes of a user as reported by the user-attribute service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntitlements {
    #[serde(default, alias = "foxden_groups")]
    pub groups: Vec<String>,
    #[serde(default)]
    pub btrs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Entitlement service returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait EntitlementResolver: Send + Sync {
    async fn lookup(&self, user: &str) -> Result<UserEntitlements, EntitlementError>;
}

/// Deployment flags that decide who may see every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitlementPolicy {
    pub check_admins: bool,
    pub allow_all_records: bool,
}

impl EntitlementPolicy {
    pub fn from_config(config: &FrontendConfig) -> Self {
        Self {
            check_admins: config.check_admins,
            allow_all_records: config.allow_all_records,
        }
    }

    pub fn context(&self, entitlements: &UserEntitlements) -> EntitlementContext {
        let elevated = (!entitlements.groups.is_empty() && self.check_admins) || self.allow_all_records;
        EntitlementContext::new(entitlements.btrs.iter().cloned(), elevated)
    }

    /// Resolve a user's context, failing closed when the lookup fails.
    pub async fn resolve(&self, resolver: &dyn EntitlementResolver, user: &str) -> EntitlementContext {
        match resolver.lookup(user).await {
            Ok(entitlements) => self.context(&entitlements),
            Err(e) => {
                tracing::warn!("Entitlement lookup failed for user '{}': {}", user, e);
                EntitlementContext::denied()
            }
        }
    }
}

/// Looks users up at `<base_url>/user/<name>`.
pub struct HttpEntitlementResolver {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpEntitlementResolver {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl EntitlementResolver for HttpEntitlementResolver {
    async fn lookup(&self, user: &str) -> Result<UserEntitlements, EntitlementError> {
        let token = self.tokens.token().await?;
        let mut url = url::Url::parse(&format!("{}/user/", self.base_url))
            .map_err(|_| EntitlementError::UnknownUser(user.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| EntitlementError::UnknownUser(user.to_string()))?
            .pop_if_empty()
            .push(user);

        let resp = self.client.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EntitlementError::UnknownUser(user.to_string()));
        }
        if !status.is_success() {
            return Err(EntitlementError::Status(status.as_u16()));
        }
        Ok(resp.json::<UserEntitlements>().await?)
    }
}

/// Fixed user table, for development setups and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEntitlementResolver {
    users: HashMap<String, UserEntitlements>,
}

impl StaticEntitlementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>, entitlements: UserEntitlements) -> Self {
        self.users.insert(user.into(), entitlements);
        self
    }
}

#[async_trait]
impl EntitlementResolver for StaticEntitlementResolver {
    async fn lookup(&self, user: &str) -> Result<UserEntitlements, EntitlementError> {
        self.users
            .get(user)
            .cloned()
            .ok_or_else(|| EntitlementError::UnknownUser(user.to_string()))
    }
}
