use std::sync::Arc;
use std::time::Duration;

use crate::auth::{JwtTokenProvider, TokenProvider};
use crate::config::AppConfig;
use crate::filter::{EntitlementContext, QuerySpecBuilder};
use crate::services::{EntitlementPolicy, EntitlementResolver, HttpEntitlementResolver, SearchOrchestrator};

/// Long-lived collaborators shared by all request handlers.
///
/// Built once at startup; every field is read-only afterwards except the token
/// cache, which guards itself.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub builder: Arc<QuerySpecBuilder>,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub resolver: Arc<dyn EntitlementResolver>,
    pub policy: EntitlementPolicy,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        orchestrator: SearchOrchestrator,
        resolver: Arc<dyn EntitlementResolver>,
    ) -> Self {
        Self {
            builder: Arc::new(QuerySpecBuilder::from_config(&config.frontend)),
            policy: EntitlementPolicy::from_config(&config.frontend),
            orchestrator: Arc::new(orchestrator),
            resolver,
            config: Arc::new(config),
        }
    }

    /// Wire the production collaborators: JWT token provider, HTTP resolver, discovery client.
    pub fn from_config(config: AppConfig) -> reqwest::Result<Self> {
        let client = SearchOrchestrator::http_client(config.services.timeout_secs.map(Duration::from_secs))?;
        let tokens: Arc<dyn TokenProvider> = Arc::new(JwtTokenProvider::new(&config.authz));
        let orchestrator = SearchOrchestrator::new(client.clone(), &config.services.discovery_url, tokens.clone());
        let resolver = Arc::new(HttpEntitlementResolver::new(client, &config.services.entitlements_url, tokens));
        Ok(Self::new(config, orchestrator, resolver))
    }

    /// Whether queries are narrowed to the user's BTRs at all.
    ///
    /// The embedded store holds a single site's data and has no btr index.
    pub fn scoping_enabled(&self) -> bool {
        self.config.frontend.check_btrs && !self.config.frontend.embedded_store
    }

    pub async fn entitlements(&self, user: &str) -> EntitlementContext {
        if !self.scoping_enabled() {
            return EntitlementContext::unrestricted();
        }
        self.policy.resolve(self.resolver.as_ref(), user).await
    }
}
