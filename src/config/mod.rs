use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub frontend: FrontendConfig,
    pub services: ServicesConfig,
    pub authz: AuthzConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which authorization axis a site uses when scoping queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deployment {
    Chess,
    MagLab,
}

impl Deployment {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chess" => Some(Deployment::Chess),
            "maglab" => Some(Deployment::MagLab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub deployment: Deployment,
    /// Scope every query by the user's BTRs
    pub check_btrs: bool,
    /// Users with any organizational group see every record
    pub check_admins: bool,
    pub allow_all_records: bool,
    /// Discovery runs on an embedded document store without `$regex` support
    pub embedded_store: bool,
    pub default_limit: i64,
    pub default_sort_key: String,
    pub default_attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub discovery_url: String,
    pub entitlements_url: String,
    /// Outbound request timeout; `None` keeps the HTTP client default
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    pub client_id: String,
    pub jwt_secret: String,
    pub token_expires_secs: i64,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Frontend overrides
        if let Ok(v) = env::var("FRONTEND_DEPLOYMENT") {
            self.frontend.deployment = Deployment::parse(&v).unwrap_or(self.frontend.deployment);
        }
        if let Ok(v) = env::var("FRONTEND_CHECK_BTRS") {
            self.frontend.check_btrs = v.parse().unwrap_or(self.frontend.check_btrs);
        }
        if let Ok(v) = env::var("FRONTEND_CHECK_ADMINS") {
            self.frontend.check_admins = v.parse().unwrap_or(self.frontend.check_admins);
        }
        if let Ok(v) = env::var("FRONTEND_ALLOW_ALL_RECORDS") {
            self.frontend.allow_all_records = v.parse().unwrap_or(self.frontend.allow_all_records);
        }
        if let Ok(v) = env::var("FRONTEND_EMBEDDED_STORE") {
            self.frontend.embedded_store = v.parse().unwrap_or(self.frontend.embedded_store);
        }
        if let Ok(v) = env::var("FRONTEND_DEFAULT_LIMIT") {
            self.frontend.default_limit = v.parse().unwrap_or(self.frontend.default_limit);
        }
        if let Ok(v) = env::var("FRONTEND_DEFAULT_SORT_KEY") {
            self.frontend.default_sort_key = v;
        }
        if let Ok(v) = env::var("FRONTEND_DEFAULT_ATTRIBUTES") {
            self.frontend.default_attributes = split_list(&v);
        }

        // Services overrides
        if let Ok(v) = env::var("DISCOVERY_URL") {
            self.services.discovery_url = v;
        }
        if let Ok(v) = env::var("ENTITLEMENTS_URL") {
            self.services.entitlements_url = v;
        }
        if let Ok(v) = env::var("SERVICES_TIMEOUT_SECS") {
            self.services.timeout_secs = v.parse().ok();
        }

        // Authz overrides
        if let Ok(v) = env::var("AUTHZ_CLIENT_ID") {
            self.authz.client_id = v;
        }
        if let Ok(v) = env::var("AUTHZ_JWT_SECRET") {
            self.authz.jwt_secret = v;
        }
        if let Ok(v) = env::var("AUTHZ_TOKEN_EXPIRES_SECS") {
            self.authz.token_expires_secs = v.parse().unwrap_or(self.authz.token_expires_secs);
        }

        // API overrides
        if let Ok(v) = env::var("FRONTEND_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    fn frontend_defaults() -> FrontendConfig {
        FrontendConfig {
            deployment: Deployment::Chess,
            check_btrs: true,
            check_admins: false,
            allow_all_records: false,
            embedded_store: false,
            default_limit: 10,
            default_sort_key: "date".to_string(),
            default_attributes: ["beamline", "btr", "cycle", "sample_name", "user"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    fn authz_defaults() -> AuthzConfig {
        AuthzConfig {
            client_id: "foxden-frontend".to_string(),
            jwt_secret: String::new(),
            token_expires_secs: 7200,
            scope: "read".to_string(),
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            frontend: Self::frontend_defaults(),
            services: ServicesConfig {
                discovery_url: "http://localhost:8320".to_string(),
                entitlements_url: "http://localhost:8380".to_string(),
                timeout_secs: None,
            },
            authz: Self::authz_defaults(),
            api: ApiConfig {
                port: 8344,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:8344".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            frontend: Self::frontend_defaults(),
            services: ServicesConfig {
                discovery_url: "http://discovery:8320".to_string(),
                entitlements_url: "http://entitlements:8380".to_string(),
                timeout_secs: Some(30),
            },
            authz: Self::authz_defaults(),
            api: ApiConfig {
                port: 8344,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            frontend: Self::frontend_defaults(),
            services: ServicesConfig {
                discovery_url: "http://discovery:8320".to_string(),
                entitlements_url: "http://entitlements:8380".to_string(),
                timeout_secs: Some(10),
            },
            authz: AuthzConfig {
                token_expires_secs: 3600,
                ..Self::authz_defaults()
            },
            api: ApiConfig {
                port: 8344,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - read once by main, then handed to components
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
