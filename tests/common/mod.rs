#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use foxden_frontend::auth::{generate_jwt, Claims, TokenError, TokenProvider};
use foxden_frontend::config::AppConfig;
use foxden_frontend::services::{
    EntitlementResolver, SearchOrchestrator, StaticEntitlementResolver, UserEntitlements,
};
use foxden_frontend::AppState;

pub const SESSION_SECRET: &str = "test-session-secret";
pub const SERVICE_TOKEN: &str = "test-service-token";

/// One request received by the mock discovery service.
#[derive(Debug, Clone)]
pub struct Hit {
    pub endpoint: &'static str,
    pub authorization: Option<String>,
    pub body: Value,
}

impl Hit {
    pub fn service_query(&self) -> &Value {
        &self.body["service_query"]
    }
}

/// How the mock answers every request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Serve these records, paged by the request's `idx`/`limit`
    Records(Vec<Value>),
    /// Plain HTTP failure
    Status(u16),
    /// HTTP 200 whose envelope reports a failure
    EnvelopeCode(u16),
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    hits: Arc<Mutex<Vec<Hit>>>,
}

/// In-process discovery backend bound on a free local port.
pub struct MockDiscovery {
    pub url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl MockDiscovery {
    pub async fn start(reply: Reply) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock discovery")?;

        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = MockState { reply, hits: hits.clone() };
        let router = Router::new()
            .route("/search", post(search))
            .route("/nrecords", post(nrecords))
            .with_state(state);

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { url: format!("http://127.0.0.1:{}", port), hits })
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }
}

fn record(state: &MockState, endpoint: &'static str, headers: &HeaderMap, body: &Value) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.hits.lock().unwrap().push(Hit { endpoint, authorization, body: body.clone() });
}

async fn search(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "search", &headers, &body);
    match &state.reply {
        Reply::Records(records) => {
            let query = &body["service_query"];
            let matching = matching(records, &query["spec"]);
            let idx = query["idx"].as_i64().unwrap_or(0).max(0) as usize;
            let limit = query["limit"].as_i64().unwrap_or(-1);
            let page: Vec<Value> = if limit < 0 {
                matching.iter().skip(idx).cloned().collect()
            } else {
                matching.iter().skip(idx).take(limit as usize).cloned().collect()
            };
            (
                StatusCode::OK,
                Json(json!({"http_code": 200, "results": {"nrecords": matching.len(), "records": page}})),
            )
        }
        other => failure(other),
    }
}

async fn nrecords(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    record(&state, "nrecords", &headers, &body);
    match &state.reply {
        Reply::Records(records) => (
            StatusCode::OK,
            Json(json!({"httpCode": 200, "results": {"nrecords": matching(records, &body["service_query"]["spec"]).len()}})),
        ),
        other => failure(other),
    }
}

/// Evaluates top-level equality and `{"$in": [..]}` clauses of the spec; other
/// clauses (operators, regexes) match everything.
fn matching(records: &[Value], spec: &Value) -> Vec<Value> {
    let Some(spec) = spec.as_object() else {
        return records.to_vec();
    };
    records
        .iter()
        .filter(|record| {
            spec.iter().all(|(key, expected)| match expected {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => record.get(key) == Some(expected),
                Value::Object(obj) if obj.len() == 1 => match obj.get("$in") {
                    Some(Value::Array(values)) => record.get(key).is_some_and(|v| values.contains(v)),
                    _ => true,
                },
                _ => true,
            })
        })
        .cloned()
        .collect()
}

fn failure(reply: &Reply) -> (StatusCode, Json<Value>) {
    match reply {
        Reply::Status(code) => (
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({"error": "backend failure"})),
        ),
        Reply::EnvelopeCode(code) => (
            StatusCode::OK,
            Json(json!({"http_code": code, "error": "database unavailable", "results": {"nrecords": 0}})),
        ),
        Reply::Records(_) => unreachable!(),
    }
}

/// Records spread over the given BTRs, numbered by `run`.
pub fn records(count: usize, btrs: &[&str]) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "btr": btrs[i % btrs.len()],
                "cycle": "2024-3",
                "beamline": "3a",
                "run": i,
                "did": format!("/beamline=3a/btr={}/run={}", btrs[i % btrs.len()], i),
            })
        })
        .collect()
}

/// Token provider that always hands out the same token.
pub struct FixedToken;

#[async_trait]
impl TokenProvider for FixedToken {
    async fn token(&self) -> Result<String, TokenError> {
        Ok(SERVICE_TOKEN.to_string())
    }
}

pub fn orchestrator(discovery_url: &str) -> SearchOrchestrator {
    SearchOrchestrator::new(reqwest::Client::new(), discovery_url, Arc::new(FixedToken))
}

pub fn entitlements(groups: &[&str], btrs: &[&str]) -> UserEntitlements {
    UserEntitlements {
        groups: groups.iter().map(|s| s.to_string()).collect(),
        btrs: btrs.iter().map(|s| s.to_string()).collect(),
    }
}

/// Users known to the tests: alice (B1, B2), bob (nothing), carol (admin group, B3).
pub fn resolver() -> Arc<dyn EntitlementResolver> {
    Arc::new(
        StaticEntitlementResolver::new()
            .with_user("alice", entitlements(&[], &["B1", "B2"]))
            .with_user("bob", entitlements(&[], &[]))
            .with_user("carol", entitlements(&["chess-admins"], &["B3"])),
    )
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.authz.jwt_secret = SESSION_SECRET.to_string();
    config
}

pub fn app_state(discovery_url: &str, config: AppConfig) -> AppState {
    AppState::new(config, orchestrator(discovery_url), resolver())
}

pub fn session_token(user: &str) -> String {
    let claims = Claims::client_credentials(user, "read", 3600);
    generate_jwt(&claims, SESSION_SECRET).expect("failed to sign session token")
}
