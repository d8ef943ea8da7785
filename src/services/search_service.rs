use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::TokenProvider;
use crate::filter::{EntitlementContext, FilterExpression};

/// Identifies this frontend to the discovery service.
const CLIENT_NAME: &str = "frontend";

/// Sort direction as the discovery service expects it: `1` or `-1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Accepts the spellings used by the web forms; anything unknown sorts descending.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" | "1" => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        }
    }
}

impl From<SortOrder> for i32 {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

impl From<i32> for SortOrder {
    fn from(v: i32) -> Self {
        if v > 0 { SortOrder::Ascending } else { SortOrder::Descending }
    }
}

/// One request to the discovery service. `limit < 0` asks for everything at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "FilterExpression::is_empty")]
    pub spec: FilterExpression,
    #[serde(default)]
    pub sort_keys: Vec<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub idx: i64,
    #[serde(default)]
    pub limit: i64,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    /// Query whose text is the serialized spec.
    pub fn from_spec(spec: FilterExpression) -> Self {
        Self { query: spec.to_string(), spec, ..Self::default() }
    }

    pub fn page(mut self, idx: i64, limit: i64) -> Self {
        self.idx = idx;
        self.limit = limit;
        self
    }

    pub fn sorted(mut self, sort_keys: Vec<String>, sort_order: SortOrder) -> Self {
        self.sort_keys = sort_keys;
        self.sort_order = sort_order;
        self
    }
}

#[derive(Debug, Serialize)]
struct ServiceRequest<'a> {
    client: &'static str,
    service_query: &'a SearchQuery,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    #[serde(default, rename = "http_code", alias = "httpCode")]
    http_code: Option<u16>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: ServiceResults,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceResults {
    #[serde(default)]
    nrecords: i64,
    #[serde(default)]
    records: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub records: Vec<Value>,
    pub total_count: i64,
    pub http_status: u16,
}

/// Successful outcome of `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The backend answered and nothing matched
    NoResults,
    Found(SearchResult),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Given query is not valid JSON: {reason}")]
    MalformedQuery { query: String, reason: String },

    #[error("Unable to get meta-data from upstream server: {0}")]
    UpstreamUnavailable(String),
}

/// Executes scoped queries against the discovery service.
pub struct SearchOrchestrator {
    client: reqwest::Client,
    discovery_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl SearchOrchestrator {
    pub fn new(client: reqwest::Client, discovery_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            discovery_url: discovery_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// HTTP client for backend calls; without a timeout the reqwest default applies.
    pub fn http_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    pub fn normalize(text: &str) -> String {
        text.replace(['\r', '\n'], "")
    }

    /// Normalize the query text and reject text that looks like JSON but is not an object.
    pub fn validate(query: &SearchQuery) -> Result<SearchQuery, SearchError> {
        let text = Self::normalize(&query.query);
        if text.contains('{') {
            if let Err(e) = serde_json::from_str::<Map<String, Value>>(&text) {
                return Err(SearchError::MalformedQuery { query: text, reason: e.to_string() });
            }
        }
        Ok(SearchQuery { query: text, ..query.clone() })
    }

    /// Run a search and tell an empty answer apart from a failure.
    pub async fn execute(&self, query: &SearchQuery, ctx: &EntitlementContext) -> Result<SearchOutcome, SearchError> {
        tracing::debug!(
            elevated = ctx.has_elevated_access,
            btrs = ctx.authorized_btrs().len(),
            "executing search"
        );
        let result = self.fetch_page(query).await?;
        if result.total_count == 0 {
            return Ok(SearchOutcome::NoResults);
        }
        Ok(SearchOutcome::Found(result))
    }

    /// Total number of records matching the query.
    pub async fn count(&self, query: &SearchQuery) -> Result<i64, SearchError> {
        let (_, response) = self.post("nrecords", query).await?;
        Ok(response.results.nrecords)
    }

    /// One page of records; an empty page is not an error here.
    pub async fn fetch_page(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let (status, response) = self.post("search", query).await?;
        Ok(SearchResult {
            records: response.results.records.unwrap_or_default(),
            total_count: response.results.nrecords,
            http_status: status,
        })
    }

    async fn post(&self, endpoint: &str, query: &SearchQuery) -> Result<(u16, ServiceResponse), SearchError> {
        let query = Self::validate(query)?;
        let body = ServiceRequest { client: CLIENT_NAME, service_query: &query };

        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| SearchError::UpstreamUnavailable(format!("unable to obtain token: {}", e)))?;

        let url = format!("{}/{}", self.discovery_url, endpoint);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("POST {} failed: {}", url, e);
                SearchError::UpstreamUnavailable(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("POST {} returned {}", url, status);
            return Err(SearchError::UpstreamUnavailable(format!("discovery service returned {}", status)));
        }

        let response: ServiceResponse = resp.json().await.map_err(|e| {
            tracing::warn!("unable to decode response from {}: {}", url, e);
            SearchError::UpstreamUnavailable(format!("unable to decode response: {}", e))
        })?;

        let code = response.http_code.unwrap_or(status.as_u16());
        if !(200..300).contains(&code) {
            let reason = response.error.clone().unwrap_or_default();
            tracing::warn!("discovery service reported {} for {}: {}", code, url, reason);
            return Err(SearchError::UpstreamUnavailable(format!("discovery service reported {}: {}", code, reason)));
        }

        Ok((code, response))
    }
}
