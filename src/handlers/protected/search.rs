use axum::extract::{Extension, Form, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::PageWindow;
use crate::error::ApiError;
use crate::filter::{FilterExpression, ScopeMode};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SearchOrchestrator, SearchOutcome, SearchQuery, SortOrder};
use crate::state::AppState;

/// Type names users copy from the schema page instead of a value.
const SCHEMA_PLACEHOLDERS: [&str; 6] = ["STRING", "INT", "INTEGER", "FLOAT", "LIST", "BOOL"];

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub idx: Option<String>,
    pub limit: Option<String>,
    pub sort_keys: Option<String>,
    pub sort_order: Option<String>,
    /// `fix=true` sends the query back unexecuted for editing
    pub fix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub query: String,
    /// Query as sent to the discovery service, after scoping
    pub spec: Value,
    pub records: Vec<Value>,
    pub total: i64,
    pub sort_keys: Vec<String>,
    pub sort_order: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /search - Run a discovery query scoped to the caller's BTRs
pub async fn search_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchPage> {
    search(&state, &auth_user, params).await
}

/// POST /search - Same as GET, with form-encoded parameters
pub async fn search_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(params): Form<SearchParams>,
) -> ApiResult<SearchPage> {
    search(&state, &auth_user, params).await
}

async fn search(state: &AppState, auth_user: &AuthUser, params: SearchParams) -> ApiResult<SearchPage> {
    let frontend = &state.config.frontend;

    let mut text = SearchOrchestrator::normalize(params.query.as_deref().unwrap_or_default());
    if text.trim().is_empty() {
        text = "{}".to_string();
    }

    if params.fix.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return Err(ApiError::malformed_query("Please fix your query", text));
    }
    if let Some(placeholder) = find_placeholder(&text) {
        return Err(ApiError::malformed_query(
            format!("Query contains the type placeholder {placeholder}, replace it with an actual value"),
            text,
        ));
    }

    let idx = int_param(params.idx.as_deref()).unwrap_or(0).max(0);
    let limit = match int_param(params.limit.as_deref()) {
        None | Some(0) => frontend.default_limit,
        Some(limit) => limit,
    };
    let sort_keys = sort_keys(params.sort_keys.as_deref(), &frontend.default_sort_key);
    let sort_order = params.sort_order.as_deref().map(SortOrder::parse).unwrap_or_default();

    let ctx = state.entitlements(&auth_user.user).await;
    let query = if state.scoping_enabled() {
        if !ctx.has_elevated_access && ctx.authorized_btrs().is_empty() {
            tracing::warn!("User '{}' has no BTRs, search denied", auth_user.user);
            return Err(ApiError::forbidden(format!(
                "User {} is not associated with any BTR, access to records is denied",
                auth_user.user
            )));
        }
        let spec = FilterExpression::parse(&text).map_err(|e| {
            ApiError::malformed_query(format!("Given query is not valid JSON, error: {}", e), text.clone())
        })?;
        SearchQuery::from_spec(state.builder.scope_filter(spec, &ctx, ScopeMode::Search))
    } else {
        SearchQuery::new(text.as_str())
    };
    let spec = query.spec.to_value();
    let query = query.page(idx, limit).sorted(sort_keys.clone(), sort_order);

    let outcome = state.orchestrator.execute(&query, &ctx).await?;
    let mut page = SearchPage {
        query: text,
        spec,
        records: Vec::new(),
        total: 0,
        sort_keys,
        sort_order: sort_order.as_str(),
        page: None,
        message: None,
    };

    match outcome {
        SearchOutcome::NoResults => {
            page.message = Some("No records found for your query".to_string());
        }
        SearchOutcome::Found(result) => {
            let base = format!(
                "/search?query={}&sort_keys={}&sort_order={}",
                encode(&page.query),
                encode(&page.sort_keys.join(",")),
                sort_order.as_str()
            );
            page.page = Some(PageWindow::new(&base, result.total_count, idx, limit));
            page.total = result.total_count;
            page.records = result.records;
        }
    }

    Ok(ApiResponse::success(page))
}

fn find_placeholder(text: &str) -> Option<&'static str> {
    SCHEMA_PLACEHOLDERS.iter().copied().find(|p| text.contains(p))
}

/// Lenient integer parameter: blank or garbage counts as absent.
pub(crate) fn int_param(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Sort keys from a comma list; the web form appends the direction to the key name.
fn sort_keys(value: Option<&str>, default_key: &str) -> Vec<String> {
    let keys: Vec<String> = super::split_param(value)
        .into_iter()
        .map(|key| {
            key.trim_end_matches("-ascending")
                .trim_end_matches("-descending")
                .to_string()
        })
        .filter(|key| !key.is_empty())
        .collect();
    if keys.is_empty() {
        vec![default_key.to_string()]
    } else {
        keys
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
