use axum::extract::{Extension, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::search::int_param;
use super::split_param;
use crate::filter::ScopeMode;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SearchQuery, SortOrder};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DatasetsParams {
    pub idx: Option<String>,
    pub limit: Option<String>,
    /// Comma separated columns to search and return
    pub attrs: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "sortKey")]
    pub sort_key: Option<String>,
    #[serde(rename = "sortDirection")]
    pub sort_direction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetsPage {
    pub total: i64,
    pub records: Vec<Value>,
    pub columns: Vec<String>,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
}

/// GET /datasets - Table view: substring search over columns, restricted to the caller's BTRs
pub async fn datasets(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(params): Query<DatasetsParams>,
) -> ApiResult<DatasetsPage> {
    let frontend = &state.config.frontend;

    let idx = int_param(params.idx.as_deref()).unwrap_or(0).max(0);
    let limit = match int_param(params.limit.as_deref()) {
        None | Some(0) => frontend.default_limit,
        Some(limit) => limit,
    };
    let mut columns = split_param(params.attrs.as_deref());
    if columns.is_empty() {
        columns = frontend.default_attributes.clone();
    }

    let search = params.search.as_deref().unwrap_or_default().trim();
    let mut spec = state.builder.build_filter_from_attributes(search, &columns);
    if state.scoping_enabled() {
        let ctx = state.entitlements(&auth_user.user).await;
        spec = state.builder.scope_filter(spec, &ctx, ScopeMode::Filter);
    }
    let query = SearchQuery::from_spec(spec);

    // Total covers entitled records only
    let total = state.orchestrator.count(&query).await?;

    let sort_keys = match params.sort_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => vec![key.to_string()],
        _ => vec![frontend.default_sort_key.clone()],
    };
    let sort_order = params.sort_direction.as_deref().map(SortOrder::parse).unwrap_or_default();
    let result = state
        .orchestrator
        .fetch_page(&query.page(idx, limit).sorted(sort_keys, sort_order))
        .await?;

    let records = result.records.iter().map(|r| project(r, &columns)).collect();
    Ok(ApiResponse::success(DatasetsPage {
        total,
        records,
        columns,
        page_size: limit,
    }))
}

/// Keep only the requested columns; missing ones come back as null.
fn project(record: &Value, columns: &[String]) -> Value {
    let mut row = Map::new();
    for column in columns {
        row.insert(column.clone(), record.get(column).cloned().unwrap_or(Value::Null));
    }
    Value::Object(row)
}
