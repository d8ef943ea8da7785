use axum::extract::{Extension, Form, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::filter::{Clause, FilterExpression, ScopeMode};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{SearchOutcome, SearchQuery};
use crate::state::AppState;

/// Dataset identifier field.
const DID_FIELD: &str = "did";

#[derive(Debug, Default, Deserialize)]
pub struct RecordParams {
    pub did: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub did: String,
    pub spec: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /record?did=... - One dataset record, visible only within the caller's BTRs
pub async fn record_get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(params): Query<RecordParams>,
) -> ApiResult<RecordPage> {
    record(&state, &auth_user, params).await
}

/// POST /record - Same as GET, with a form-encoded `did`
pub async fn record_post(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Form(params): Form<RecordParams>,
) -> ApiResult<RecordPage> {
    record(&state, &auth_user, params).await
}

async fn record(state: &AppState, auth_user: &AuthUser, params: RecordParams) -> ApiResult<RecordPage> {
    let did = params.did.as_deref().unwrap_or_default().trim().to_string();
    if did.is_empty() {
        return Err(ApiError::bad_request("Missing did parameter"));
    }

    let ctx = state.entitlements(&auth_user.user).await;
    let mut spec = FilterExpression::from(Clause::equals(DID_FIELD, did.as_str()));
    if state.scoping_enabled() {
        if !ctx.has_elevated_access && ctx.authorized_btrs().is_empty() {
            tracing::warn!("User '{}' has no BTRs, record access denied", auth_user.user);
            return Err(ApiError::forbidden(format!(
                "User {} is not associated with any BTR, access to records is denied",
                auth_user.user
            )));
        }
        spec = state.builder.scope_filter(spec, &ctx, ScopeMode::Search);
    }

    let query = SearchQuery::from_spec(spec).page(0, 1);
    let spec = query.spec.to_value();
    let page = match state.orchestrator.execute(&query, &ctx).await? {
        SearchOutcome::NoResults => RecordPage {
            did,
            spec,
            record: None,
            message: Some("No record found for this did".to_string()),
        },
        SearchOutcome::Found(result) => RecordPage {
            did,
            spec,
            record: result.records.into_iter().next(),
            message: None,
        },
    };
    Ok(ApiResponse::success(page))
}
