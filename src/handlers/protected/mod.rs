// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every handler here receives `AuthUser` from `jwt_auth_middleware` and resolves
// the user's entitlements before a query reaches the discovery service.

pub mod datasets;
pub mod record;
pub mod search;

pub use datasets::datasets;
pub use record::{record_get, record_post};
pub use search::{search_get, search_post};

/// Comma separated list parameter; blank entries are dropped.
pub(crate) fn split_param(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
