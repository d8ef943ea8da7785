pub mod entitlement_service;
pub mod search_service;

pub use entitlement_service::{
    EntitlementError, EntitlementPolicy, EntitlementResolver, HttpEntitlementResolver, StaticEntitlementResolver,
    UserEntitlements,
};
pub use search_service::{SearchError, SearchOrchestrator, SearchOutcome, SearchQuery, SearchResult, SortOrder};
