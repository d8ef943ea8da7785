pub mod pagination;

pub use pagination::{build_url, nav_target, window, NavKind, PageWindow};
