pub mod types;
pub mod expression;
pub mod btrs;
pub mod scope;
pub mod error;

pub use types::*;
pub use btrs::intersect_btrs;
pub use error::FilterError;
pub use scope::{BtrScope, PassThroughScope, QuerySpecBuilder, ScopeStrategy};
