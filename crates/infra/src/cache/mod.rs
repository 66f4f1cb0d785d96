//! In-process caches in front of the category and product stores.
//!
//! - [`CategoryCache`]: eventually consistent snapshot of the whole category
//!   tree, rebuilt off the request path and published with one atomic swap.
//! - [`ProductCache`]: capacity-bounded write-through cache with cold-start
//!   warming and store fallback once full.

pub mod category;
pub mod product;

pub use category::{CategoryCache, CategorySnapshot, ReconcileOutcome};
pub use product::{ProductCache, ProductCacheError, ProductCacheStats};
