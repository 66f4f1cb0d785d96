//! Backing-store boundary for the cache layer.
//!
//! The stores are authoritative; the caches in [`crate::cache`] only call
//! them on refresh, warm-up, or capacity fallback paths.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryCategoryStore, InMemoryProductStore};
pub use postgres::{PostgresCategoryStore, PostgresProductStore};
pub use r#trait::{CategoryStore, ProductStore, StoreError};
