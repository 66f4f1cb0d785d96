//! Infrastructure layer: stores, caches, background workers, config.
//!
//! The two cache managers live in [`cache`]; everything else here is the
//! plumbing they depend on (store adapters, the periodic refresh worker, the
//! best-effort product mirror, and environment-driven configuration).

pub mod cache;
pub mod config;
pub mod mirror;
pub mod store;
pub mod workers;


pub use cache::{
    CategoryCache, CategorySnapshot, ProductCache, ProductCacheError, ProductCacheStats,
    ReconcileOutcome,
};
pub use config::{CacheConfig, ConfigError};
pub use mirror::{MirrorError, ProductMirror};
pub use store::{CategoryStore, ProductStore, StoreError};
pub use workers::{PeriodicWorker, WorkerHandle};
