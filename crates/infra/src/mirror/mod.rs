//! Best-effort mirroring of cached products to an external key/value store.
//!
//! Mirror failures never abort the primary cache operation; the product
//! cache logs them and moves on.

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisProductMirror;

use thiserror::Error;

use storefront_catalog::Product;
use storefront_core::ProductId;

/// Key prefix for mirrored product entries.
pub const PRODUCT_MIRROR_PREFIX: &str = "product:";

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Sink receiving a copy of every product the cache learns about.
pub trait ProductMirror: Send + Sync {
    fn mirror(&self, product: &Product) -> Result<(), MirrorError>;

    /// Mirror a batch; every product is attempted and the last error is returned.
    ///
    /// Implementations with a round-trip per call should override this.
    fn mirror_many(&self, products: &[Product]) -> Result<(), MirrorError> {
        let mut last_err = None;
        for product in products {
            if let Err(err) = self.mirror(product) {
                last_err = Some(err);
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

/// Key under which a product is mirrored: `product:{id}`.
pub fn mirror_key(id: ProductId) -> String {
    format!("{PRODUCT_MIRROR_PREFIX}{id}")
}

/// JSON payload stored for a mirrored product.
pub fn mirror_payload(product: &Product) -> Result<String, MirrorError> {
    serde_json::to_string(product).map_err(|e| MirrorError::Serialize(e.to_string()))
}
