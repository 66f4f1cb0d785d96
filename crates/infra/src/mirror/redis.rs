//! Redis-backed product mirror (optional).
//!
//! Entries are written with a TTL so the mirror never outlives the data it
//! shadows for long; the product store stays authoritative.

use std::time::Duration;

use storefront_catalog::Product;

use super::{MirrorError, ProductMirror, mirror_key, mirror_payload};

/// Writes `product:{id}` → JSON with `SET ... EX ttl`.
#[derive(Debug, Clone)]
pub struct RedisProductMirror {
    client: redis::Client,
    ttl: Duration,
}

impl RedisProductMirror {
    pub fn new(redis_url: impl AsRef<str>, ttl: Duration) -> Result<Self, MirrorError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| MirrorError::Redis(e.to_string()))?;
        Ok(Self { client, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Queue `SET product:{id} <json> EX ttl` on `pipe`.
    fn queue_set(
        &self,
        pipe: &mut redis::Pipeline,
        product: &Product,
    ) -> Result<(), MirrorError> {
        let payload = mirror_payload(product)?;
        pipe.cmd("SET")
            .arg(mirror_key(product.id))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .ignore();
        Ok(())
    }

    fn connection(&self) -> Result<redis::Connection, MirrorError> {
        self.client
            .get_connection()
            .map_err(|e| MirrorError::Redis(e.to_string()))
    }
}

impl ProductMirror for RedisProductMirror {
    fn mirror(&self, product: &Product) -> Result<(), MirrorError> {
        self.mirror_many(std::slice::from_ref(product))
    }

    /// One connection and one pipelined round-trip for the whole batch.
    fn mirror_many(&self, products: &[Product]) -> Result<(), MirrorError> {
        if products.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for product in products {
            self.queue_set(&mut pipe, product)?;
        }

        let mut conn = self.connection()?;
        pipe.query::<()>(&mut conn)
            .map_err(|e| MirrorError::Redis(e.to_string()))
    }
}
