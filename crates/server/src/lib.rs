//! Process wiring for the storefront cache layer.
//!
//! Builds the stores and both cache managers from a [`CacheConfig`]. Request
//! handlers (not part of this crate) receive a cloned [`Services`].

use std::io;
use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use storefront_catalog::ProductQuery;
use storefront_infra::store::{
    InMemoryCategoryStore, InMemoryProductStore, PostgresCategoryStore, PostgresProductStore,
};
use storefront_infra::{
    CacheConfig, CategoryCache, CategoryStore, ProductCache, ProductMirror, ProductStore,
    WorkerHandle,
};

pub type SharedCategoryCache = CategoryCache<Arc<dyn CategoryStore>>;
pub type SharedProductCache = ProductCache<Arc<dyn ProductStore>>;

/// Cache managers shared by every request handler.
#[derive(Clone)]
pub struct Services {
    pub categories: Arc<SharedCategoryCache>,
    pub products: Arc<SharedProductCache>,
}

impl Services {
    pub fn new(
        category_store: Arc<dyn CategoryStore>,
        product_store: Arc<dyn ProductStore>,
        mirror: Option<Arc<dyn ProductMirror>>,
        config: &CacheConfig,
    ) -> Self {
        let categories = CategoryCache::new(category_store, config.category_page_size);

        let mut products = ProductCache::new(product_store, config.product_cache_capacity);
        if let Some(mirror) = mirror {
            products = products.with_mirror(mirror);
        }

        Self {
            categories: Arc::new(categories),
            products: Arc::new(products),
        }
    }

    /// In-memory stores (dev/test).
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(
            Arc::new(InMemoryCategoryStore::new()),
            Arc::new(InMemoryProductStore::new()),
            None,
            config,
        )
    }

    /// Postgres-backed stores. Store calls block on `runtime`, so managers
    /// must be driven from plain threads or `spawn_blocking`.
    pub fn postgres(
        pool: PgPool,
        runtime: Handle,
        mirror: Option<Arc<dyn ProductMirror>>,
        config: &CacheConfig,
    ) -> Self {
        Self::new(
            Arc::new(PostgresCategoryStore::new(pool.clone(), runtime.clone())),
            Arc::new(PostgresProductStore::new(pool, runtime)),
            mirror,
            config,
        )
    }

    /// Warm the product cache on the blocking pool.
    ///
    /// A failure is logged; the first listing then retries the load.
    pub fn spawn_product_prewarm(&self) -> JoinHandle<()> {
        let products = self.products.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = products.list_products(&ProductQuery::default()) {
                tracing::warn!(error = %err, "product cache pre-warm failed");
            }
        })
    }

    /// Start periodic category reconciliation on its own thread.
    pub fn start_category_refresh(&self, config: &CacheConfig) -> io::Result<WorkerHandle> {
        self.categories
            .start(config.reconcile_interval, config.initial_load)
    }
}

/// Wait for an in-flight pre-warm, then stop the category refresh worker.
///
/// Blocking tasks cannot be aborted once running, so the pre-warm is awaited
/// rather than cancelled before the runtime shuts down.
pub async fn shutdown(refresh: WorkerHandle, prewarm: JoinHandle<()>) -> anyhow::Result<()> {
    if !prewarm.is_finished() {
        tracing::info!("waiting for product cache pre-warm to finish");
    }
    prewarm.await.context("product cache pre-warm panicked")?;

    tokio::task::spawn_blocking(move || refresh.shutdown())
        .await
        .context("category refresh worker panicked during shutdown")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Redis product mirror from `REDIS_URL`, when set.
#[cfg(feature = "redis")]
pub fn mirror_from_env(config: &CacheConfig) -> anyhow::Result<Option<Arc<dyn ProductMirror>>> {
    use storefront_infra::mirror::RedisProductMirror;

    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        tracing::info!("REDIS_URL not set; product mirror disabled");
        return Ok(None);
    };

    let mirror = RedisProductMirror::new(&redis_url, config.product_mirror_ttl)
        .context("failed to create redis product mirror")?;
    tracing::info!(ttl_secs = config.product_mirror_ttl.as_secs(), "product mirror enabled");
    Ok(Some(Arc::new(mirror)))
}

#[cfg(not(feature = "redis"))]
pub fn mirror_from_env(
    _config: &CacheConfig,
) -> anyhow::Result<Option<Arc<dyn ProductMirror>>> {
    if std::env::var("REDIS_URL").is_ok() {
        tracing::warn!("REDIS_URL set but redis feature not enabled; product mirror disabled");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storefront_catalog::CreateProduct;

    #[test]
    fn in_memory_services_share_managers_across_clones() {
        let config = CacheConfig::default().with_product_cache_capacity(5);
        let services = Services::in_memory(&config);
        let handler_copy = services.clone();

        let created = services
            .products
            .create_product(CreateProduct::new("Phone", "electronics", 100))
            .unwrap();
        let page = handler_copy
            .products
            .list_products(&ProductQuery::default().with_name("Phone"))
            .unwrap();

        assert_eq!(page.records, vec![created]);
        assert_eq!(handler_copy.products.capacity(), 5);
    }

    #[test]
    fn category_refresh_runs_and_shuts_down() {
        let config = CacheConfig::default()
            .with_reconcile_interval(Duration::from_millis(10))
            .with_initial_load(true);
        let services = Services::in_memory(&config);

        let handle = services.start_category_refresh(&config).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while services.categories.generation() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();

        assert!(services.categories.generation() >= 1);
        assert!(services.categories.roots().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_waits_for_prewarm_and_stops_refresh() {
        let config = CacheConfig::default().with_initial_load(false);
        let services = Services::in_memory(&config);
        for name in ["A", "B"] {
            services
                .products
                .create_product(CreateProduct::new(name, "general", 100))
                .unwrap();
        }
        assert!(!services.products.stats().warmed);

        let refresh = services.start_category_refresh(&config).unwrap();
        let prewarm = services.spawn_product_prewarm();

        shutdown(refresh, prewarm).await.unwrap();

        let stats = services.products.stats();
        assert!(stats.warmed);
        assert_eq!(stats.len, 2);
    }
}
