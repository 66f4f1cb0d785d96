use anyhow::Context;
use sqlx::PgPool;
use tokio::runtime::Handle;

use storefront_infra::CacheConfig;
use storefront_server::{Services, mirror_from_env, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init();

    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let mirror = mirror_from_env(&config)?;
    let services = Services::postgres(pool, Handle::current(), mirror, &config);

    let refresh = services
        .start_category_refresh(&config)
        .context("failed to start category refresh worker")?;

    let prewarm = services.spawn_product_prewarm();

    tracing::info!(
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        product_cache_capacity = config.product_cache_capacity,
        "storefront cache services started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutdown requested");
    shutdown(refresh, prewarm).await
}
