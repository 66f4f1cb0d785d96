//! Cache layer configuration (environment-driven).

use std::time::Duration;

use thiserror::Error;

pub const ENV_RECONCILE_INTERVAL_SECS: &str = "CATEGORY_RECONCILE_INTERVAL_SECS";
pub const ENV_CATEGORY_PAGE_SIZE: &str = "CATEGORY_PAGE_SIZE";
pub const ENV_CATEGORY_INITIAL_LOAD: &str = "CATEGORY_INITIAL_LOAD";
pub const ENV_PRODUCT_CACHE_CAPACITY: &str = "PRODUCT_CACHE_CAPACITY";
pub const ENV_PRODUCT_MIRROR_TTL_SECS: &str = "PRODUCT_MIRROR_TTL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} must be at least {min}")]
    OutOfRange { key: &'static str, min: u64 },
}

/// Settings for both cache managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Delay between category reconciliation passes.
    pub reconcile_interval: Duration,
    /// Page size used when reading the full category set.
    pub category_page_size: usize,
    /// Run one reconciliation as soon as the refresh worker starts.
    pub initial_load: bool,
    /// Maximum number of products held by the product cache.
    pub product_cache_capacity: usize,
    /// TTL for mirrored product entries.
    pub product_mirror_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
            category_page_size: 1000,
            initial_load: true,
            product_cache_capacity: 1000,
            product_mirror_ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Read overrides from the process environment; unset keys keep defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_u64(&lookup, ENV_RECONCILE_INTERVAL_SECS)? {
            config.reconcile_interval =
                Duration::from_secs(at_least(ENV_RECONCILE_INTERVAL_SECS, secs, 1)?);
        }
        if let Some(size) = parse_u64(&lookup, ENV_CATEGORY_PAGE_SIZE)? {
            config.category_page_size = at_least(ENV_CATEGORY_PAGE_SIZE, size, 1)? as usize;
        }
        if let Some(raw) = lookup(ENV_CATEGORY_INITIAL_LOAD) {
            config.initial_load = parse_bool(ENV_CATEGORY_INITIAL_LOAD, &raw)?;
        }
        if let Some(capacity) = parse_u64(&lookup, ENV_PRODUCT_CACHE_CAPACITY)? {
            config.product_cache_capacity =
                at_least(ENV_PRODUCT_CACHE_CAPACITY, capacity, 1)? as usize;
        }
        if let Some(secs) = parse_u64(&lookup, ENV_PRODUCT_MIRROR_TTL_SECS)? {
            config.product_mirror_ttl =
                Duration::from_secs(at_least(ENV_PRODUCT_MIRROR_TTL_SECS, secs, 1)?);
        }

        Ok(config)
    }

    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    pub fn with_category_page_size(mut self, size: usize) -> Self {
        self.category_page_size = size;
        self
    }

    pub fn with_initial_load(mut self, initial_load: bool) -> Self {
        self.initial_load = initial_load;
        self
    }

    pub fn with_product_cache_capacity(mut self, capacity: usize) -> Self {
        self.product_cache_capacity = capacity;
        self
    }

    pub fn with_product_mirror_ttl(mut self, ttl: Duration) -> Self {
        self.product_mirror_ttl = ttl;
        self
    }

    /// Check values set through the `with_*` builders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval.is_zero() {
            return Err(ConfigError::OutOfRange { key: ENV_RECONCILE_INTERVAL_SECS, min: 1 });
        }
        if self.category_page_size == 0 {
            return Err(ConfigError::OutOfRange { key: ENV_CATEGORY_PAGE_SIZE, min: 1 });
        }
        if self.product_cache_capacity == 0 {
            return Err(ConfigError::OutOfRange { key: ENV_PRODUCT_CACHE_CAPACITY, min: 1 });
        }
        if self.product_mirror_ttl.as_secs() == 0 {
            return Err(ConfigError::OutOfRange { key: ENV_PRODUCT_MIRROR_TTL_SECS, min: 1 });
        }
        Ok(())
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn at_least(key: &'static str, value: u64, min: u64) -> Result<u64, ConfigError> {
    if value < min {
        return Err(ConfigError::OutOfRange { key, min });
    }
    Ok(value)
}
