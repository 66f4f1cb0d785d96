use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use storefront_catalog::{CreateProduct, Page, Product, ProductQuery};
use storefront_core::{DomainError, ProductId};

use crate::mirror::ProductMirror;
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Error)]
pub enum ProductCacheError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Point-in-time counters for a [`ProductCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductCacheStats {
    pub len: usize,
    pub capacity: usize,
    pub warmed: bool,
    /// Listings answered from the cache.
    pub hits: u64,
    /// Listings routed to the store because the cache was full.
    pub bypasses: u64,
    pub warm_loads: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    /// Insertion order doubles as eviction order (front = oldest).
    entries: IndexMap<ProductId, Product>,
    warmed: bool,
}

impl CacheState {
    /// Insert keeping `entries.len() <= capacity`; returns the evicted id.
    ///
    /// Re-inserting a cached id replaces the value in place.
    fn insert_bounded(&mut self, product: Product, capacity: usize) -> Option<ProductId> {
        if let Some(existing) = self.entries.get_mut(&product.id) {
            *existing = product;
            return None;
        }

        let evicted = if self.entries.len() >= capacity {
            self.entries.shift_remove_index(0).map(|(id, _)| id)
        } else {
            None
        };
        self.entries.insert(product.id, product);
        evicted
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    bypasses: AtomicU64,
    warm_loads: AtomicU64,
    evictions: AtomicU64,
}

/// Capacity-bounded, write-through product cache.
///
/// ## Writes
///
/// `create_product` persists through the store first and only caches the
/// stored row (with its assigned id). When full, the least recently inserted
/// entry is evicted to make room.
///
/// ## Reads
///
/// The first listing warms the cache with at most `capacity` products from
/// the store. Concurrent cold callers share that single load. While the cache
/// holds fewer than `capacity` entries, listings are filtered and sliced in
/// memory; once it is full they go to the store.
pub struct ProductCache<S> {
    store: S,
    capacity: usize,
    state: Mutex<CacheState>,
    warm_gate: Mutex<()>,
    mirror: Option<Arc<dyn ProductMirror>>,
    counters: Counters,
}

impl<S: ProductStore> ProductCache<S> {
    /// `capacity` below 1 is treated as 1.
    pub fn new(store: S, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
            warm_gate: Mutex::new(()),
            mirror: None,
            counters: Counters::default(),
        }
    }

    /// Copy every product the cache learns about to `mirror`.
    pub fn with_mirror(mut self, mirror: Arc<dyn ProductMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.lock_state().entries.contains_key(&id)
    }

    /// Cached ids, oldest first.
    pub fn cached_ids(&self) -> Vec<ProductId> {
        self.lock_state().entries.keys().copied().collect()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> ProductCacheStats {
        let (len, warmed) = {
            let state = self.lock_state();
            (state.entries.len(), state.warmed)
        };

        ProductCacheStats {
            len,
            capacity: self.capacity,
            warmed,
            hits: self.counters.hits.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            warm_loads: self.counters.warm_loads.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Validate, persist, then cache the stored product.
    #[instrument(skip(self, command), fields(name = %command.name))]
    pub fn create_product(&self, command: CreateProduct) -> Result<Product, ProductCacheError> {
        let new_product = command.into_new_product(Utc::now())?;
        let product = self.store.insert(new_product)?;

        let evicted = self.lock_state().insert_bounded(product.clone(), self.capacity);
        if let Some(evicted) = evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(product_id = %evicted, "evicted least recently inserted product");
        }

        self.mirror_all(std::slice::from_ref(&product));
        Ok(product)
    }

    /// One page of products, filtered by exact name when the query has one.
    #[instrument(
        skip(self, query),
        fields(page_num = query.page_num(), page_size = query.page_size(), name = ?query.name())
    )]
    pub fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, ProductCacheError> {
        self.ensure_warm()?;

        {
            let state = self.lock_state();
            if state.entries.len() < self.capacity {
                let matching: Vec<&Product> = state
                    .entries
                    .values()
                    .filter(|p| query.matches_name(&p.name))
                    .collect();
                let page = Page::paginate(query, matching);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);

                return Ok(Page::new(
                    query,
                    page.records.into_iter().cloned().collect(),
                    page.total,
                ));
            }
        }

        debug!(capacity = self.capacity, "product cache full; listing from store");
        self.counters.bypasses.fetch_add(1, Ordering::Relaxed);

        let records = self
            .store
            .find_page(query.name(), query.offset(), query.limit())?;
        let total = self.store.count(query.name())?;

        self.mirror_all(&records);
        Ok(Page::new(query, records, total))
    }

    /// Load up to `capacity` products into a cold cache exactly once.
    ///
    /// A failed load leaves the cache cold so a later call retries. The
    /// loaded products are mirrored after the gate is released.
    fn ensure_warm(&self) -> Result<(), StoreError> {
        if self.lock_state().warmed {
            return Ok(());
        }

        let loaded = {
            let _gate = self
                .warm_gate
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            // Another caller may have finished warming while we waited on the gate.
            if self.lock_state().warmed {
                return Ok(());
            }

            let loaded = self.store.find_all(self.capacity)?;
            self.install_warm_load(&loaded);
            loaded
        };

        self.mirror_all(&loaded);
        Ok(())
    }

    /// Merge a warm-up load with products created while it ran, oldest first.
    fn install_warm_load(&self, loaded: &[Product]) {
        let evicted = {
            let mut state = self.lock_state();
            let created_meanwhile = std::mem::take(&mut state.entries);

            let mut evicted = 0u64;
            for product in loaded.iter().cloned().chain(created_meanwhile.into_values()) {
                if state.insert_bounded(product, self.capacity).is_some() {
                    evicted += 1;
                }
            }
            state.warmed = true;
            evicted
        };

        self.counters.warm_loads.fetch_add(1, Ordering::Relaxed);
        self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
        info!(
            loaded = loaded.len(),
            capacity = self.capacity,
            "product cache warmed from store"
        );
    }

    fn mirror_all(&self, products: &[Product]) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        if products.is_empty() {
            return;
        }

        if let Err(err) = mirror.mirror_many(products) {
            warn!(products = products.len(), error = %err, "failed to mirror products");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // Every critical section leaves `CacheState` consistent before it can panic.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorError;
    use crate::store::InMemoryProductStore;
    use std::sync::atomic::AtomicUsize;

    fn create(name: &str) -> CreateProduct {
        CreateProduct::new(name, "general", 100)
    }

    fn names(page: &Page<Product>) -> Vec<&str> {
        page.records.iter().map(|p| p.name.as_str()).collect()
    }

    #[derive(Default)]
    struct RecordingMirror {
        mirrored: Mutex<Vec<ProductId>>,
    }

    impl ProductMirror for RecordingMirror {
        fn mirror(&self, product: &Product) -> Result<(), MirrorError> {
            self.mirrored.lock().unwrap().push(product.id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingMirror {
        attempts: AtomicUsize,
    }

    impl ProductMirror for FailingMirror {
        fn mirror(&self, _product: &Product) -> Result<(), MirrorError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(MirrorError::Redis("connection refused".to_string()))
        }
    }

    #[test]
    fn evicts_least_recently_inserted_when_full() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 2);

        let a = cache.create_product(create("A")).unwrap();
        let b = cache.create_product(create("B")).unwrap();
        let c = cache.create_product(create("C")).unwrap();

        assert!(cache.len() <= 2);
        assert!(!cache.contains(a.id));
        assert_eq!(cache.cached_ids(), vec![b.id, c.id]);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.store().len(), 3);
    }

    #[test]
    fn created_product_is_listed_by_exact_name() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);
        let created = cache.create_product(create("Phone")).unwrap();
        cache.create_product(create("phone")).unwrap();

        let query = ProductQuery::default().with_name("Phone");
        let page = cache.list_products(&query).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.records, vec![created]);
        assert_eq!(cache.store().find_page_calls(), 0);
    }

    #[test]
    fn cache_assigns_timestamps_and_store_assigns_id() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);
        let product = cache.create_product(create("Phone")).unwrap();

        assert_eq!(product.id, ProductId::new(1));
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn cold_cache_loads_from_store_once() {
        let store = InMemoryProductStore::new();
        for name in ["A", "B", "C"] {
            store.seed(create(name).into_new_product(Utc::now()).unwrap()).unwrap();
        }
        let cache = ProductCache::new(store, 10);

        let first = cache.list_products(&ProductQuery::default()).unwrap();
        let second = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(names(&first), vec!["A", "B", "C"]);
        assert_eq!(first, second);
        assert_eq!(cache.store().find_all_calls(), 1);
        assert_eq!(cache.stats().warm_loads, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn creates_before_first_listing_do_not_skip_warm_up() {
        let store = InMemoryProductStore::new();
        store.seed(create("Seeded").into_new_product(Utc::now()).unwrap()).unwrap();
        let cache = ProductCache::new(store, 10);

        cache.create_product(create("Fresh")).unwrap();
        let page = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(names(&page), vec!["Seeded", "Fresh"]);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn full_cache_lists_from_store() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 2);
        for name in ["A", "B", "A", "C"] {
            cache.create_product(create(name)).unwrap();
        }

        let query = ProductQuery::new(1, 10, Some("A".to_string())).unwrap();
        let page = cache.list_products(&query).unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(names(&page), vec!["A", "A"]);
        assert_eq!(cache.store().find_page_calls(), 1);
        assert_eq!(cache.stats().bypasses, 1);
    }

    #[test]
    fn offset_past_end_is_empty_not_error() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);
        cache.create_product(create("A")).unwrap();

        let page = cache.list_products(&ProductQuery::new(3, 5, None).unwrap()).unwrap();

        assert!(page.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.page_num, 3);
    }

    #[test]
    fn invalid_request_never_reaches_store() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);

        let err = cache.create_product(CreateProduct::new("", "general", 100)).unwrap_err();

        assert!(matches!(err, ProductCacheError::Validation(DomainError::Validation(_))));
        assert!(cache.store().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn store_failure_on_create_leaves_cache_untouched() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);
        cache.store().fail_with(StoreError::Unavailable("down".to_string()));

        let err = cache.create_product(create("A")).unwrap_err();

        assert!(matches!(err, ProductCacheError::Store(StoreError::Unavailable(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_warm_up_is_retried() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 10);
        cache.store().seed(create("A").into_new_product(Utc::now()).unwrap()).unwrap();
        cache.store().fail_with(StoreError::Query("timeout".to_string()));

        assert!(cache.list_products(&ProductQuery::default()).is_err());
        assert!(!cache.stats().warmed);

        cache.store().recover();
        let page = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(names(&page), vec!["A"]);
        assert!(cache.stats().warmed);
        assert_eq!(cache.store().find_all_calls(), 2);
    }

    #[test]
    fn warm_up_is_bounded_by_capacity() {
        let store = InMemoryProductStore::new();
        for idx in 0..5 {
            store
                .seed(create(&format!("P{idx}")).into_new_product(Utc::now()).unwrap())
                .unwrap();
        }
        let cache = ProductCache::new(store, 3);

        let page = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(cache.len(), 3);
        // Full after warm-up, so the listing itself came from the store.
        assert_eq!(page.total, 5);
        assert_eq!(cache.stats().bypasses, 1);
    }

    #[test]
    fn mirrors_created_and_loaded_products() {
        let mirror = Arc::new(RecordingMirror::default());
        let store = InMemoryProductStore::new();
        store.seed(create("A").into_new_product(Utc::now()).unwrap()).unwrap();
        let cache = ProductCache::new(store, 10).with_mirror(mirror.clone());

        cache.list_products(&ProductQuery::default()).unwrap();
        let created = cache.create_product(create("B")).unwrap();

        let mirrored = mirror.mirrored.lock().unwrap().clone();
        assert_eq!(mirrored, vec![ProductId::new(1), created.id]);
    }

    #[test]
    fn mirror_failure_does_not_fail_create() {
        let mirror = Arc::new(FailingMirror::default());
        let cache = ProductCache::new(InMemoryProductStore::new(), 10).with_mirror(mirror.clone());

        let product = cache.create_product(create("A")).unwrap();

        assert!(cache.contains(product.id));
        assert_eq!(mirror.attempts.load(Ordering::SeqCst), 1);
    }

    fn seeded_store(names: &[&str]) -> InMemoryProductStore {
        let store = InMemoryProductStore::new();
        for name in names {
            store.seed(create(name).into_new_product(Utc::now()).unwrap()).unwrap();
        }
        store
    }

    #[test]
    fn mirror_failure_does_not_fail_cold_listing() {
        let mirror = Arc::new(FailingMirror::default());
        let cache =
            ProductCache::new(seeded_store(&["A", "B", "C"]), 10).with_mirror(mirror.clone());

        let page = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(names(&page), vec!["A", "B", "C"]);
        assert!(cache.stats().warmed);
        assert_eq!(mirror.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn mirror_failure_does_not_fail_store_listing() {
        let mirror = Arc::new(FailingMirror::default());
        let cache =
            ProductCache::new(seeded_store(&["A", "B", "C"]), 2).with_mirror(mirror.clone());

        let page = cache.list_products(&ProductQuery::default()).unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(names(&page), vec!["A", "B", "C"]);
        assert_eq!(cache.stats().bypasses, 1);
        // Two warm-loaded products, then the three listed from the store.
        assert_eq!(mirror.attempts.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn stats_serialize_as_flat_json() {
        let cache = ProductCache::new(InMemoryProductStore::new(), 4);
        cache.create_product(create("A")).unwrap();

        let json = serde_json::to_value(cache.stats()).unwrap();
        assert_eq!(json["len"], 1);
        assert_eq!(json["capacity"], 4);
        assert_eq!(json["warmed"], false);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 100,
                ..ProptestConfig::default()
            })]

            /// Property: size <= capacity and the cache holds the newest ids in order.
            #[test]
            fn cache_keeps_most_recent_within_capacity(
                capacity in 1usize..8,
                count in 0usize..30,
            ) {
                let cache = ProductCache::new(InMemoryProductStore::new(), capacity);
                let mut created = Vec::new();
                for idx in 0..count {
                    created.push(cache.create_product(create(&format!("P{idx}"))).unwrap().id);
                }

                prop_assert!(cache.len() <= capacity);
                let expected: Vec<ProductId> =
                    created[count.saturating_sub(capacity)..].to_vec();
                prop_assert_eq!(cache.cached_ids(), expected);
            }
        }
    }
}
