use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use storefront_catalog::{CategoryRecord, NewProduct, Product};
use storefront_core::{CategoryId, ProductId};

use super::r#trait::{CategoryStore, ProductStore, StoreError};

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// In-memory category store.
///
/// Intended for tests/dev. Pages are served in id order. A failure can be
/// injected to exercise the refresh error path.
#[derive(Debug, Default)]
pub struct InMemoryCategoryStore {
    records: RwLock<BTreeMap<CategoryId, CategoryRecord>>,
    failure: RwLock<Option<StoreError>>,
    page_fetches: AtomicUsize,
}

impl InMemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CategoryRecord>) -> Self {
        let store = Self::new();
        store.replace_all(records);
        store
    }

    pub fn upsert(&self, record: CategoryRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.id, record);
        }
    }

    pub fn remove(&self, id: CategoryId) {
        if let Ok(mut records) = self.records.write() {
            records.remove(&id);
        }
    }

    pub fn replace_all(&self, records: impl IntoIterator<Item = CategoryRecord>) {
        if let Ok(mut current) = self.records.write() {
            *current = records.into_iter().map(|r| (r.id, r)).collect();
        }
    }

    /// Make every subsequent fetch fail with `err` until [`Self::recover`].
    pub fn fail_with(&self, err: StoreError) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(err);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = None;
        }
    }

    /// Number of `fetch_page` calls served so far (including failed ones).
    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

impl CategoryStore for InMemoryCategoryStore {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<CategoryRecord>, StoreError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failure.read().map_err(|_| poisoned())?.clone() {
            return Err(err);
        }

        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.values().skip(offset).take(limit).cloned().collect())
    }
}

/// In-memory product store.
///
/// Ids are assigned sequentially from 1. Call counters let tests assert
/// which paths reached the store.
#[derive(Debug)]
pub struct InMemoryProductStore {
    rows: RwLock<BTreeMap<ProductId, Product>>,
    next_id: AtomicI64,
    failure: RwLock<Option<StoreError>>,
    latency: Option<Duration>,
    find_all_calls: AtomicUsize,
    find_page_calls: AtomicUsize,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            failure: RwLock::new(None),
            latency: None,
            find_all_calls: AtomicUsize::new(0),
            find_page_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every read by `latency` (widens race windows in tests).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert directly, bypassing any cache in front of this store.
    pub fn seed(&self, product: NewProduct) -> Result<Product, StoreError> {
        self.insert(product)
    }

    pub fn fail_with(&self, err: StoreError) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(err);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = None;
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn find_page_calls(&self) -> usize {
        self.find_page_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.failure.read().map_err(|_| poisoned())?.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductStore for InMemoryProductStore {
    fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        self.check_failure()?;

        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let id = ProductId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let product = product.with_id(id);
        rows.insert(id, product.clone());
        Ok(product)
    }

    fn find_all(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        self.check_failure()?;

        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.values().take(limit).cloned().collect())
    }

    fn find_page(
        &self,
        name: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        self.find_page_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        self.check_failure()?;

        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .filter(|p| name.is_none_or(|n| p.name == n))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self, name: Option<&str>) -> Result<u64, StoreError> {
        self.check_failure()?;

        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .filter(|p| name.is_none_or(|n| p.name == n))
            .count() as u64)
    }
}
