use std::sync::Arc;

use thiserror::Error;

use storefront_catalog::{CategoryRecord, NewProduct, Product};

/// Store operation error.
///
/// These are **infrastructure errors** (connectivity, query execution, row
/// decoding) as opposed to domain errors (validation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached (pool closed, IO, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed to execute a query.
    #[error("query failed: {0}")]
    Query(String),

    /// A row could not be decoded into a domain record.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Paged read access to the authoritative category set.
pub trait CategoryStore: Send + Sync {
    /// Fetch up to `limit` records starting at `offset`, in a stable order.
    ///
    /// A page shorter than `limit` signals that the set is exhausted.
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<CategoryRecord>, StoreError>;
}

/// Authoritative product storage.
pub trait ProductStore: Send + Sync {
    /// Persist a product; the store assigns its id.
    fn insert(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// Load up to `limit` products, oldest first.
    fn find_all(&self, limit: usize) -> Result<Vec<Product>, StoreError>;

    /// Load one page of products, optionally filtered by exact name.
    fn find_page(
        &self,
        name: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError>;

    /// Count products, optionally filtered by exact name.
    fn count(&self, name: Option<&str>) -> Result<u64, StoreError>;
}

impl<S> CategoryStore for Arc<S>
where
    S: CategoryStore + ?Sized,
{
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<CategoryRecord>, StoreError> {
        (**self).fetch_page(offset, limit)
    }
}

impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        (**self).insert(product)
    }

    fn find_all(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        (**self).find_all(limit)
    }

    fn find_page(
        &self,
        name: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        (**self).find_page(name, offset, limit)
    }

    fn count(&self, name: Option<&str>) -> Result<u64, StoreError> {
        (**self).count(name)
    }
}
