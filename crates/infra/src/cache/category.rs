use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use storefront_catalog::{Category, CategoryRecord, ROOT_CATEGORY_PARENT_ID};
use storefront_core::CategoryId;

use crate::store::{CategoryStore, StoreError};
use crate::workers::{PeriodicWorker, WorkerHandle};

/// Immutable view of the category tree as of one reconciliation.
///
/// `children` sets and the root list are derived from the same fetch as the
/// nodes themselves, so a snapshot is always internally consistent.
#[derive(Debug, Default)]
pub struct CategorySnapshot {
    categories: HashMap<CategoryId, Arc<Category>>,
    /// Root ids in display order (weight, then id).
    roots: Vec<CategoryId>,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl CategorySnapshot {
    /// Snapshot published before the first successful reconciliation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a complete fetch.
    ///
    /// Duplicate ids keep the last record seen.
    pub fn build(records: Vec<CategoryRecord>, generation: u64, loaded_at: DateTime<Utc>) -> Self {
        let mut by_id: HashMap<CategoryId, CategoryRecord> = HashMap::with_capacity(records.len());
        for record in records {
            by_id.insert(record.id, record);
        }

        let mut children: HashMap<CategoryId, BTreeSet<CategoryId>> = HashMap::new();
        for record in by_id.values() {
            children.entry(record.parent_id).or_default().insert(record.id);
        }

        let categories: HashMap<CategoryId, Arc<Category>> = by_id
            .into_iter()
            .map(|(id, record)| {
                let kids = children.remove(&id).unwrap_or_default();
                (id, Arc::new(Category::from_record(record, kids)))
            })
            .collect();

        let mut roots: Vec<&Arc<Category>> = categories.values().filter(|c| c.is_root()).collect();
        roots.sort_by_key(|c| c.display_order());
        let roots = roots.into_iter().map(|c| c.id).collect();

        Self {
            categories,
            roots,
            generation,
            loaded_at: Some(loaded_at),
        }
    }

    pub fn get(&self, id: CategoryId) -> Option<&Arc<Category>> {
        self.categories.get(&id)
    }

    pub fn is_root(&self, id: CategoryId) -> bool {
        self.categories.get(&id).is_some_and(|c| c.is_root())
    }

    pub fn root_ids(&self) -> &[CategoryId] {
        &self.roots
    }

    pub fn roots(&self) -> Vec<Arc<Category>> {
        self.roots
            .iter()
            .filter_map(|id| self.categories.get(id).cloned())
            .collect()
    }

    /// Resolved children of `id` in display order (empty for unknown ids).
    pub fn children(&self, id: CategoryId) -> Vec<Arc<Category>> {
        let Some(parent) = self.categories.get(&id) else {
            return Vec::new();
        };

        let mut kids: Vec<Arc<Category>> = parent
            .children
            .iter()
            .filter_map(|child| self.categories.get(child).cloned())
            .collect();
        kids.sort_by_key(|c| c.display_order());
        kids
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// 0 until the first successful reconciliation, then +1 per publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new snapshot was published.
    Committed {
        generation: u64,
        categories: usize,
        roots: usize,
        pages: usize,
    },
    /// Another reconciliation was already running; nothing was done.
    Skipped,
    /// The fetch failed; the previous snapshot is still published.
    Failed(StoreError),
}

impl ReconcileOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReconcileOutcome::Committed { .. })
    }
}

/// Category cache kept in sync with a [`CategoryStore`] by full refreshes.
///
/// ## Reads
///
/// `get`, `is_root`, `roots` and `children` load the current snapshot pointer
/// and never touch the store or wait on a refresh in progress.
///
/// ## Refresh
///
/// `reconcile` reads the whole category set page by page, builds a fresh
/// [`CategorySnapshot`] and swaps it in. Concurrent calls are skipped rather
/// than queued. A failed refresh leaves the published snapshot untouched.
pub struct CategoryCache<S> {
    store: S,
    page_size: usize,
    snapshot: ArcSwap<CategorySnapshot>,
    reconciling: Mutex<()>,
}

impl<S: CategoryStore> CategoryCache<S> {
    /// `page_size` below 1 is treated as 1.
    pub fn new(store: S, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            snapshot: ArcSwap::from_pointee(CategorySnapshot::empty()),
            reconciling: Mutex::new(()),
        }
    }

    /// The currently published snapshot, for several consistent reads.
    pub fn snapshot(&self) -> Arc<CategorySnapshot> {
        self.snapshot.load_full()
    }

    pub fn get(&self, id: CategoryId) -> Option<Arc<Category>> {
        self.snapshot.load().get(id).cloned()
    }

    pub fn is_root(&self, id: CategoryId) -> bool {
        self.snapshot.load().is_root(id)
    }

    pub fn roots(&self) -> Vec<Arc<Category>> {
        self.snapshot.load().roots()
    }

    pub fn children(&self, id: CategoryId) -> Vec<Arc<Category>> {
        self.snapshot.load().children(id)
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.load().generation()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one refresh pass unless another one is already in progress.
    pub fn reconcile(&self) -> ReconcileOutcome {
        let _guard = match self.reconciling.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!("category reconciliation already running; skipping trigger");
                return ReconcileOutcome::Skipped;
            }
            // The guarded value is `()`; a panic in a previous pass leaves nothing to repair.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let started = Instant::now();
        info!("category reconciliation started");

        let (records, pages) = match self.fetch_all() {
            Ok(fetched) => fetched,
            Err(err) => {
                error!(
                    error = %err,
                    generation = self.generation(),
                    "category reconciliation failed; keeping previous snapshot"
                );
                return ReconcileOutcome::Failed(err);
            }
        };

        let generation = self.generation() + 1;
        let next = CategorySnapshot::build(records, generation, Utc::now());
        let categories = next.len();
        let roots = next.root_ids().len();

        self.snapshot.store(Arc::new(next));

        info!(
            generation,
            categories,
            roots,
            pages,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "category snapshot published"
        );

        ReconcileOutcome::Committed {
            generation,
            categories,
            roots,
            pages,
        }
    }

    /// Page through the store until a short page signals the end.
    fn fetch_all(&self) -> Result<(Vec<CategoryRecord>, usize), StoreError> {
        let mut records = Vec::new();
        let mut offset = 0;
        let mut pages = 0;

        loop {
            let page = self.store.fetch_page(offset, self.page_size)?;
            pages += 1;

            let fetched = page.len();
            for record in page {
                if record.id == ROOT_CATEGORY_PARENT_ID {
                    return Err(StoreError::Malformed(format!(
                        "category '{}' uses the reserved root id {}",
                        record.name, ROOT_CATEGORY_PARENT_ID
                    )));
                }
                records.push(record);
            }

            if fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        if records.is_empty() {
            warn!("category store returned no categories");
        }

        Ok((records, pages))
    }
}

impl<S: CategoryStore + 'static> CategoryCache<S> {
    /// Start the periodic refresh worker.
    ///
    /// With `initial_load`, the first pass runs right away on the worker
    /// thread, so startup does not wait for it. The returned handle stops
    /// the schedule when shut down or dropped.
    pub fn start(
        self: &Arc<Self>,
        interval: Duration,
        initial_load: bool,
    ) -> io::Result<WorkerHandle> {
        let cache = Arc::clone(self);
        PeriodicWorker::spawn("category-refresh", interval, initial_load, move || {
            cache.reconcile();
        })
    }
}
