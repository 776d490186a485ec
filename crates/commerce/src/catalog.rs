//! Catalog cache with filtered views.
//!
//! The remote catalog is fetched once per cache lifetime (or on an explicit
//! [`CatalogCache::reload`]) and held as an in-memory snapshot; every read
//! after that is synchronous. Filtering is a pure function of the snapshot
//! plus one piece of UI-facing state: the currently selected category, which
//! toggles off when selected again and is cleared whenever the cache reloads
//! or the consuming screen loses focus.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, instrument};

use blossom_core::{CategoryId, FlowerId, Price};

use crate::api::{ApiError, ShopApi};

/// Errors that can occur while fetching the catalog.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service could not be reached or answered unusably.
    #[error("network failure")]
    Network(#[source] ApiError),

    /// The service answered with an error status.
    #[error("server error")]
    Server(#[source] ApiError),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        if err.is_transport() {
            Self::Network(err)
        } else {
            Self::Server(err)
        }
    }
}

/// One product in the catalog. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Server-assigned id; other stores refer to items only by this.
    pub id: FlowerId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Image path, relative to the service's media root.
    pub image: String,
    /// Owning category, if the item is categorized.
    pub category: Option<CategoryId>,
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Server-assigned id.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
}

/// The in-memory copy of the remote product/category list.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// All items, in catalog order.
    pub items: Vec<CatalogItem>,
    /// All categories.
    pub categories: Vec<Category>,
}

impl CatalogSnapshot {
    /// Look up an item by id.
    #[must_use]
    pub fn item(&self, id: FlowerId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    snapshot: Option<CatalogSnapshot>,
    selected: Option<CategoryId>,
}

// =============================================================================
// CatalogCache
// =============================================================================

/// Fetches and indexes the remote catalog; exposes filtered views.
///
/// Cheaply cloneable; all clones share the same snapshot.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    api: Arc<dyn ShopApi>,
    state: RwLock<CatalogState>,
}

impl CatalogCache {
    /// Create an empty cache over the given API.
    #[must_use]
    pub fn new(api: Arc<dyn ShopApi>) -> Self {
        Self {
            inner: Arc::new(CatalogCacheInner {
                api,
                state: RwLock::new(CatalogState::default()),
            }),
        }
    }

    /// Fetch the catalog if it has not been fetched yet.
    ///
    /// Subsequent calls return the cached snapshot without touching the
    /// network; use [`Self::reload`] to refetch.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the catalog cannot be fetched; the cache
    /// stays empty and a later call may succeed.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<CatalogSnapshot, FetchError> {
        if let Some(snapshot) = self.snapshot() {
            debug!("catalog already loaded");
            return Ok(snapshot);
        }

        self.fetch().await
    }

    /// Refetch the catalog and clear any active category filter.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on failure; the previous snapshot (and filter)
    /// are kept so screens stay usable.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<CatalogSnapshot, FetchError> {
        self.fetch().await
    }

    async fn fetch(&self) -> Result<CatalogSnapshot, FetchError> {
        let snapshot = self.inner.api.fetch_catalog().await?;

        let mut state = self.write_state();
        state.snapshot = Some(snapshot.clone());
        state.selected = None;
        drop(state);

        debug!(
            items = snapshot.items.len(),
            categories = snapshot.categories.len(),
            "catalog loaded"
        );
        Ok(snapshot)
    }

    /// The current snapshot, if one has been loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<CatalogSnapshot> {
        self.read_state().snapshot.clone()
    }

    /// Look up a single item by id.
    #[must_use]
    pub fn item(&self, id: FlowerId) -> Option<CatalogItem> {
        self.read_state()
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.item(id).cloned())
    }

    /// Case-insensitive substring search on item names.
    ///
    /// An empty (or all-whitespace) query returns the full catalog. Returns
    /// nothing before the first successful [`Self::load`].
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<CatalogItem> {
        let state = self.read_state();
        let Some(snapshot) = state.snapshot.as_ref() else {
            return Vec::new();
        };

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return snapshot.items.clone();
        }

        snapshot
            .items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Items in the given category; `None` returns the full catalog.
    #[must_use]
    pub fn by_category(&self, category: Option<CategoryId>) -> Vec<CatalogItem> {
        let state = self.read_state();
        let Some(snapshot) = state.snapshot.as_ref() else {
            return Vec::new();
        };

        match category {
            None => snapshot.items.clone(),
            Some(id) => snapshot
                .items
                .iter()
                .filter(|item| item.category == Some(id))
                .cloned()
                .collect(),
        }
    }

    /// Select a category, or deselect it if it is already selected.
    ///
    /// Returns the next filtered view and the next selected state, so the
    /// screen renders exactly what the store now considers selected.
    pub fn toggle_category(&self, category: CategoryId) -> (Vec<CatalogItem>, Option<CategoryId>) {
        let next = {
            let mut state = self.write_state();
            state.selected = if state.selected == Some(category) {
                None
            } else {
                Some(category)
            };
            state.selected
        };

        (self.by_category(next), next)
    }

    /// The currently selected category filter, if any.
    #[must_use]
    pub fn selected_category(&self) -> Option<CategoryId> {
        self.read_state().selected
    }

    /// Drop any active category filter.
    ///
    /// Called when the consuming screen loses focus, so returning to a
    /// catalog view starts unfiltered.
    pub fn clear_filter(&self) {
        self.write_state().selected = None;
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CatalogState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CatalogState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
