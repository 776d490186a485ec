//! Favorites set, persisted locally.
//!
//! The set holds item ids only; screens materialize it against the current
//! catalog snapshot. Mutations update memory synchronously and then write
//! the whole id list to the key-value store, so a failed write is repaired
//! by whichever mutation happens next.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use blossom_core::FlowerId;

use crate::catalog::{CatalogItem, CatalogSnapshot};
use crate::storage::{FAVORITES_KEY, KeyValueStore, StorageError};

/// The set of favorited item ids.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct FavoritesStore {
    inner: Arc<FavoritesStoreInner>,
}

struct FavoritesStoreInner {
    kv: Arc<dyn KeyValueStore>,
    ids: RwLock<Vec<FlowerId>>,
    changes: watch::Sender<Vec<FlowerId>>,
}

impl FavoritesStore {
    /// Create an empty store over the given key-value backend.
    ///
    /// Call [`Self::load`] afterwards to pick up the persisted set.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(FavoritesStoreInner {
                kv,
                ids: RwLock::new(Vec::new()),
                changes,
            }),
        }
    }

    /// Replace the in-memory set from the persisted list.
    ///
    /// Called once at initialization and again whenever the owning screen
    /// regains focus, to pick up changes made elsewhere in the same process.
    /// A missing key is an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails or the stored value is
    /// not a JSON id list; the in-memory set is left as it was.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<FlowerId>, StorageError> {
        let ids = match self.inner.kv.get(FAVORITES_KEY).await? {
            Some(raw) => serde_json::from_str::<Vec<FlowerId>>(&raw).map_err(|err| {
                warn!(error = %err, "persisted favorites are not a valid id list");
                StorageError::from(err)
            })?,
            None => Vec::new(),
        };

        Ok(self.replace(ids))
    }

    /// Toggle an item: remove it if present, append it otherwise.
    ///
    /// Returns whether the item is a favorite after the toggle. The
    /// in-memory set is updated even when persistence fails.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the full-snapshot write fails.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn toggle(&self, id: FlowerId) -> Result<bool, StorageError> {
        let (ids, now_favorite) = {
            let mut ids = self
                .inner
                .ids
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let now_favorite = if ids.contains(&id) {
                ids.retain(|existing| *existing != id);
                false
            } else {
                ids.push(id);
                true
            };
            (ids.clone(), now_favorite)
        };
        self.inner.changes.send_replace(ids.clone());

        debug!(favorite = now_favorite, "favorite toggled");
        self.persist_ids(&ids).await?;
        Ok(now_favorite)
    }

    /// The current id set, in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<FlowerId> {
        self.inner
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an item is currently favorited.
    #[must_use]
    pub fn is_favorite(&self, id: FlowerId) -> bool {
        self.inner
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Observe id-set snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<FlowerId>> {
        self.inner.changes.subscribe()
    }

    /// The favorited items present in `snapshot`, in catalog order.
    ///
    /// Ids with no matching catalog item are dropped from the view but stay
    /// in the persisted set (they may belong to items that failed to load).
    #[must_use]
    pub fn materialize(&self, snapshot: &CatalogSnapshot) -> Vec<CatalogItem> {
        let ids = self
            .inner
            .ids
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect()
    }

    /// Write the current set to the key-value store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if serialization or the backend fails.
    pub async fn persist(&self) -> Result<(), StorageError> {
        let ids = self.ids();
        self.persist_ids(&ids).await
    }

    async fn persist_ids(&self, ids: &[FlowerId]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(ids)?;
        if let Err(err) = self.inner.kv.set(FAVORITES_KEY, &raw).await {
            warn!(error = %err, "failed to persist favorites");
            return Err(err);
        }
        Ok(())
    }

    fn replace(&self, ids: Vec<FlowerId>) -> Vec<FlowerId> {
        {
            let mut current = self
                .inner
                .ids
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *current = ids.clone();
        }
        self.inner.changes.send_replace(ids.clone());
        ids
    }
}
