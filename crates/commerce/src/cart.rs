//! Shopping cart with locally persisted lines.
//!
//! The cart holds at most one line per item, with name, price, and image
//! snapshotted from the catalog at add-time so the cart displays correctly
//! even if the catalog later changes or is unavailable. Every mutation
//! updates memory synchronously first (readers never see a stale cart) and
//! then writes the full line list to the key-value store; a failed write is
//! repaired by the next mutation's full-snapshot write.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use blossom_core::{FlowerId, Price};

use crate::catalog::CatalogSnapshot;
use crate::storage::{CART_KEY, KeyValueStore, StorageError};

/// Errors that can occur while mutating the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The item id is absent from the catalog snapshot; nothing was added.
    #[error("item not found in catalog")]
    ItemNotFound,

    /// The in-memory mutation succeeded but the persistence write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One product's quantity entry in the shopping cart.
///
/// `name`, `unit_price`, and `image` are snapshots taken when the item was
/// first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog item this line refers to.
    pub item_id: FlowerId,
    /// Display name at add-time.
    pub name: String,
    /// Unit price at add-time.
    pub unit_price: Price,
    /// Image path at add-time.
    pub image: String,
    /// Number of units; never 0 in any observable state.
    pub quantity: u32,
}

impl CartLine {
    /// This line's total, rounded to cents.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.line_total(self.quantity)
    }
}

// =============================================================================
// CartStore
// =============================================================================

/// Ordered cart lines with quantities, persisted locally.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    kv: Arc<dyn KeyValueStore>,
    lines: RwLock<Vec<CartLine>>,
    changes: watch::Sender<Vec<CartLine>>,
}

impl CartStore {
    /// Create an empty cart over the given key-value backend.
    ///
    /// Call [`Self::load`] afterwards to pick up the persisted lines.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(CartStoreInner {
                kv,
                lines: RwLock::new(Vec::new()),
                changes,
            }),
        }
    }

    /// Replace the in-memory lines from the persisted list.
    ///
    /// Called once at initialization and again when the owning screen
    /// regains focus. A missing key is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend fails or the stored value is
    /// not a valid line list; the in-memory cart is left as it was.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<CartLine>, StorageError> {
        let lines = match self.inner.kv.get(CART_KEY).await? {
            Some(raw) => serde_json::from_str::<Vec<CartLine>>(&raw).map_err(|err| {
                warn!(error = %err, "persisted cart is not a valid line list");
                StorageError::from(err)
            })?,
            None => Vec::new(),
        };

        Ok(self.replace(lines))
    }

    /// Add one unit of an item, creating the line from the catalog snapshot
    /// if it does not exist yet.
    ///
    /// The presence check lives here, not at the call site, so a
    /// navigation-triggered add and a user-triggered add for the same item
    /// cannot double-count - callers may invoke this freely.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] (and mutates nothing) when the id
    /// is absent from `catalog`, or [`CartError::Storage`] when the
    /// in-memory mutation succeeded but persistence failed.
    #[instrument(skip(self, catalog), fields(id = %id))]
    pub async fn add_or_increment(
        &self,
        id: FlowerId,
        catalog: &CatalogSnapshot,
    ) -> Result<(), CartError> {
        let Some(item) = catalog.item(id) else {
            debug!("add ignored, item not in catalog");
            return Err(CartError::ItemNotFound);
        };

        let lines = {
            let mut lines = self.write_lines();
            if let Some(line) = lines.iter_mut().find(|line| line.item_id == id) {
                line.quantity += 1;
            } else {
                lines.push(CartLine {
                    item_id: item.id,
                    name: item.name.clone(),
                    unit_price: item.price,
                    image: item.image.clone(),
                    quantity: 1,
                });
            }
            lines.clone()
        };
        self.inner.changes.send_replace(lines.clone());

        self.persist(&lines).await?;
        Ok(())
    }

    /// Adjust a line's quantity by a signed delta.
    ///
    /// A resulting quantity of zero or less removes the line; a missing line
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the full-snapshot write fails.
    #[instrument(skip(self), fields(id = %id, delta))]
    pub async fn set_quantity(&self, id: FlowerId, delta: i32) -> Result<(), StorageError> {
        let lines = {
            let mut lines = self.write_lines();
            let next = match lines.iter().find(|line| line.item_id == id) {
                Some(line) => i64::from(line.quantity) + i64::from(delta),
                None => return Ok(()),
            };

            if next <= 0 {
                lines.retain(|line| line.item_id != id);
            } else if let Some(line) = lines.iter_mut().find(|line| line.item_id == id) {
                line.quantity = u32::try_from(next).unwrap_or(u32::MAX);
            }
            lines.clone()
        };
        self.inner.changes.send_replace(lines.clone());

        self.persist(&lines).await
    }

    /// Remove a line unconditionally. Removing a missing line is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the full-snapshot write fails.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn remove(&self, id: FlowerId) -> Result<(), StorageError> {
        let lines = {
            let mut lines = self.write_lines();
            lines.retain(|line| line.item_id != id);
            lines.clone()
        };
        self.inner.changes.send_replace(lines.clone());

        self.persist(&lines).await
    }

    /// Empty the cart. The caller invokes this after a confirmed checkout.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the full-snapshot write fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StorageError> {
        let lines = {
            let mut lines = self.write_lines();
            lines.clear();
            lines.clone()
        };
        self.inner.changes.send_replace(lines.clone());

        self.persist(&lines).await
    }

    /// The current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Cart total: per-line cent-rounded totals, summed, re-rounded.
    #[must_use]
    pub fn total(&self) -> Price {
        self.inner
            .lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(CartLine::line_total)
            .sum::<Price>()
            .rounded()
    }

    /// Observe line-list snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<CartLine>> {
        self.inner.changes.subscribe()
    }

    async fn persist(&self, lines: &[CartLine]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(lines)?;
        if let Err(err) = self.inner.kv.set(CART_KEY, &raw).await {
            warn!(error = %err, "failed to persist cart");
            return Err(err);
        }
        Ok(())
    }

    fn replace(&self, lines: Vec<CartLine>) -> Vec<CartLine> {
        {
            let mut current = self.write_lines();
            *current = lines.clone();
        }
        self.inner.changes.send_replace(lines.clone());
        lines
    }

    fn write_lines(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CartLine>> {
        self.inner
            .lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::catalog::CatalogItem;
    use crate::storage::MemoryKeyValueStore;

    fn snapshot() -> CatalogSnapshot {
        let item = |id: i64, name: &str, cents: i64| CatalogItem {
            id: FlowerId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image: format!("/media/{id}.jpg"),
            category: None,
        };
        CatalogSnapshot {
            items: vec![item(1, "Rose", 500), item(2, "Tulip", 300), item(5, "Peony", 1250)],
            categories: Vec::new(),
        }
    }

    fn store() -> (CartStore, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        (CartStore::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn test_adding_twice_merges_into_one_line() {
        let (cart, _) = store();
        let catalog = snapshot();

        cart.add_or_increment(FlowerId::new(5), &catalog).await.unwrap();
        cart.add_or_increment(FlowerId::new(5), &catalog).await.unwrap();

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(cart.total(), Price::from_cents(2500));
    }

    #[tokio::test]
    async fn test_add_snapshots_catalog_fields() {
        let (cart, _) = store();
        cart.add_or_increment(FlowerId::new(1), &snapshot()).await.unwrap();

        let lines = cart.lines();
        assert_eq!(lines[0].name, "Rose");
        assert_eq!(lines[0].unit_price, Price::from_cents(500));
        assert_eq!(lines[0].image, "/media/1.jpg");
    }

    #[tokio::test]
    async fn test_add_unknown_item_reports_not_found() {
        let (cart, _) = store();

        let err = cart
            .add_or_increment(FlowerId::new(42), &snapshot())
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::ItemNotFound));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_quantity_floor_removes_line() {
        let (cart, _) = store();
        let catalog = snapshot();
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();

        cart.set_quantity(FlowerId::new(1), -100).await.unwrap();

        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_on_missing_line_is_noop() {
        let (cart, _) = store();
        cart.set_quantity(FlowerId::new(1), 3).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_decrement_to_zero_removes_increment_keeps() {
        let (cart, _) = store();
        let catalog = snapshot();
        cart.add_or_increment(FlowerId::new(2), &catalog).await.unwrap();

        cart.set_quantity(FlowerId::new(2), 1).await.unwrap();
        assert_eq!(cart.lines()[0].quantity, 2);

        cart.set_quantity(FlowerId::new(2), -2).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (cart, _) = store();
        let catalog = snapshot();
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();

        cart.remove(FlowerId::new(1)).await.unwrap();
        let after_once = cart.lines();
        cart.remove(FlowerId::new(1)).await.unwrap();

        assert_eq!(cart.lines(), after_once);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_total_for_mixed_cart() {
        let (cart, _) = store();
        let catalog = snapshot();
        // Rose x2 (5.00 each) + Tulip x1 (3.00) = 13.00
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();
        cart.add_or_increment(FlowerId::new(2), &catalog).await.unwrap();

        let lines = cart.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_total(), Price::from_cents(1000));
        assert_eq!(lines[1].line_total(), Price::from_cents(300));
        assert_eq!(cart.total(), Price::from_cents(1300));
    }

    #[tokio::test]
    async fn test_mutations_persist_full_snapshot() {
        let (cart, kv) = store();
        let catalog = snapshot();
        cart.add_or_increment(FlowerId::new(1), &catalog).await.unwrap();
        cart.add_or_increment(FlowerId::new(2), &catalog).await.unwrap();

        let raw = kv.get(CART_KEY).await.unwrap().unwrap();
        let persisted: Vec<CartLine> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, cart.lines());
    }

    #[tokio::test]
    async fn test_load_restores_persisted_cart() {
        let (cart, kv) = store();
        cart.add_or_increment(FlowerId::new(5), &snapshot()).await.unwrap();

        // A fresh store over the same backend sees the same cart.
        let restored = CartStore::new(kv);
        restored.load().await.unwrap();
        assert_eq!(restored.lines(), cart.lines());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_usable() {
        struct FailingKv;

        #[async_trait]
        impl KeyValueStore for FailingKv {
            async fn get(&self, _: &str) -> Result<Option<String>, StorageError> {
                Ok(None)
            }

            async fn set(&self, _: &str, _: &str) -> Result<(), StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
        }

        let cart = CartStore::new(Arc::new(FailingKv));

        let err = cart
            .add_or_increment(FlowerId::new(1), &snapshot())
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::Storage(_)));
        // The optimistic in-memory update stands.
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total(), Price::from_cents(500));
    }
}
