//! Application state shared across screens.
//!
//! There are no ambient globals in this core: the embedder creates one
//! [`Shop`], hands clones of it to every screen, and each screen reaches the
//! stores through it. The stores are themselves cheap handles, so cloning at
//! any level is a pointer copy.

use std::sync::Arc;

use crate::api::{HttpShopApi, ShopApi};
use crate::cart::CartStore;
use crate::catalog::CatalogCache;
use crate::checkout::CheckoutOrderBuilder;
use crate::config::ShopConfig;
use crate::favorites::FavoritesStore;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, SecureStore};

/// Root of the commerce state: one per process, cheaply cloneable.
#[derive(Clone)]
pub struct Shop {
    inner: Arc<ShopInner>,
}

struct ShopInner {
    config: ShopConfig,
    api: Arc<dyn ShopApi>,
    session: SessionManager,
    catalog: CatalogCache,
    cart: CartStore,
    favorites: FavoritesStore,
}

impl Shop {
    /// Create the state root over the production HTTP client.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `secure` - Host secure credential storage
    /// * `kv` - Host persistent key-value storage
    #[must_use]
    pub fn new(
        config: ShopConfig,
        secure: Arc<dyn SecureStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let api: Arc<dyn ShopApi> = Arc::new(HttpShopApi::new(&config));
        Self::with_api(config, api, secure, kv)
    }

    /// Create the state root over an explicit API implementation.
    ///
    /// Tests use this to drive the whole core against a scripted fake.
    #[must_use]
    pub fn with_api(
        config: ShopConfig,
        api: Arc<dyn ShopApi>,
        secure: Arc<dyn SecureStore>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ShopInner {
                config,
                session: SessionManager::new(api.clone(), secure),
                catalog: CatalogCache::new(api.clone()),
                cart: CartStore::new(kv.clone()),
                favorites: FavoritesStore::new(kv),
                api,
            }),
        }
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &ShopConfig {
        &self.inner.config
    }

    /// Get a reference to the session manager.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Get a reference to the catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the favorites store.
    #[must_use]
    pub fn favorites(&self) -> &FavoritesStore {
        &self.inner.favorites
    }

    /// Create a checkout flow.
    ///
    /// Checkout consumes cart lines and the profile only at submission time,
    /// so a fresh builder per checkout screen keeps it decoupled from the
    /// other stores.
    #[must_use]
    pub fn checkout(&self) -> CheckoutOrderBuilder {
        CheckoutOrderBuilder::new(self.inner.api.clone())
    }
}
