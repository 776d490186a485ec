//! Shared fixtures for Blossom integration tests.
//!
//! [`FakeShopApi`] is a scripted stand-in for the remote shop service: one
//! valid account, a small fixed catalog, and switchable failure modes. The
//! tests in `tests/` drive a whole [`Shop`] against it plus the in-memory
//! storage backends, exercising the same seams the mobile app wires up.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use blossom_commerce::api::{ApiError, LoginPayload, ShopApi};
use blossom_commerce::catalog::{CatalogItem, CatalogSnapshot, Category};
use blossom_commerce::checkout::Order;
use blossom_commerce::session::{Profile, Registration};
use blossom_commerce::storage::{MemoryKeyValueStore, MemorySecureStore};
use blossom_commerce::{Shop, ShopConfig};
use blossom_core::{CategoryId, ClientId, FlowerId, OrderId, Price};

/// The one account the fake service knows.
pub const TEST_EMAIL: &str = "ada@example.com";
/// Its password.
pub const TEST_PASSWORD: &str = "petals";

/// A scripted shop service.
#[derive(Default)]
pub struct FakeShopApi {
    /// When set, token refreshes fail as if the refresh token expired.
    pub revoke_refresh: AtomicBool,
    /// When set, order submissions are rejected.
    pub reject_orders: AtomicBool,
    /// Number of refresh exchanges performed.
    pub refresh_calls: AtomicUsize,
    /// Number of catalog fetches performed.
    pub catalog_fetches: AtomicUsize,
    /// Every order that reached the service.
    pub submitted: Mutex<Vec<Order>>,
    next_order_id: AtomicUsize,
}

impl FakeShopApi {
    /// Create a fake with all failure modes off.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_order_id: AtomicUsize::new(100),
            ..Self::default()
        })
    }

    /// The profile the fake returns on login.
    #[must_use]
    pub fn profile() -> Profile {
        Profile {
            id: Some(ClientId::new(9)),
            email: TEST_EMAIL.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            phone: Some("123".to_string()),
            address: Some("1 Garden Way".to_string()),
            image: None,
        }
    }

    /// The catalog the fake serves: Rose 5.00, Tulip 3.00, Peony 12.50.
    #[must_use]
    pub fn catalog() -> CatalogSnapshot {
        let item = |id: i64, name: &str, cents: i64, category: i64| CatalogItem {
            id: FlowerId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image: format!("/media/flower_images/{id}.jpg"),
            category: Some(CategoryId::new(category)),
        };

        CatalogSnapshot {
            items: vec![
                item(1, "Rose", 500, 1),
                item(2, "Tulip", 300, 2),
                item(5, "Peony", 1250, 1),
            ],
            categories: vec![
                Category {
                    id: CategoryId::new(1),
                    name: "Romance".to_string(),
                },
                Category {
                    id: CategoryId::new(2),
                    name: "Garden".to_string(),
                },
            ],
        }
    }

    /// Orders submitted so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ShopApi for FakeShopApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginPayload, ApiError> {
        if email == TEST_EMAIL && password == TEST_PASSWORD {
            Ok(LoginPayload {
                access: "access-1".to_string(),
                refresh: "refresh-1".to_string(),
                profile: Self::profile(),
            })
        } else {
            Err(ApiError::Rejected {
                status: 400,
                message: "Invalid Credentials".to_string(),
            })
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.revoke_refresh.load(Ordering::SeqCst) || refresh_token != "refresh-1" {
            Err(ApiError::Rejected {
                status: 401,
                message: "Token is invalid or expired".to_string(),
            })
        } else {
            Ok(format!("access-{}", call + 1))
        }
    }

    async fn register(&self, _registration: &Registration) -> Result<(), ApiError> {
        Ok(())
    }

    async fn update_profile(
        &self,
        _access_token: &str,
        _client_id: ClientId,
        _profile: &Profile,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn request_password_reset(&self, _email: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_catalog(&self) -> Result<CatalogSnapshot, ApiError> {
        self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Self::catalog())
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderId, ApiError> {
        if self.reject_orders.load(Ordering::SeqCst) {
            return Err(ApiError::Rejected {
                status: 400,
                message: "Something went wrong".to_string(),
            });
        }

        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderId::new(i64::try_from(id).unwrap_or(i64::MAX)))
    }
}

/// Everything a scenario test needs, wired together.
pub struct TestHarness {
    /// The state root under test.
    pub shop: Shop,
    /// The scripted service behind it.
    pub api: Arc<FakeShopApi>,
    /// The secure store behind the session manager.
    pub secure: Arc<MemorySecureStore>,
    /// The key-value store behind cart and favorites.
    pub kv: Arc<MemoryKeyValueStore>,
}

/// Initialize test logging from `RUST_LOG`, once per process.
///
/// Safe to call from every test; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestHarness {
    /// Build a fresh harness with empty storage.
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        let api = FakeShopApi::new();
        let secure = Arc::new(MemorySecureStore::new());
        let kv = Arc::new(MemoryKeyValueStore::new());
        let config = ShopConfig::new("http://shop.test:8000").unwrap_or_else(|_| {
            unreachable!("static test URL is valid")
        });

        let shop = Shop::with_api(config, api.clone(), secure.clone(), kv.clone());
        Self {
            shop,
            api,
            secure,
            kv,
        }
    }

    /// A second state root over the same storage, as after an app restart.
    #[must_use]
    pub fn restarted(&self) -> Shop {
        let config = ShopConfig::new("http://shop.test:8000").unwrap_or_else(|_| {
            unreachable!("static test URL is valid")
        });
        Shop::with_api(config, self.api.clone(), self.secure.clone(), self.kv.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
