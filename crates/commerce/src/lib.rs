//! Blossom Commerce - the client-side commerce state core.
//!
//! This crate owns the four pieces of state a storefront screen ever reads:
//! the authenticated session, the catalog snapshot, the shopping cart, and
//! the favorites set - plus the checkout flow that turns cart and session
//! into a submitted order. Screens issue commands and observe snapshots; the
//! core handles persistence, token renewal, optimistic mutation, and
//! validation before network submission.
//!
//! # Architecture
//!
//! - Every store is a cheaply cloneable handle around an `Arc`'d inner
//!   struct. In-memory state is mutated synchronously; persistence is an
//!   asynchronous full-snapshot write that the next mutation implicitly
//!   retries if it failed.
//! - The remote service is reached through the [`api::ShopApi`] trait;
//!   [`api::HttpShopApi`] is the production `reqwest` implementation and
//!   tests substitute scripted fakes.
//! - Host storage (secure keychain, key-value preferences) is consumed
//!   through the [`storage::SecureStore`] and [`storage::KeyValueStore`]
//!   traits.
//! - Each store exposes a `subscribe()` returning a `tokio::sync::watch`
//!   receiver of state snapshots; screens re-render from those.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blossom_commerce::{Shop, ShopConfig};
//! use blossom_commerce::storage::{MemoryKeyValueStore, MemorySecureStore};
//!
//! let config = ShopConfig::from_env()?;
//! let shop = Shop::new(config, Arc::new(MemorySecureStore::new()), Arc::new(MemoryKeyValueStore::new()));
//!
//! shop.session().login("user@example.com", "hunter2").await?;
//! let snapshot = shop.catalog().load().await?;
//! shop.cart().add_or_increment(snapshot.items[0].id, &snapshot).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod favorites;
pub mod session;
pub mod state;
pub mod storage;

pub use cart::{CartError, CartLine, CartStore};
pub use catalog::{CatalogCache, CatalogItem, CatalogSnapshot, Category, FetchError};
pub use checkout::{
    CheckoutError, CheckoutFields, CheckoutOrderBuilder, CheckoutState, Order, OrderConfirmation,
    OrderLine, SubmitError, ValidationError,
};
pub use config::{ConfigError, ShopConfig};
pub use favorites::FavoritesStore;
pub use session::{AuthError, Profile, ProfilePatch, Registration, Session, SessionManager};
pub use state::Shop;
