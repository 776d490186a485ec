//! Host storage seams.
//!
//! The core never talks to the keychain or the preferences store directly;
//! the embedding app supplies implementations of these traits. Two in-memory
//! implementations are provided for tests and previews.
//!
//! Storage keys are fixed so data written by one process generation is found
//! by the next.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Secure-store key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Secure-store key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Key-value store key for the serialized cart lines.
pub const CART_KEY: &str = "cart";
/// Key-value store key for the serialized favorite id list.
pub const FAVORITES_KEY: &str = "favorites";

/// Errors that can occur when reading or writing host storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store reported a failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted value could not be serialized or deserialized.
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// OS-level secure credential storage (keychain/keystore).
///
/// String-valued, keyed access; used for the session tokens.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read a value, `None` if the key has never been set.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// OS-level persistent key-value store (preferences/async storage).
///
/// String-valued (the core writes JSON documents); used for the cart and
/// favorites snapshots.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key has never been set.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory [`SecureStore`] for tests and previews.
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecureStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// In-memory [`KeyValueStore`] for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
