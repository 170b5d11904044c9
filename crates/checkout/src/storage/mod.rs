//! Durable client-local key-value storage.
//!
//! The cart and the pending payment correlation must survive full page
//! navigations away from the application, so they live in an injected
//! [`KeyValueStore`] rather than in memory. The store is deliberately an
//! explicit dependency (not ambient global state) so tests can substitute
//! [`MemoryStore`] for the production [`FileStore`].
//!
//! Values are written as whole JSON documents: every mutation is an atomic
//! replacement of the stored value, never a partial field write, so a reload
//! mid-mutation can never observe torn state.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be (de)serialized.
    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A durable string-keyed JSON store.
///
/// Implementations must make `set` atomic with respect to concurrent reads:
/// a reader sees either the old value or the new value, never a mixture.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw JSON value for a key, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backing medium cannot be read.
    fn get_raw(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Replace the raw JSON value for a key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the value cannot be persisted.
    fn set_raw(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the deletion cannot be persisted.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// A typed key into a [`KeyValueStore`].
///
/// Pairs a storage key name with the Rust type stored under it, so callers
/// cannot read a cart out of the correlation slot or vice versa.
pub struct Key<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    /// Define a typed key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The underlying storage key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Serialize + DeserializeOwned> Key<T> {
    /// Read and deserialize the value for this key, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the stored JSON does
    /// not deserialize into `T`.
    pub fn get(&self, store: &dyn KeyValueStore) -> Result<Option<T>, StorageError> {
        match store.get_raw(self.name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and atomically replace the value for this key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or persistence fails.
    pub fn set(&self, store: &dyn KeyValueStore, value: &T) -> Result<(), StorageError> {
        store.set_raw(self.name, serde_json::to_value(value)?)
    }

    /// Delete the value for this key.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be persisted.
    pub fn delete(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        store.delete(self.name)
    }
}

/// The typed keys this subsystem owns.
///
/// Everything else the subsystem touches is derived or fetched.
pub mod keys {
    use super::Key;
    use crate::cart::types::Cart;
    use crate::payment::PendingPaymentCorrelation;

    /// The serialized cart.
    pub const CART: Key<Cart> = Key::new("cart");

    /// The pending payment correlation (local order id + external order id).
    pub const PENDING_PAYMENT: Key<PendingPaymentCorrelation> = Key::new("pending_payment");
}
