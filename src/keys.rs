//! HD-wallet collaborator contract
//!
//! Key derivation, address discovery and signing live in an external HD
//! wallet. This module describes the narrow surface the orchestration layer
//! uses, plus the hash-field data store the wallet exposes for caching.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::types::Address;

/// Invoked with each address the wallet discovers
pub type AddressHandler = Arc<dyn Fn(&Address) + Send + Sync>;

#[async_trait]
pub trait KeyService: Send + Sync {
    /// Prepare key material and the data store
    async fn init(&self) -> Result<()>;

    /// Primary receiving address
    async fn get_address(&self) -> Result<Address>;

    /// Every address derived so far
    async fn get_addresses(&self) -> Result<Vec<Address>>;

    /// Start a rescan for new receiving addresses
    ///
    /// Returns immediately; newly found addresses are reported through
    /// `on_register_address` handlers.
    fn discover(&self);

    /// Sign an unsigned transaction hex
    async fn sign(&self, tx_hex: &str) -> Result<String>;

    fn on_register_address(&self, handler: AddressHandler);

    /// Hash-field store shared with the wallet
    fn data_store(&self) -> Arc<dyn DataStore>;
}

/// Redis-style hash-field store
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: String) -> Result<()>;
}

/// In-process `DataStore`
#[derive(Default)]
pub struct MemoryDataStore {
    entries: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields stored under `key`
    pub fn field_count(&self, key: &str) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|fields| fields.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).and_then(|fields| fields.get(field)).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }
}
