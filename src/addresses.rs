//! Tracked wallet addresses
//!
//! Ordered, deduplicated and append-only. Listeners registered with
//! `on_added` hear about every address appended after registration.

use std::sync::{Mutex, PoisonError};

use crate::keys::AddressHandler;
use crate::types::Address;

#[derive(Default)]
pub struct AddressBook {
    addresses: Mutex<Vec<Address>>,
    listeners: Mutex<Vec<AddressHandler>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `address` unless already tracked; returns whether it was new
    pub fn insert(&self, address: &str) -> bool {
        {
            let mut addresses = self.addresses.lock().unwrap_or_else(PoisonError::into_inner);
            if addresses.iter().any(|a| a == address) {
                return false;
            }
            addresses.push(address.to_string());
        }

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let address = address.to_string();
        for listener in &listeners {
            listener(&address);
        }
        log::debug!("Tracking address {}", address);
        true
    }

    /// Append every new address, returning the ones that were added
    pub fn extend<I, S>(&self, addresses: I) -> Vec<Address>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addresses
            .into_iter()
            .filter(|a| self.insert(a.as_ref()))
            .map(|a| a.as_ref().to_string())
            .collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|a| a == address)
    }

    pub fn snapshot(&self) -> Vec<Address> {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn on_added(&self, listener: AddressHandler) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
