//! Transaction event routing
//!
//! Normalizes notifications from whichever backend is active into five
//! independent event kinds: new, new colored, reverted, reverted colored,
//! and scan progress.
//!
//! ## Modes
//!
//! - **Bulk**: full node backend, `events_secure`, or `all_transactions`.
//!   The adapter's stream carries every transaction; the router keeps the
//!   local ones (and the rest too when `all_transactions` is set).
//! - **Per-address**: lightweight explorer mode. Each tracked address gets
//!   its own push channel, including addresses discovered later. A
//!   transaction is delivered at most once per registration.
//!
//! Every delivered wallet transaction triggers address discovery before the
//! listener runs, since it may have paid to a not-yet-derived address.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::addresses::AddressBook;
use crate::chain::{
    channels, transaction_from_payload, ChainAdapter, ProgressHandler, PushChannel,
    TransactionHandler,
};
use crate::config::Settings;
use crate::keys::KeyService;
use crate::types::{Address, Transaction};

/// True if any input's previous-output address or any output address is tracked
pub fn is_local_transaction(addresses: &[Address], transaction: &Transaction) -> bool {
    let tracked = |address: &Address| addresses.contains(address);

    transaction
        .vin
        .iter()
        .any(|input| input.previous_addresses().iter().any(tracked))
        || transaction
            .vout
            .iter()
            .any(|output| output.script_pub_key.addresses.iter().any(tracked))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventSettings {
    /// When false every subscription is a no-op
    pub enabled: bool,
    pub secure: bool,
    pub all_transactions: bool,
}

impl From<&Settings> for EventSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            enabled: settings.events,
            secure: settings.events_secure,
            all_transactions: settings.all_transactions,
        }
    }
}

pub struct EventRouter {
    settings: EventSettings,
    chain: Arc<dyn ChainAdapter>,
    push: Arc<dyn PushChannel>,
    keys: Arc<dyn KeyService>,
    addresses: Arc<AddressBook>,
}

impl EventRouter {
    pub fn new(
        settings: EventSettings,
        chain: Arc<dyn ChainAdapter>,
        push: Arc<dyn PushChannel>,
        keys: Arc<dyn KeyService>,
        addresses: Arc<AddressBook>,
    ) -> Self {
        Self {
            settings,
            chain,
            push,
            keys,
            addresses,
        }
    }

    pub fn bulk_mode(&self) -> bool {
        self.chain.is_full_node() || self.settings.secure || self.settings.all_transactions
    }

    /// Subscribe to new transactions; returns false when events are disabled
    pub fn on_new_transaction(&self, listener: TransactionHandler) -> bool {
        if !self.settings.enabled {
            return false;
        }

        if self.bulk_mode() {
            log::debug!("Subscribing to bulk new-transaction stream");
            self.chain.on_new_transaction(self.local_filter(listener));
            self.chain.join_new_transaction();
        } else {
            log::debug!(
                "Subscribing per address ({} tracked)",
                self.addresses.len()
            );
            AddressRegistration::start(
                self.push.clone(),
                self.keys.clone(),
                &self.addresses,
                listener,
            );
        }
        true
    }

    pub fn on_new_da_transaction(&self, listener: TransactionHandler) -> bool {
        if !self.settings.enabled {
            return false;
        }

        if self.bulk_mode() {
            self.chain.on_new_da_transaction(self.local_filter(listener));
            self.chain.join_new_da_transaction();
            true
        } else {
            self.on_new_transaction(Arc::new(move |tx: &Transaction| {
                if tx.colored {
                    listener(tx);
                }
            }))
        }
    }

    pub fn on_reverted_transaction(&self, listener: TransactionHandler) -> bool {
        if !self.settings.enabled {
            return false;
        }
        self.chain.on_reverted_transaction(listener);
        self.chain.join_reverted_transaction();
        true
    }

    pub fn on_reverted_da_transaction(&self, listener: TransactionHandler) -> bool {
        if !self.settings.enabled {
            return false;
        }
        self.chain.on_reverted_da_transaction(listener);
        self.chain.join_reverted_da_transaction();
        true
    }

    pub fn on_progress(&self, listener: ProgressHandler) -> bool {
        if !self.settings.enabled {
            return false;
        }
        self.chain.on_progress(self.push.clone(), listener);
        true
    }

    fn local_filter(&self, listener: TransactionHandler) -> TransactionHandler {
        let addresses = self.addresses.clone();
        let keys = self.keys.clone();
        let all_transactions = self.settings.all_transactions;

        Arc::new(move |tx: &Transaction| {
            if is_local_transaction(&addresses.snapshot(), tx) {
                keys.discover();
                listener(tx);
            } else if all_transactions {
                listener(tx);
            } else {
                log::trace!("Dropping non-local transaction {}", tx.txid);
            }
        })
    }
}

/// One per-address subscription set, shared by all of its channels
struct AddressRegistration {
    push: Arc<dyn PushChannel>,
    keys: Arc<dyn KeyService>,
    listener: TransactionHandler,
    subscribed: Mutex<HashSet<Address>>,
    delivered: Mutex<HashSet<String>>,
}

impl AddressRegistration {
    fn start(
        push: Arc<dyn PushChannel>,
        keys: Arc<dyn KeyService>,
        book: &AddressBook,
        listener: TransactionHandler,
    ) -> Arc<Self> {
        let registration = Arc::new(Self {
            push,
            keys,
            listener,
            subscribed: Mutex::new(HashSet::new()),
            delivered: Mutex::new(HashSet::new()),
        });

        // listen before the snapshot so no discovery slips between the two
        let on_added = registration.clone();
        book.on_added(Arc::new(move |address: &Address| on_added.register(address)));
        for address in book.snapshot() {
            registration.register(&address);
        }

        registration
    }

    fn register(self: &Arc<Self>, address: &str) {
        let fresh = self
            .subscribed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string());
        if !fresh {
            return;
        }

        let channel = channels::address(address);
        let weak: Weak<Self> = Arc::downgrade(self);
        self.push.on(
            &channel,
            Arc::new(move |payload: &Value| {
                if let Some(registration) = weak.upgrade() {
                    registration.deliver(payload);
                }
            }),
        );
        self.push.join(&channel);
    }

    fn deliver(&self, payload: &Value) {
        self.keys.discover();

        let Some(tx) = transaction_from_payload(payload) else {
            return;
        };
        let fresh = self
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tx.txid.clone());

        if fresh {
            (self.listener)(&tx);
        } else {
            log::trace!("Skipping already delivered transaction {}", tx.txid);
        }
    }
}
