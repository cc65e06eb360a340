//! Chain adapters
//!
//! - `ChainAdapter` - backend-agnostic UTXO, history, broadcast and event API
//! - `FullNode` - authoritative full node over JSON-RPC, bulk event stream
//! - `BlockExplorer` - explorer REST API plus its per-address push channels
//! - `push` - named push channels and the in-process `ChannelHub`

pub mod explorer;
pub mod full_node;
pub mod push;

pub use explorer::BlockExplorer;
pub use full_node::FullNode;
pub use push::{ChannelHub, PushChannel, PushHandler, CONNECT_CHANNEL};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{
    Address, AddressTransactions, ScanProgress, Transaction, TransmitResult, Utxo, UtxoLocator,
};

pub type TransactionHandler = Arc<dyn Fn(&Transaction) + Send + Sync>;
pub type ProgressHandler = Arc<dyn Fn(&ScanProgress) + Send + Sync>;
pub type ConnectHandler = Box<dyn FnOnce() + Send>;

/// Push channel names shared by both backends
pub mod channels {
    pub const NEW_TRANSACTION: &str = "newtransaction";
    pub const NEW_DA_TRANSACTION: &str = "newdatransaction";
    pub const REVERTED_TRANSACTION: &str = "revertedtransaction";
    pub const REVERTED_DA_TRANSACTION: &str = "reverteddatransaction";
    pub const SCAN_PROGRESS: &str = "scanprogress";

    /// Per-address channel on the explorer
    pub fn address(address: &str) -> String {
        format!("address/{}", address)
    }
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Start tracking `addresses`; `reindex` asks for a rescan
    async fn import_addresses(&self, addresses: &[Address], reindex: bool) -> Result<()>;

    async fn get_addresses_utxos(&self, addresses: &[Address]) -> Result<Vec<Utxo>>;

    /// Populate UTXOs from explicit `txid:index` pairs
    async fn get_utxos(&self, locators: &[UtxoLocator]) -> Result<Vec<Utxo>>;

    async fn get_addresses_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<AddressTransactions>>;

    async fn transmit(&self, signed_tx_hex: &str) -> Result<TransmitResult>;

    fn on_new_transaction(&self, handler: TransactionHandler);
    fn join_new_transaction(&self);

    /// Colored transactions only
    fn on_new_da_transaction(&self, handler: TransactionHandler);
    fn join_new_da_transaction(&self);

    fn on_reverted_transaction(&self, handler: TransactionHandler);
    fn join_reverted_transaction(&self);

    fn on_reverted_da_transaction(&self, handler: TransactionHandler);
    fn join_reverted_da_transaction(&self);

    /// Run `handler` once the adapter is ready
    fn on_connect(&self, push: Arc<dyn PushChannel>, handler: ConnectHandler);

    fn on_progress(&self, push: Arc<dyn PushChannel>, handler: ProgressHandler);

    /// Full nodes push every transaction; explorers need per-address channels
    fn is_full_node(&self) -> bool;
}

/// Extract a transaction from a push payload (`{transaction}` or bare)
pub fn transaction_from_payload(payload: &Value) -> Option<Transaction> {
    let body = payload.get("transaction").unwrap_or(payload);
    match serde_json::from_value(body.clone()) {
        Ok(tx) => Some(tx),
        Err(e) => {
            log::warn!("Ignoring push payload that is not a transaction: {}", e);
            None
        }
    }
}

/// Adapt a typed transaction handler to a raw push handler
pub(crate) fn transaction_push_handler(handler: TransactionHandler) -> PushHandler {
    Arc::new(move |payload: &Value| {
        if let Some(tx) = transaction_from_payload(payload) {
            handler(&tx);
        }
    })
}
