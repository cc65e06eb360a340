// Full node backend
//
// Talks JSON-RPC 1.0 to a colored-coins aware full node. The node pushes
// every transaction it sees (not only wallet-owned ones) through its own
// event hub, which the node's notification transport feeds.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::push::{ChannelHub, PushChannel};
use super::{
    channels, transaction_push_handler, ChainAdapter, ConnectHandler, ProgressHandler,
    TransactionHandler,
};
use crate::error::{DigiAssetsError, Result};
use crate::types::{
    Address, AddressTransactions, AddressUtxos, ScanProgress, TransmitResult, Utxo, UtxoLocator,
};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfo {
    #[serde(default)]
    blocks: Option<u64>,
    #[serde(default)]
    headers: Option<u64>,
    #[serde(default)]
    verificationprogress: f64,
}

impl From<BlockchainInfo> for ScanProgress {
    fn from(info: BlockchainInfo) -> Self {
        ScanProgress {
            progress: info.verificationprogress,
            blocks: info.blocks,
            headers: info.headers,
        }
    }
}

#[derive(Clone)]
struct RpcClient {
    url: String,
    http: reqwest::Client,
    user: Option<String>,
    password: Option<String>,
}

impl RpcClient {
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: "digiassets",
            method,
            params,
        };

        let mut builder = self.http.post(&self.url).json(&request);
        if let Some(ref user) = self.user {
            builder = builder.basic_auth(user, self.password.as_ref());
        }

        // nodes answer RPC errors with a non-2xx status and a JSON body
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: RpcResponse = serde_json::from_str(&text).map_err(|_| {
            DigiAssetsError::collaborator(format!(
                "full node {} returned {}: {}",
                method, status, text
            ))
        })?;

        if let Some(error) = body.error {
            return Err(DigiAssetsError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = body.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfo> {
        self.call("getblockchaininfo", json!([])).await
    }
}

pub struct FullNode {
    rpc: RpcClient,
    events: Arc<ChannelHub>,
    poll_interval: Duration,
    /// Background tasks stop once the adapter is dropped
    alive: Arc<()>,
}

impl FullNode {
    pub fn new(url: impl Into<String>, http: reqwest::Client, poll_interval: Duration) -> Self {
        let url = url.into();
        log::debug!("Full node adapter for {}", url);
        Self {
            rpc: RpcClient {
                url,
                http,
                user: None,
                password: None,
            },
            events: Arc::new(ChannelHub::new()),
            poll_interval,
            alive: Arc::new(()),
        }
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.rpc.user = Some(user.into());
        self.rpc.password = password;
        self
    }

    /// Hub the node's notification transport publishes into
    pub fn events(&self) -> Arc<ChannelHub> {
        self.events.clone()
    }

    pub async fn scan_progress(&self) -> Result<ScanProgress> {
        Ok(self.rpc.blockchain_info().await?.into())
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(e) => log::error!("Full node background task needs a tokio runtime: {}", e),
        }
    }
}

#[async_trait]
impl ChainAdapter for FullNode {
    async fn import_addresses(&self, addresses: &[Address], reindex: bool) -> Result<()> {
        log::info!(
            "Importing {} address(es) into full node (reindex: {})",
            addresses.len(),
            reindex
        );
        let _: Value = self
            .rpc
            .call("importaddresses", json!([addresses, reindex]))
            .await?;
        Ok(())
    }

    async fn get_addresses_utxos(&self, addresses: &[Address]) -> Result<Vec<Utxo>> {
        let infos: Vec<AddressUtxos> = self
            .rpc
            .call("getaddressesutxos", json!([addresses]))
            .await?;
        Ok(infos.into_iter().flat_map(|info| info.utxos).collect())
    }

    async fn get_utxos(&self, locators: &[UtxoLocator]) -> Result<Vec<Utxo>> {
        self.rpc.call("getutxos", json!([locators])).await
    }

    async fn get_addresses_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<AddressTransactions>> {
        self.rpc
            .call("getaddressestransactions", json!([addresses]))
            .await
    }

    async fn transmit(&self, signed_tx_hex: &str) -> Result<TransmitResult> {
        let txid: String = self
            .rpc
            .call("sendrawtransaction", json!([signed_tx_hex]))
            .await?;
        log::info!("Transmitted transaction {}", txid);
        Ok(TransmitResult { txid })
    }

    fn on_new_transaction(&self, handler: TransactionHandler) {
        self.events
            .on(channels::NEW_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_new_transaction(&self) {
        self.events.join(channels::NEW_TRANSACTION);
    }

    fn on_new_da_transaction(&self, handler: TransactionHandler) {
        self.events
            .on(channels::NEW_DA_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_new_da_transaction(&self) {
        self.events.join(channels::NEW_DA_TRANSACTION);
    }

    fn on_reverted_transaction(&self, handler: TransactionHandler) {
        self.events
            .on(channels::REVERTED_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_reverted_transaction(&self) {
        self.events.join(channels::REVERTED_TRANSACTION);
    }

    fn on_reverted_da_transaction(&self, handler: TransactionHandler) {
        self.events.on(
            channels::REVERTED_DA_TRANSACTION,
            transaction_push_handler(handler),
        );
    }

    fn join_reverted_da_transaction(&self) {
        self.events.join(channels::REVERTED_DA_TRANSACTION);
    }

    /// Probe the node until it answers, then run `handler`
    fn on_connect(&self, _push: Arc<dyn PushChannel>, handler: ConnectHandler) {
        let rpc = self.rpc.clone();
        let alive: Weak<()> = Arc::downgrade(&self.alive);
        let interval = self.poll_interval;

        self.spawn(async move {
            while alive.upgrade().is_some() {
                match rpc.blockchain_info().await {
                    Ok(info) => {
                        log::info!("Full node ready at height {:?}", info.blocks);
                        handler();
                        return;
                    }
                    Err(e) => log::warn!("Full node not ready yet: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Poll sync progress for as long as the adapter lives
    fn on_progress(&self, _push: Arc<dyn PushChannel>, handler: ProgressHandler) {
        let rpc = self.rpc.clone();
        let alive: Weak<()> = Arc::downgrade(&self.alive);
        let interval = self.poll_interval;

        self.spawn(async move {
            while alive.upgrade().is_some() {
                match rpc.blockchain_info().await {
                    Ok(info) => handler(&info.into()),
                    Err(e) => log::warn!("Progress poll failed: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    fn is_full_node(&self) -> bool {
        true
    }
}
