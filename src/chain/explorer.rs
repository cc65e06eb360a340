// Block explorer backend
//
// REST calls go to `{host}/api/<method>` as JSON POSTs. Events come from
// the explorer's push channel, which the caller provides (the socket
// transport itself lives outside this crate).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::push::{PushChannel, PushHandler, CONNECT_CHANNEL};
use super::{
    channels, transaction_push_handler, ChainAdapter, ConnectHandler, ProgressHandler,
    TransactionHandler,
};
use crate::error::{DigiAssetsError, Result};
use crate::types::{
    Address, AddressTransactions, AddressUtxos, ScanProgress, TransmitResult, Utxo, UtxoLocator,
};

pub struct BlockExplorer {
    host: String,
    http: reqwest::Client,
    push: Arc<dyn PushChannel>,
}

impl BlockExplorer {
    pub fn new(host: impl Into<String>, http: reqwest::Client, push: Arc<dyn PushChannel>) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        log::debug!("Block explorer adapter for {}", host);
        Self { host, http, push }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn push_channel(&self) -> Arc<dyn PushChannel> {
        self.push.clone()
    }

    /// Holders of `asset_id` with at least `confirmations` confirmations
    pub async fn get_asset_holders(&self, asset_id: &str, confirmations: u32) -> Result<Value> {
        self.post(
            "getassetholders",
            &json!({ "assetId": asset_id, "confirmations": confirmations }),
        )
        .await
    }

    async fn post<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/api/{}", self.host, method);
        log::debug!("POST {}", url);

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DigiAssetsError::collaborator(format!(
                "explorer {} returned {}: {}",
                method, status, text
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChainAdapter for BlockExplorer {
    async fn import_addresses(&self, addresses: &[Address], _reindex: bool) -> Result<()> {
        // explorers index every address already
        log::debug!("Explorer import of {} address(es) is a no-op", addresses.len());
        Ok(())
    }

    async fn get_addresses_utxos(&self, addresses: &[Address]) -> Result<Vec<Utxo>> {
        let infos: Vec<AddressUtxos> = self
            .post("getaddressesutxos", &json!({ "addresses": addresses }))
            .await?;
        Ok(infos.into_iter().flat_map(|info| info.utxos).collect())
    }

    async fn get_utxos(&self, locators: &[UtxoLocator]) -> Result<Vec<Utxo>> {
        self.post("getutxos", &json!({ "utxos": locators })).await
    }

    async fn get_addresses_transactions(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<AddressTransactions>> {
        self.post(
            "getaddressesinfowithtransactions",
            &json!({ "addresses": addresses }),
        )
        .await
    }

    async fn transmit(&self, signed_tx_hex: &str) -> Result<TransmitResult> {
        let result: TransmitResult = self
            .post("transmit", &json!({ "txHex": signed_tx_hex }))
            .await?;
        log::info!("Transmitted transaction {}", result.txid);
        Ok(result)
    }

    fn on_new_transaction(&self, handler: TransactionHandler) {
        self.push
            .on(channels::NEW_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_new_transaction(&self) {
        self.push.join(channels::NEW_TRANSACTION);
    }

    fn on_new_da_transaction(&self, handler: TransactionHandler) {
        self.push
            .on(channels::NEW_DA_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_new_da_transaction(&self) {
        self.push.join(channels::NEW_DA_TRANSACTION);
    }

    fn on_reverted_transaction(&self, handler: TransactionHandler) {
        self.push
            .on(channels::REVERTED_TRANSACTION, transaction_push_handler(handler));
    }

    fn join_reverted_transaction(&self) {
        self.push.join(channels::REVERTED_TRANSACTION);
    }

    fn on_reverted_da_transaction(&self, handler: TransactionHandler) {
        self.push.on(
            channels::REVERTED_DA_TRANSACTION,
            transaction_push_handler(handler),
        );
    }

    fn join_reverted_da_transaction(&self) {
        self.push.join(channels::REVERTED_DA_TRANSACTION);
    }

    fn on_connect(&self, push: Arc<dyn PushChannel>, handler: ConnectHandler) {
        if push.is_connected() {
            handler();
            return;
        }

        // FnOnce behind a Fn handler: take it on first delivery
        let slot = std::sync::Mutex::new(Some(handler));
        let once: PushHandler = Arc::new(move |_| {
            let taken = slot
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            if let Some(handler) = taken {
                handler();
            }
        });
        push.on(CONNECT_CHANNEL, once);
        push.join(CONNECT_CHANNEL);
    }

    fn on_progress(&self, push: Arc<dyn PushChannel>, handler: ProgressHandler) {
        push.on(
            channels::SCAN_PROGRESS,
            Arc::new(move |payload: &Value| {
                match serde_json::from_value::<ScanProgress>(payload.clone()) {
                    Ok(progress) => handler(&progress),
                    Err(e) => log::warn!("Ignoring malformed scan progress: {}", e),
                }
            }),
        );
        push.join(channels::SCAN_PROGRESS);
    }

    fn is_full_node(&self) -> bool {
        false
    }
}
