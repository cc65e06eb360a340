//! DigiAssets client - orchestration layer
//!
//! Wires the key service, chain adapter, transaction builder and metadata
//! provider together and exposes the wallet operations on one handle.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::addresses::AddressBook;
use crate::builder::{BuildArgs, TransactionBuilder, TxKind};
use crate::chain::{
    BlockExplorer, ChainAdapter, ChannelHub, FullNode, ProgressHandler, PushChannel, PushHandler,
    TransactionHandler,
};
use crate::config::Settings;
use crate::error::{DigiAssetsError, Result};
use crate::events::{EventRouter, EventSettings};
use crate::keys::KeyService;
use crate::metadata::cache::AssetMetadata;
use crate::metadata::{AssetMetadataCache, HttpMetadataProvider, MetadataProvider};
use crate::query::AssetQueryService;
use crate::types::{
    Address, AddressInfo, AssetHolding, Issuance, Transaction, TransmitResult, Utxo,
};
use crate::verifier::IssuerVerifier;
use crate::workflow::{
    AssetInfo, BurnArgs, IssueArgs, SendArgs, TransactionWorkflow, UtxoReservations,
    WorkflowOutcome,
};

/// Listener registration for `DigiAssets::subscribe`
pub enum Subscription {
    NewTransaction(TransactionHandler),
    NewDaTransaction(TransactionHandler),
    RevertedTransaction(TransactionHandler),
    RevertedDaTransaction(TransactionHandler),
    ScanProgress(ProgressHandler),
    /// Any other explorer push channel, joined and passed through untouched
    Raw { channel: String, handler: PushHandler },
}

/// Collaborators for `DigiAssets::from_parts`
pub struct ClientParts {
    pub keys: Arc<dyn KeyService>,
    pub builder: Arc<dyn TransactionBuilder>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub chain: Arc<dyn ChainAdapter>,
    /// Explorer push channel (address channels, connect, scan progress)
    pub push: Arc<dyn PushChannel>,
    /// Explorer REST client, also used for stake-holder lookups
    pub explorer: Arc<BlockExplorer>,
}

pub struct DigiAssets {
    settings: Settings,
    keys: Arc<dyn KeyService>,
    chain: Arc<dyn ChainAdapter>,
    explorer: Arc<BlockExplorer>,
    push: Arc<dyn PushChannel>,
    metadata: Arc<dyn MetadataProvider>,
    node_events: Option<Arc<ChannelHub>>,
    addresses: Arc<AddressBook>,
    workflow: TransactionWorkflow,
    query: AssetQueryService,
    router: EventRouter,
    verifier: IssuerVerifier,
}

impl DigiAssets {
    // ============================================================================
    // Construction
    // ============================================================================

    /// Client over the HTTP backends named in `settings`
    ///
    /// The full node becomes the chain adapter when `full_node_url` is set;
    /// the block explorer is used otherwise.
    pub fn new(
        settings: Settings,
        keys: Arc<dyn KeyService>,
        builder: Arc<dyn TransactionBuilder>,
        push: Arc<dyn PushChannel>,
    ) -> Result<Self> {
        let http = settings.http_client()?;

        let metadata: Arc<dyn MetadataProvider> = Arc::new(HttpMetadataProvider::new(
            settings.metadata_url.clone(),
            settings.api_url.clone(),
            http.clone(),
        ));
        let explorer = Arc::new(BlockExplorer::new(
            settings.explorer_url.clone(),
            http.clone(),
            push.clone(),
        ));

        let mut node_events = None;
        let chain: Arc<dyn ChainAdapter> = match settings.full_node_url {
            Some(ref url) => {
                let mut node = FullNode::new(url.clone(), http, settings.progress_interval);
                if let Some(ref user) = settings.full_node_user {
                    node = node.with_auth(user.clone(), settings.full_node_password.clone());
                }
                node_events = Some(node.events());
                Arc::new(node)
            }
            None => explorer.clone(),
        };

        let mut client = Self::from_parts(
            settings,
            ClientParts {
                keys,
                builder,
                metadata,
                chain,
                push,
                explorer,
            },
        )?;
        client.node_events = node_events;
        Ok(client)
    }

    /// Client over caller-supplied collaborators
    pub fn from_parts(settings: Settings, parts: ClientParts) -> Result<Self> {
        let ClientParts {
            keys,
            builder,
            metadata,
            chain,
            push,
            explorer,
        } = parts;

        let addresses = Arc::new(AddressBook::new());
        let workflow =
            TransactionWorkflow::new(keys.clone(), chain.clone(), builder, metadata.clone());
        let query = AssetQueryService::new(keys.clone(), chain.clone());
        let router = EventRouter::new(
            EventSettings::from(&settings),
            chain.clone(),
            push.clone(),
            keys.clone(),
            addresses.clone(),
        );
        let verifier = IssuerVerifier::new(settings.verifier_url.clone(), settings.http_client()?);

        Ok(Self {
            settings,
            keys,
            chain,
            explorer,
            push,
            metadata,
            node_events: None,
            addresses,
            workflow,
            query,
            router,
            verifier,
        })
    }

    /// Initialize the key service, import addresses and wait for the backend
    ///
    /// Addresses the key service discovers later are tracked and imported
    /// as they appear. Resolves once the chain adapter reports readiness.
    pub async fn init(&self) -> Result<()> {
        self.keys.init().await?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DigiAssetsError::collaborator(format!("no tokio runtime: {}", e)))?;
        let book = self.addresses.clone();
        let chain = self.chain.clone();
        self.keys.on_register_address(Arc::new(move |address: &Address| {
            if !book.insert(address) {
                return;
            }
            let chain = chain.clone();
            let address = address.clone();
            runtime.spawn(async move {
                let imported = chain
                    .import_addresses(std::slice::from_ref(&address), false)
                    .await;
                if let Err(e) = imported {
                    log::error!("Failed to import address {}: {}", address, e);
                }
            });
        }));

        let known = self.keys.get_addresses().await?;
        self.addresses.extend(&known);
        self.chain
            .import_addresses(&known, self.settings.reindex)
            .await?;

        let (ready_tx, ready_rx) = oneshot::channel();
        self.chain.on_connect(
            self.push.clone(),
            Box::new(move || {
                let _ = ready_tx.send(());
            }),
        );
        ready_rx.await.map_err(|_| {
            DigiAssetsError::collaborator("chain adapter closed before connecting")
        })?;

        log::info!(
            "DigiAssets client ready with {} address(es)",
            self.addresses.len()
        );
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tracked addresses, in discovery order
    pub fn addresses(&self) -> Vec<Address> {
        self.addresses.snapshot()
    }

    pub fn address_book(&self) -> Arc<AddressBook> {
        self.addresses.clone()
    }

    /// Hub the full node's notification transport publishes into
    pub fn node_events(&self) -> Option<Arc<ChannelHub>> {
        self.node_events.clone()
    }

    pub fn reservations(&self) -> Arc<UtxoReservations> {
        self.workflow.reservations()
    }

    // ============================================================================
    // Workflows
    // ============================================================================

    pub async fn issue_asset(&self, args: IssueArgs) -> Result<WorkflowOutcome> {
        self.workflow.issue_asset(args).await
    }

    pub async fn send_asset(&self, args: SendArgs) -> Result<WorkflowOutcome> {
        self.workflow.send_asset(args).await
    }

    pub async fn burn_asset(&self, args: BurnArgs) -> Result<WorkflowOutcome> {
        self.workflow.burn_asset(args).await
    }

    pub async fn build_transaction(&self, kind: TxKind, args: BuildArgs) -> Result<AssetInfo> {
        self.workflow.build_transaction(kind, args).await
    }

    pub async fn sign_and_transmit(&self, info: AssetInfo) -> Result<AssetInfo> {
        self.workflow.sign_and_transmit(info).await
    }

    pub async fn sign(&self, tx_hex: &str) -> Result<String> {
        self.keys.sign(tx_hex).await
    }

    pub async fn transmit(&self, signed_tx_hex: &str) -> Result<TransmitResult> {
        self.chain.transmit(signed_tx_hex).await
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn get_utxos(&self) -> Result<Vec<Utxo>> {
        self.query.get_utxos().await
    }

    pub async fn get_assets(&self) -> Result<Vec<AssetHolding>> {
        self.query.get_assets().await
    }

    pub async fn get_transactions(
        &self,
        addresses: Option<&[Address]>,
    ) -> Result<Vec<Transaction>> {
        self.query.get_transactions(addresses).await
    }

    pub async fn get_issued_assets(
        &self,
        transactions: Option<Vec<Transaction>>,
    ) -> Result<Vec<Issuance>> {
        self.query.get_issued_assets(transactions).await
    }

    pub async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        self.query.get_address_info(address).await
    }

    /// Metadata cache over the key service's data store
    pub fn metadata_cache(&self) -> AssetMetadataCache {
        AssetMetadataCache::new(self.keys.data_store(), self.metadata.clone())
    }

    pub async fn get_asset_metadata(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
        full: bool,
    ) -> Result<AssetMetadata> {
        self.metadata_cache().get(asset_id, utxo, full).await
    }

    /// Holders of `asset_id`; `confirmations` defaults to 0
    pub async fn get_stake_holders(
        &self,
        asset_id: &str,
        confirmations: Option<u32>,
    ) -> Result<Value> {
        self.explorer
            .get_asset_holders(asset_id, confirmations.unwrap_or(0))
            .await
    }

    pub async fn verify_issuer(&self, asset_id: &str, json: Option<&Value>) -> Result<Value> {
        self.verifier.verify(asset_id, json).await
    }

    // ============================================================================
    // Events
    // ============================================================================

    /// Register a listener; returns false when events are disabled
    pub fn subscribe(&self, subscription: Subscription) -> bool {
        match subscription {
            Subscription::NewTransaction(listener) => self.router.on_new_transaction(listener),
            Subscription::NewDaTransaction(listener) => {
                self.router.on_new_da_transaction(listener)
            }
            Subscription::RevertedTransaction(listener) => {
                self.router.on_reverted_transaction(listener)
            }
            Subscription::RevertedDaTransaction(listener) => {
                self.router.on_reverted_da_transaction(listener)
            }
            Subscription::ScanProgress(listener) => self.router.on_progress(listener),
            Subscription::Raw { channel, handler } => {
                self.push.on(&channel, handler);
                self.push.join(&channel);
                true
            }
        }
    }

    pub fn event_router(&self) -> &EventRouter {
        &self.router
    }
}
