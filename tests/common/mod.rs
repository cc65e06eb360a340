//! Shared test fixtures
//!
//! In-memory stand-ins for the HD wallet, chain backend, transaction
//! builder and metadata server. Every fake records the calls it receives so
//! tests can assert on ordering and on calls that must never happen.

#![allow(dead_code)]

use async_trait::async_trait;
use digiassets::chain::channels;
use digiassets::{
    metadata_digest, Address, AddressHandler, AddressTransactions, BlockExplorer, BuildArgs,
    BuilderError, BuiltTransaction, ChainAdapter, ChannelHub, ClientParts, DataStore, DigiAssets,
    DigiAssetsError, KeyService, MemoryDataStore, MetadataProvider, ProgressHandler, PushChannel,
    ScanProgress, Settings, Transaction, TransactionBuilder, TransactionHandler, TransmitResult,
    TxKind, Utxo, UtxoLocator,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

pub fn utxo(txid: &str, index: u32, address: &str) -> Utxo {
    serde_json::from_value(serde_json::json!({
        "txid": txid,
        "index": index,
        "value": 600,
        "scriptPubKey": {"addresses": [address]},
    }))
    .expect("valid utxo")
}

pub fn transaction(txid: &str, inputs: &[&str], outputs: &[&str]) -> Transaction {
    serde_json::from_value(serde_json::json!({
        "txid": txid,
        "vin": inputs
            .iter()
            .map(|a| serde_json::json!({"previousOutput": {"addresses": [a]}}))
            .collect::<Vec<_>>(),
        "vout": outputs
            .iter()
            .map(|a| serde_json::json!({"scriptPubKey": {"addresses": [a]}}))
            .collect::<Vec<_>>(),
    }))
    .expect("valid transaction")
}

// ============================================================================
// Key service
// ============================================================================

pub struct FakeKeys {
    primary: Address,
    addresses: Mutex<Vec<Address>>,
    /// Addresses handed out by the next `discover()`
    pending: Mutex<Vec<Address>>,
    handlers: Mutex<Vec<AddressHandler>>,
    pub discover_count: AtomicUsize,
    pub sign_count: AtomicUsize,
    pub init_count: AtomicUsize,
    sign_gate: Mutex<Option<Arc<Notify>>>,
    store: Arc<dyn DataStore>,
}

impl FakeKeys {
    pub fn new(addresses: &[&str]) -> Self {
        Self::with_store(addresses, Arc::new(MemoryDataStore::new()))
    }

    pub fn with_store(addresses: &[&str], store: Arc<dyn DataStore>) -> Self {
        Self {
            primary: addresses.first().copied().unwrap_or("Dprimary").to_string(),
            addresses: Mutex::new(addresses.iter().map(|a| a.to_string()).collect()),
            pending: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            discover_count: AtomicUsize::new(0),
            sign_count: AtomicUsize::new(0),
            init_count: AtomicUsize::new(0),
            sign_gate: Mutex::new(None),
            store,
        }
    }

    /// Derive `address` now and tell every registered handler
    pub fn register(&self, address: &str) {
        self.addresses.lock().unwrap().push(address.to_string());
        let handlers = self.handlers.lock().unwrap().clone();
        let address = address.to_string();
        for handler in &handlers {
            handler(&address);
        }
    }

    /// Queue an address for the next discovery pass
    pub fn queue_discovery(&self, address: &str) {
        self.pending.lock().unwrap().push(address.to_string());
    }

    /// Make `sign` wait until the returned gate is notified
    pub fn gate_signing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.sign_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl KeyService for FakeKeys {
    async fn init(&self) -> digiassets::Result<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_address(&self) -> digiassets::Result<Address> {
        Ok(self.primary.clone())
    }

    async fn get_addresses(&self) -> digiassets::Result<Vec<Address>> {
        Ok(self.addresses.lock().unwrap().clone())
    }

    fn discover(&self) {
        self.discover_count.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Address> = self.pending.lock().unwrap().drain(..).collect();
        for address in found {
            self.register(&address);
        }
    }

    async fn sign(&self, tx_hex: &str) -> digiassets::Result<String> {
        let gate = self.sign_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("signed:{}", tx_hex))
    }

    fn on_register_address(&self, handler: AddressHandler) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn data_store(&self) -> Arc<dyn DataStore> {
        self.store.clone()
    }
}

/// Data store whose writes always fail
#[derive(Default)]
pub struct ReadOnlyStore {
    inner: MemoryDataStore,
}

#[async_trait]
impl DataStore for ReadOnlyStore {
    async fn hget(&self, key: &str, field: &str) -> digiassets::Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hset(&self, _key: &str, _field: &str, _value: String) -> digiassets::Result<()> {
        Err(DigiAssetsError::collaborator("store is read-only"))
    }
}

// ============================================================================
// Chain adapter
// ============================================================================

pub struct FakeChain {
    pub calls: Mutex<Vec<String>>,
    pub imports: Mutex<Vec<(Vec<Address>, bool)>>,
    pub transmitted: Mutex<Vec<String>>,
    utxos: Mutex<HashMap<Address, Vec<Utxo>>>,
    by_locator: Mutex<HashMap<UtxoLocator, Utxo>>,
    history: Mutex<Vec<AddressTransactions>>,
    /// Stream the adapter's own subscriptions publish into
    pub hub: Arc<ChannelHub>,
    full_node: bool,
    connected: AtomicBool,
}

impl FakeChain {
    pub fn new(full_node: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            imports: Mutex::new(Vec::new()),
            transmitted: Mutex::new(Vec::new()),
            utxos: Mutex::new(HashMap::new()),
            by_locator: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            hub: Arc::new(ChannelHub::new()),
            full_node,
            connected: AtomicBool::new(true),
        }
    }

    pub fn explorer() -> Self {
        Self::new(false)
    }

    pub fn full_node() -> Self {
        Self::new(true)
    }

    pub fn add_utxo(&self, utxo: Utxo) {
        if let Some(owner) = utxo.owner_address().cloned() {
            self.utxos
                .lock()
                .unwrap()
                .entry(owner)
                .or_default()
                .push(utxo.clone());
        }
        self.by_locator.lock().unwrap().insert(utxo.locator(), utxo);
    }

    pub fn add_history(&self, address: &str, transactions: Vec<Transaction>) {
        self.history.lock().unwrap().push(AddressTransactions {
            address: address.to_string(),
            transactions,
        });
    }

    /// Never report readiness from `on_connect`
    pub fn stay_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn subscribe(&self, channel: &str, handler: TransactionHandler) {
        self.hub.on(
            channel,
            Arc::new(move |payload: &Value| {
                if let Some(tx) = digiassets::chain::transaction_from_payload(payload) {
                    handler(&tx);
                }
            }),
        );
    }
}

#[async_trait]
impl ChainAdapter for FakeChain {
    async fn import_addresses(
        &self,
        addresses: &[Address],
        reindex: bool,
    ) -> digiassets::Result<()> {
        self.record("import_addresses");
        self.imports
            .lock()
            .unwrap()
            .push((addresses.to_vec(), reindex));
        Ok(())
    }

    async fn get_addresses_utxos(&self, addresses: &[Address]) -> digiassets::Result<Vec<Utxo>> {
        self.record("get_addresses_utxos");
        let utxos = self.utxos.lock().unwrap();
        Ok(addresses
            .iter()
            .flat_map(|a| utxos.get(a).cloned().unwrap_or_default())
            .collect())
    }

    async fn get_utxos(&self, locators: &[UtxoLocator]) -> digiassets::Result<Vec<Utxo>> {
        self.record("get_utxos");
        let known = self.by_locator.lock().unwrap();
        locators
            .iter()
            .map(|l| {
                known
                    .get(l)
                    .cloned()
                    .ok_or_else(|| DigiAssetsError::collaborator(format!("unknown utxo {}", l)))
            })
            .collect()
    }

    async fn get_addresses_transactions(
        &self,
        addresses: &[Address],
    ) -> digiassets::Result<Vec<AddressTransactions>> {
        self.record("get_addresses_transactions");
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|info| addresses.contains(&info.address))
            .cloned()
            .collect())
    }

    async fn transmit(&self, signed_tx_hex: &str) -> digiassets::Result<TransmitResult> {
        self.record("transmit");
        self.transmitted
            .lock()
            .unwrap()
            .push(signed_tx_hex.to_string());
        Ok(TransmitResult {
            txid: format!("txid-{}", self.transmitted.lock().unwrap().len()),
        })
    }

    fn on_new_transaction(&self, handler: TransactionHandler) {
        self.subscribe(channels::NEW_TRANSACTION, handler);
    }

    fn join_new_transaction(&self) {
        self.hub.join(channels::NEW_TRANSACTION);
    }

    fn on_new_da_transaction(&self, handler: TransactionHandler) {
        self.subscribe(channels::NEW_DA_TRANSACTION, handler);
    }

    fn join_new_da_transaction(&self) {
        self.hub.join(channels::NEW_DA_TRANSACTION);
    }

    fn on_reverted_transaction(&self, handler: TransactionHandler) {
        self.subscribe(channels::REVERTED_TRANSACTION, handler);
    }

    fn join_reverted_transaction(&self) {
        self.hub.join(channels::REVERTED_TRANSACTION);
    }

    fn on_reverted_da_transaction(&self, handler: TransactionHandler) {
        self.subscribe(channels::REVERTED_DA_TRANSACTION, handler);
    }

    fn join_reverted_da_transaction(&self) {
        self.hub.join(channels::REVERTED_DA_TRANSACTION);
    }

    fn on_connect(&self, _push: Arc<dyn PushChannel>, handler: Box<dyn FnOnce() + Send>) {
        self.record("on_connect");
        if self.connected.load(Ordering::SeqCst) {
            handler();
        }
    }

    fn on_progress(&self, _push: Arc<dyn PushChannel>, handler: ProgressHandler) {
        self.hub.on(
            channels::SCAN_PROGRESS,
            Arc::new(move |payload: &Value| {
                if let Ok(progress) = serde_json::from_value::<ScanProgress>(payload.clone()) {
                    handler(&progress);
                }
            }),
        );
        self.hub.join(channels::SCAN_PROGRESS);
    }

    fn is_full_node(&self) -> bool {
        self.full_node
    }
}

// ============================================================================
// Transaction builder
// ============================================================================

#[derive(Default)]
pub struct FakeBuilder {
    pub builds: Mutex<Vec<(TxKind, BuildArgs)>>,
    pub fail_with: Mutex<Option<String>>,
    pub empty_hex: AtomicBool,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_build(&self) -> Option<(TxKind, BuildArgs)> {
        self.builds.lock().unwrap().last().cloned()
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    fn respond(&self, kind: TxKind, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError> {
        self.builds.lock().unwrap().push((kind, args.clone()));
        if let Some(ref message) = *self.fail_with.lock().unwrap() {
            return Err(message.clone().into());
        }

        let tx_hex = if self.empty_hex.load(Ordering::SeqCst) {
            String::new()
        } else {
            format!("unsigned-{}-{}", kind, args.utxos.len())
        };
        let asset_id = match kind {
            TxKind::Issue => Some("La-issued".to_string()),
            _ => None,
        };
        Ok(BuiltTransaction {
            tx_hex,
            asset_id,
            ..Default::default()
        })
    }
}

impl TransactionBuilder for FakeBuilder {
    fn build_issue_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError> {
        self.respond(TxKind::Issue, args)
    }

    fn build_send_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError> {
        self.respond(TxKind::Send, args)
    }

    fn build_burn_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError> {
        self.respond(TxKind::Burn, args)
    }
}

// ============================================================================
// Metadata provider
// ============================================================================

#[derive(Default)]
pub struct FakeMetadata {
    pub uploads: Mutex<Vec<Value>>,
    pub seeds: Mutex<Vec<String>>,
    pub fetches: Mutex<Vec<(String, Option<String>)>>,
    records: Mutex<HashMap<String, Value>>,
    pub fail_upload: AtomicBool,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_record(&self, asset_id: &str, record: Value) {
        self.records
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), record);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn upload(&self, mut args: BuildArgs) -> digiassets::Result<BuildArgs> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(DigiAssetsError::collaborator("metadata server unavailable"));
        }
        if let Some(ref metadata) = args.metadata {
            self.uploads.lock().unwrap().push(metadata.clone());
            args.sha1 = Some("torrent-hash".to_string());
            args.sha2 = Some(metadata_digest(metadata)?);
        }
        Ok(args)
    }

    async fn seed(&self, sha1: &str) -> digiassets::Result<()> {
        self.seeds.lock().unwrap().push(sha1.to_string());
        Ok(())
    }

    async fn get_asset_metadata(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
    ) -> digiassets::Result<Value> {
        self.fetches
            .lock()
            .unwrap()
            .push((asset_id.to_string(), utxo.map(str::to_string)));
        self.records
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .ok_or_else(|| DigiAssetsError::collaborator(format!("unknown asset {}", asset_id)))
    }
}

// ============================================================================
// Client harness
// ============================================================================

pub struct Harness {
    pub keys: Arc<FakeKeys>,
    pub chain: Arc<FakeChain>,
    pub builder: Arc<FakeBuilder>,
    pub metadata: Arc<FakeMetadata>,
    /// Explorer push channel
    pub push: Arc<ChannelHub>,
    pub client: DigiAssets,
}

impl Harness {
    pub fn new(settings: Settings, keys: FakeKeys, chain: FakeChain) -> Self {
        let keys = Arc::new(keys);
        let chain = Arc::new(chain);
        let builder = Arc::new(FakeBuilder::new());
        let metadata = Arc::new(FakeMetadata::new());
        let push = Arc::new(ChannelHub::new());
        let explorer = Arc::new(BlockExplorer::new(
            "http://127.0.0.1:9",
            reqwest::Client::new(),
            push.clone(),
        ));

        let client = DigiAssets::from_parts(
            settings,
            ClientParts {
                keys: keys.clone(),
                builder: builder.clone(),
                metadata: metadata.clone(),
                chain: chain.clone(),
                push: push.clone(),
                explorer,
            },
        )
        .expect("client");

        Self {
            keys,
            chain,
            builder,
            metadata,
            push,
            client,
        }
    }

    pub fn explorer(addresses: &[&str]) -> Self {
        Self::new(Settings::default(), FakeKeys::new(addresses), FakeChain::explorer())
    }

    pub fn with_events(addresses: &[&str], chain: FakeChain, secure: bool, all: bool) -> Self {
        let mut settings = Settings::default();
        settings.events = true;
        settings.events_secure = secure;
        settings.all_transactions = all;
        Self::new(settings, FakeKeys::new(addresses), chain)
    }
}
