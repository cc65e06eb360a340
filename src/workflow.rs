//! Issue, send and burn pipelines
//!
//! Each workflow resolves its input UTXOs, reserves them, uploads metadata,
//! builds the unsigned transaction, then either signs only or signs and
//! broadcasts. A failing stage ends the workflow; side effects of earlier
//! stages (an uploaded metadata document) stay in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::builder::{
    BuildArgs, BuildFlags, BuiltTransaction, BurnEntry, TransactionBuilder, Transfer, TxKind,
};
use crate::chain::ChainAdapter;
use crate::error::{DigiAssetsError, Result};
use crate::keys::KeyService;
use crate::metadata::MetadataProvider;
use crate::types::{Address, Utxo, UtxoLocator, UtxoRef};

const WRONG_SERVER_RESPONSE: &str = "wrong server response";

fn default_transmit() -> bool {
    true
}

/// Inputs of an issuance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueArgs {
    #[serde(default)]
    pub issue_address: Option<Address>,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub divisibility: Option<u8>,
    #[serde(default)]
    pub reissueable: Option<bool>,
    #[serde(default)]
    pub aggregation_policy: Option<String>,
    #[serde(default)]
    pub transfer: Vec<Transfer>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub flags: BuildFlags,
    #[serde(default)]
    pub finance_change_address: Option<Address>,
    /// Broadcast after signing; when false the signed hex is returned
    #[serde(default = "default_transmit")]
    pub transmit: bool,
}

impl Default for IssueArgs {
    fn default() -> Self {
        Self {
            issue_address: None,
            amount: None,
            divisibility: None,
            reissueable: None,
            aggregation_policy: None,
            transfer: Vec::new(),
            fee: None,
            metadata: None,
            flags: BuildFlags::default(),
            finance_change_address: None,
            transmit: true,
        }
    }
}

impl IssueArgs {
    fn into_build_args(self, utxos: Vec<Utxo>) -> BuildArgs {
        BuildArgs {
            utxos,
            issue_address: self.issue_address,
            amount: self.amount,
            divisibility: self.divisibility,
            reissueable: self.reissueable,
            aggregation_policy: self.aggregation_policy,
            transfer: self.transfer,
            fee: self.fee,
            metadata: self.metadata,
            flags: self.flags,
            finance_change_address: self.finance_change_address,
            ..Default::default()
        }
    }
}

/// Inputs of a transfer
///
/// Inputs come from `from` when it is non-empty, otherwise from `sendutxo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendArgs {
    #[serde(default)]
    pub from: Vec<Address>,
    #[serde(default)]
    pub sendutxo: Vec<UtxoRef>,
    #[serde(default)]
    pub to: Vec<Transfer>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub flags: BuildFlags,
    #[serde(default)]
    pub finance_change_address: Option<Address>,
    #[serde(default = "default_transmit")]
    pub transmit: bool,
}

impl Default for SendArgs {
    fn default() -> Self {
        Self {
            from: Vec::new(),
            sendutxo: Vec::new(),
            to: Vec::new(),
            fee: None,
            metadata: None,
            flags: BuildFlags::default(),
            finance_change_address: None,
            transmit: true,
        }
    }
}

impl SendArgs {
    fn into_build_args(self, utxos: Vec<Utxo>) -> BuildArgs {
        BuildArgs {
            utxos,
            to: self.to,
            fee: self.fee,
            metadata: self.metadata,
            flags: self.flags,
            finance_change_address: self.finance_change_address,
            ..Default::default()
        }
    }
}

/// Inputs of a burn; `sendutxo` takes full UTXO objects only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnArgs {
    #[serde(default)]
    pub from: Vec<Address>,
    #[serde(default)]
    pub sendutxo: Vec<Utxo>,
    #[serde(default)]
    pub burn: Vec<BurnEntry>,
    #[serde(default)]
    pub transfer: Vec<Transfer>,
    #[serde(default)]
    pub fee: Option<u64>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub flags: BuildFlags,
    #[serde(default)]
    pub finance_change_address: Option<Address>,
    #[serde(default = "default_transmit")]
    pub transmit: bool,
}

impl Default for BurnArgs {
    fn default() -> Self {
        Self {
            from: Vec::new(),
            sendutxo: Vec::new(),
            burn: Vec::new(),
            transfer: Vec::new(),
            fee: None,
            metadata: None,
            flags: BuildFlags::default(),
            finance_change_address: None,
            transmit: true,
        }
    }
}

impl BurnArgs {
    fn into_build_args(self, utxos: Vec<Utxo>) -> BuildArgs {
        BuildArgs {
            utxos,
            burn: self.burn,
            transfer: self.transfer,
            fee: self.fee,
            metadata: self.metadata,
            flags: self.flags,
            finance_change_address: self.finance_change_address,
            ..Default::default()
        }
    }
}

/// Built (and possibly broadcast) transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    /// Unsigned hex after construction, signed hex after transmission
    pub tx_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receiving_addresses: Vec<Transfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Builder output not modelled above (multisig outputs, colored output indexes)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<BuiltTransaction> for AssetInfo {
    fn from(built: BuiltTransaction) -> Self {
        Self {
            tx_hex: built.tx_hex,
            asset_id: built.asset_id,
            extra: built.extra,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// Signed but not broadcast
    Signed { signed_tx_hex: String },
    Transmitted(AssetInfo),
}

impl WorkflowOutcome {
    pub fn asset_info(&self) -> Option<&AssetInfo> {
        match self {
            WorkflowOutcome::Transmitted(info) => Some(info),
            WorkflowOutcome::Signed { .. } => None,
        }
    }
}

/// UTXOs spent by in-flight workflows
#[derive(Default)]
pub struct UtxoReservations {
    reserved: Mutex<HashSet<UtxoLocator>>,
}

impl UtxoReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every input, or none if any is already taken
    pub fn reserve(self: &Arc<Self>, utxos: &[Utxo]) -> Result<ReservationGuard> {
        let locators: Vec<UtxoLocator> = utxos.iter().map(Utxo::locator).collect();
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);

        let taken: Vec<String> = locators
            .iter()
            .filter(|l| reserved.contains(*l))
            .map(UtxoLocator::to_string)
            .collect();
        if !taken.is_empty() {
            return Err(DigiAssetsError::InputsReserved(taken.join(", ")));
        }

        reserved.extend(locators.iter().cloned());
        log::debug!("Reserved {} input(s)", locators.len());

        Ok(ReservationGuard {
            owner: self.clone(),
            locators,
        })
    }

    pub fn is_reserved(&self, locator: &UtxoLocator) -> bool {
        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(locator)
    }

    pub fn len(&self) -> usize {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its inputs when dropped
pub struct ReservationGuard {
    owner: Arc<UtxoReservations>,
    locators: Vec<UtxoLocator>,
}

impl ReservationGuard {
    pub fn locators(&self) -> &[UtxoLocator] {
        &self.locators
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        let mut reserved = self
            .owner
            .reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for locator in &self.locators {
            reserved.remove(locator);
        }
    }
}

pub struct TransactionWorkflow {
    keys: Arc<dyn KeyService>,
    chain: Arc<dyn ChainAdapter>,
    builder: Arc<dyn TransactionBuilder>,
    metadata: Arc<dyn MetadataProvider>,
    reservations: Arc<UtxoReservations>,
}

impl TransactionWorkflow {
    pub fn new(
        keys: Arc<dyn KeyService>,
        chain: Arc<dyn ChainAdapter>,
        builder: Arc<dyn TransactionBuilder>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            keys,
            chain,
            builder,
            metadata,
            reservations: Arc::new(UtxoReservations::new()),
        }
    }

    pub fn reservations(&self) -> Arc<UtxoReservations> {
        self.reservations.clone()
    }

    pub async fn issue_asset(&self, args: IssueArgs) -> Result<WorkflowOutcome> {
        let issue_address = args
            .issue_address
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| DigiAssetsError::invalid_arguments("Must have \"issueAddress\""))?;

        log::info!("Issuing asset from {}", issue_address);
        let utxos = self
            .chain
            .get_addresses_utxos(std::slice::from_ref(&issue_address))
            .await?;
        let _reservation = self.reservations.reserve(&utxos)?;

        let transmit = args.transmit;
        let receiving = args.transfer.clone();
        let info = self
            .build_transaction(TxKind::Issue, args.into_build_args(utxos))
            .await?;

        if !transmit {
            return self.sign_only(&info).await;
        }

        let mut info = self.sign_and_transmit(info).await?;
        info.receiving_addresses = receiving;
        info.issue_address = Some(issue_address);
        log::info!(
            "Issued asset {} in {}",
            info.asset_id.as_deref().unwrap_or("?"),
            info.txid.as_deref().unwrap_or("?")
        );
        Ok(WorkflowOutcome::Transmitted(info))
    }

    pub async fn send_asset(&self, mut args: SendArgs) -> Result<WorkflowOutcome> {
        let from = std::mem::take(&mut args.from);
        let sendutxo = std::mem::take(&mut args.sendutxo);
        let utxos = self.resolve_send_inputs(&from, sendutxo).await?;
        let _reservation = self.reservations.reserve(&utxos)?;

        let transmit = args.transmit;
        let info = self
            .build_transaction(TxKind::Send, args.into_build_args(utxos))
            .await?;
        self.finish(info, transmit).await
    }

    pub async fn burn_asset(&self, mut args: BurnArgs) -> Result<WorkflowOutcome> {
        let from = std::mem::take(&mut args.from);
        let utxos = if !from.is_empty() {
            self.chain.get_addresses_utxos(&from).await?
        } else if !args.sendutxo.is_empty() {
            std::mem::take(&mut args.sendutxo)
        } else {
            return Err(DigiAssetsError::invalid_arguments(
                "Should have from as array of addresses or sendutxo as array of utxos.",
            ));
        };
        let _reservation = self.reservations.reserve(&utxos)?;

        let transmit = args.transmit;
        let info = self
            .build_transaction(TxKind::Burn, args.into_build_args(utxos))
            .await?;
        self.finish(info, transmit).await
    }

    /// Fill defaults, upload metadata and run the builder
    pub async fn build_transaction(&self, kind: TxKind, mut args: BuildArgs) -> Result<AssetInfo> {
        args.flags.inject_previous_output = true;
        args.flags.split_change.get_or_insert(true);
        if args.finance_change_address.is_none() {
            args.finance_change_address = Some(self.keys.get_address().await?);
        }

        let args = self.metadata.upload(args).await?;

        log::debug!("Building {} transaction from {} input(s)", kind, args.utxos.len());
        let built = self
            .builder
            .build(kind, &args)
            .map_err(|e| DigiAssetsError::Construction(e.to_string()))?;

        if built.tx_hex.is_empty() {
            return Err(DigiAssetsError::MalformedResponse(
                WRONG_SERVER_RESPONSE.to_string(),
            ));
        }

        let mut info = AssetInfo::from(built);
        info.sha1 = args.sha1;
        info.sha2 = args.sha2;
        Ok(info)
    }

    /// Seed metadata, sign and broadcast
    pub async fn sign_and_transmit(&self, mut info: AssetInfo) -> Result<AssetInfo> {
        if let Some(ref sha1) = info.sha1 {
            self.metadata.seed(sha1).await?;
        }

        let signed = self.keys.sign(&info.tx_hex).await?;
        let result = self.chain.transmit(&signed).await?;

        info.tx_hex = signed;
        info.txid = Some(result.txid);
        Ok(info)
    }

    async fn sign_only(&self, info: &AssetInfo) -> Result<WorkflowOutcome> {
        let signed_tx_hex = self.keys.sign(&info.tx_hex).await?;
        Ok(WorkflowOutcome::Signed { signed_tx_hex })
    }

    async fn finish(&self, info: AssetInfo, transmit: bool) -> Result<WorkflowOutcome> {
        if transmit {
            Ok(WorkflowOutcome::Transmitted(self.sign_and_transmit(info).await?))
        } else {
            self.sign_only(&info).await
        }
    }

    /// Addresses first, else explicit UTXOs (objects, then resolved locators)
    async fn resolve_send_inputs(
        &self,
        from: &[Address],
        sendutxo: Vec<UtxoRef>,
    ) -> Result<Vec<Utxo>> {
        if !from.is_empty() {
            return self.chain.get_addresses_utxos(from).await;
        }
        if sendutxo.is_empty() {
            return Err(DigiAssetsError::invalid_arguments(
                "Must have \"from\" as array of addresses or \"sendutxo\" as array of utxos.",
            ));
        }

        let mut objects = Vec::with_capacity(sendutxo.len());
        let mut locators = Vec::new();
        for entry in sendutxo {
            match entry {
                UtxoRef::Utxo(utxo) => objects.push(utxo),
                UtxoRef::Locator(locator) => locators.push(locator.parse::<UtxoLocator>()?),
            }
        }

        if !locators.is_empty() {
            log::debug!("Resolving {} utxo locator(s)", locators.len());
            objects.extend(self.chain.get_utxos(&locators).await?);
        }
        Ok(objects)
    }
}
