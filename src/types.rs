//! Chain data types shared by adapters, workflows and queries
//!
//! Field names follow the camelCase JSON the explorer and full node emit.
//! Records keep any field they do not model in `extra`, so listeners and
//! the transaction builder see everything the backend sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::DigiAssetsError;

pub type Address = String;

/// Reference to an output as `txid:index`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtxoLocator {
    pub txid: String,
    pub index: u32,
}

impl UtxoLocator {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl fmt::Display for UtxoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl FromStr for UtxoLocator {
    type Err = DigiAssetsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s.split_once(':').ok_or_else(|| {
            DigiAssetsError::invalid_arguments(format!("Invalid utxo locator '{}'", s))
        })?;
        if txid.is_empty() {
            return Err(DigiAssetsError::invalid_arguments(format!(
                "Invalid utxo locator '{}': empty txid",
                s
            )));
        }
        let index = index.parse::<u32>().map_err(|e| {
            DigiAssetsError::invalid_arguments(format!("Invalid utxo locator '{}': {}", s, e))
        })?;
        Ok(Self::new(txid, index))
    }
}

/// Asset amount carried by an output, input or UTXO
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    pub asset_id: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisibility: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptPubKey {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unspent output as reported by the chain adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub txid: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(default)]
    pub script_pub_key: ScriptPubKey,
    #[serde(default)]
    pub assets: Vec<AssetAmount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Utxo {
    pub fn locator(&self) -> UtxoLocator {
        UtxoLocator::new(self.txid.clone(), self.index)
    }

    /// First address of the output script
    pub fn owner_address(&self) -> Option<&Address> {
        self.script_pub_key.addresses.first()
    }
}

/// Caller-supplied spend input: a full UTXO or a `txid:index` string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UtxoRef {
    Locator(String),
    Utxo(Utxo),
}

impl From<Utxo> for UtxoRef {
    fn from(utxo: Utxo) -> Self {
        UtxoRef::Utxo(utxo)
    }
}

impl From<&str> for UtxoRef {
    fn from(locator: &str) -> Self {
        UtxoRef::Locator(locator.to_string())
    }
}

/// Colored-coins payload chunk attached to a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaData {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisibility: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DaData {
    pub fn is_issuance(&self) -> bool {
        self.kind == "issuance"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousOutput {
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_output: Option<PreviousOutput>,
    #[serde(default)]
    pub assets: Vec<AssetAmount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TxInput {
    pub fn previous_addresses(&self) -> &[Address] {
        self.previous_output
            .as_ref()
            .map(|p| p.addresses.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    #[serde(default)]
    pub script_pub_key: ScriptPubKey,
    #[serde(default)]
    pub assets: Vec<AssetAmount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub colored: bool,
    #[serde(default)]
    pub dadata: Vec<DaData>,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressUtxos {
    pub address: Address,
    #[serde(default)]
    pub utxos: Vec<Utxo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressTransactions {
    pub address: Address,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitResult {
    pub txid: String,
}

/// One asset entry of one wallet UTXO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHolding {
    pub address: Option<Address>,
    pub txid: String,
    pub index: u32,
    pub asset_id: String,
    pub amount: u64,
    pub issue_txid: Option<String>,
    pub divisibility: Option<u8>,
    pub lock_status: Option<bool>,
    pub aggregation_policy: Option<String>,
    pub asset_index: usize,
}

/// Asset issued by one of the wallet's addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuance {
    pub issue_txid: String,
    pub txid: String,
    pub lock_status: Option<bool>,
    pub divisibility: Option<u8>,
    pub aggregation_policy: Option<String>,
    pub amount: Option<u64>,
    pub asset_id: String,
    pub output_indexes: Vec<usize>,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: Address,
    pub utxos: Vec<Utxo>,
}

/// Backend sync/scan progress tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<u64>,
}
