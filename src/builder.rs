//! Transaction builder collaborator contract
//!
//! Byte-level construction of colored-coins transactions happens in an
//! external builder. The workflow hands it a fully resolved `BuildArgs`
//! (inputs, recipients, flags, metadata hashes) and gets back unsigned hex.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::types::{Address, Utxo};

/// Error raised by a builder implementation
pub type BuilderError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Issue,
    Send,
    Burn,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxKind::Issue => "issue",
            TxKind::Send => "send",
            TxKind::Burn => "burn",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFlags {
    /// Builder copies previous-output data into each input
    #[serde(default)]
    pub inject_previous_output: bool,
    /// Split colored change from finance change; defaults to true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_change: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Recipient of an issued or sent amount
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub address: Address,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnEntry {
    pub asset_id: String,
    pub amount: u64,
}

/// Everything the builder needs for one transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArgs {
    pub utxos: Vec<Utxo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisibility: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reissueable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_policy: Option<String>,
    #[serde(default)]
    pub transfer: Vec<Transfer>,
    #[serde(default)]
    pub to: Vec<Transfer>,
    #[serde(default)]
    pub burn: Vec<BurnEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    /// Off-chain asset metadata, uploaded before construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub flags: BuildFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finance_change_address: Option<Address>,
    /// Content hash of the uploaded metadata (torrent hash)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    /// SHA-256 of the uploaded metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha2: Option<String>,
}

/// Unsigned transaction returned by the builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltTransaction {
    #[serde(default)]
    pub tx_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Synchronous, fallible transaction construction
pub trait TransactionBuilder: Send + Sync {
    fn build_issue_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError>;
    fn build_send_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError>;
    fn build_burn_transaction(&self, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError>;

    fn build(&self, kind: TxKind, args: &BuildArgs) -> Result<BuiltTransaction, BuilderError> {
        match kind {
            TxKind::Issue => self.build_issue_transaction(args),
            TxKind::Send => self.build_send_transaction(args),
            TxKind::Burn => self.build_burn_transaction(args),
        }
    }
}
