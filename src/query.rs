//! Read-only views over wallet UTXOs and history

use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::ChainAdapter;
use crate::error::Result;
use crate::keys::KeyService;
use crate::types::{
    Address, AddressInfo, AddressTransactions, AssetHolding, Issuance, Transaction, Utxo,
};

/// Flatten UTXO asset entries into holdings
pub fn holdings_from_utxos(utxos: &[Utxo]) -> Vec<AssetHolding> {
    utxos
        .iter()
        .flat_map(|utxo| {
            utxo.assets
                .iter()
                .enumerate()
                .map(move |(asset_index, asset)| AssetHolding {
                    address: utxo.owner_address().cloned(),
                    txid: utxo.txid.clone(),
                    index: utxo.index,
                    asset_id: asset.asset_id.clone(),
                    amount: asset.amount,
                    issue_txid: asset.issue_txid.clone(),
                    divisibility: asset.divisibility,
                    lock_status: asset.lock_status,
                    aggregation_policy: asset.aggregation_policy.clone(),
                    asset_index,
                })
        })
        .collect()
}

/// Merge per-address histories; a txid keeps its first position
pub fn dedup_transactions(infos: Vec<AddressTransactions>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    infos
        .into_iter()
        .flat_map(|info| info.transactions)
        .filter(|tx| seen.insert(tx.txid.clone()))
        .collect()
}

/// Issuances among `transactions` whose issuer is one of `addresses`
///
/// The issued asset is the output asset id absent from every input. The
/// issuer is the first address of the first input's previous output.
pub fn issued_assets_from_transactions(
    addresses: &[Address],
    transactions: &[Transaction],
) -> Vec<Issuance> {
    transactions
        .iter()
        .filter_map(|tx| issuance_of(addresses, tx))
        .collect()
}

fn issuance_of(addresses: &[Address], tx: &Transaction) -> Option<Issuance> {
    if !tx.colored {
        return None;
    }
    let dadata = tx.dadata.first().filter(|d| d.is_issuance())?;

    let input_assets: HashSet<&str> = tx
        .vin
        .iter()
        .flat_map(|input| input.assets.iter().map(|a| a.asset_id.as_str()))
        .collect();

    let mut asset_id = None;
    let mut output_indexes = Vec::new();
    for (index, output) in tx.vout.iter().enumerate() {
        for asset in &output.assets {
            if !input_assets.contains(asset.asset_id.as_str()) {
                asset_id = Some(asset.asset_id.clone());
                output_indexes.push(index);
            }
        }
    }
    let asset_id = asset_id?;

    let address = tx.vin.first()?.previous_addresses().first()?;
    if !addresses.contains(address) {
        return None;
    }

    Some(Issuance {
        issue_txid: tx.txid.clone(),
        txid: tx.txid.clone(),
        lock_status: dadata.lock_status,
        divisibility: dadata.divisibility,
        aggregation_policy: dadata.aggregation_policy.clone(),
        amount: dadata.amount,
        asset_id,
        output_indexes,
        address: address.clone(),
    })
}

pub struct AssetQueryService {
    keys: Arc<dyn KeyService>,
    chain: Arc<dyn ChainAdapter>,
}

impl AssetQueryService {
    pub fn new(keys: Arc<dyn KeyService>, chain: Arc<dyn ChainAdapter>) -> Self {
        Self { keys, chain }
    }

    /// UTXOs of every wallet address
    pub async fn get_utxos(&self) -> Result<Vec<Utxo>> {
        let addresses = self.keys.get_addresses().await?;
        self.chain.get_addresses_utxos(&addresses).await
    }

    pub async fn get_assets(&self) -> Result<Vec<AssetHolding>> {
        let utxos = self.get_utxos().await?;
        Ok(holdings_from_utxos(&utxos))
    }

    /// History of `addresses`, or of the whole wallet when `None`
    pub async fn get_transactions(
        &self,
        addresses: Option<&[Address]>,
    ) -> Result<Vec<Transaction>> {
        let infos = match addresses {
            Some(addresses) => self.chain.get_addresses_transactions(addresses).await?,
            None => {
                let addresses = self.keys.get_addresses().await?;
                self.chain.get_addresses_transactions(&addresses).await?
            }
        };
        let transactions = dedup_transactions(infos);
        log::debug!("Fetched {} distinct transaction(s)", transactions.len());
        Ok(transactions)
    }

    /// Assets issued by the wallet, from `transactions` or the wallet history
    pub async fn get_issued_assets(
        &self,
        transactions: Option<Vec<Transaction>>,
    ) -> Result<Vec<Issuance>> {
        let addresses = self.keys.get_addresses().await?;
        let transactions = match transactions {
            Some(transactions) => transactions,
            None => self.get_transactions(Some(&addresses)).await?,
        };
        Ok(issued_assets_from_transactions(&addresses, &transactions))
    }

    pub async fn get_address_info(&self, address: &str) -> Result<AddressInfo> {
        let address = address.to_string();
        let utxos = self
            .chain
            .get_addresses_utxos(std::slice::from_ref(&address))
            .await?;
        Ok(AddressInfo { address, utxos })
    }
}
