//! Asset metadata cache
//!
//! Keeps the partial (display) projection of each asset's metadata in the
//! wallet data store, keyed by asset id and UTXO locator. Full records are
//! never served from the cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::MetadataProvider;
use crate::error::Result;
use crate::keys::DataStore;

/// Field used when no UTXO is given
const DEFAULT_UTXO_FIELD: &str = "0";

/// Public display subset of an asset's metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMetadata {
    #[serde(rename = "assetId", default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(rename = "assetName", default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetMetadata {
    Partial(PartialMetadata),
    /// Live record with display fields filled in from the partial projection
    Full(Value),
}

impl AssetMetadata {
    pub fn into_value(self) -> Value {
        match self {
            AssetMetadata::Partial(partial) => {
                serde_json::to_value(partial).unwrap_or(Value::Null)
            }
            AssetMetadata::Full(value) => value,
        }
    }
}

fn present<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn text(value: &Value, key: &str) -> Option<String> {
    present(value, key).and_then(Value::as_str).map(str::to_string)
}

/// Project a full metadata record onto its display fields
///
/// Reads `metadataOfUtxo`, else the issuance metadata, else the top-level
/// fields. Absent fields stay `None`.
pub fn derive_partial(metadata: &Value) -> PartialMetadata {
    let mut partial = PartialMetadata {
        asset_id: text(metadata, "assetId"),
        ..Default::default()
    };

    let scoped = present(metadata, "metadataOfUtxo")
        .or_else(|| present(metadata, "metadataOfIssuence"))
        .or_else(|| present(metadata, "metadataOfIssuance"));

    match scoped.and_then(|m| present(m, "data")) {
        Some(data) => {
            partial.asset_name = text(data, "assetName");
            partial.description = text(data, "description");
            partial.issuer = text(data, "issuer");
            if let Some(urls) = present(data, "urls").and_then(Value::as_array) {
                for url in urls {
                    match url.get("name").and_then(Value::as_str) {
                        Some("icon") => partial.icon = text(url, "url"),
                        Some("large_icon") => partial.large_icon = text(url, "url"),
                        _ => {}
                    }
                }
            }
        }
        None => {
            partial.asset_name = text(metadata, "assetName");
            partial.description = text(metadata, "description");
            partial.issuer = text(metadata, "issuer");
            partial.icon = text(metadata, "icon");
            partial.large_icon = text(metadata, "large_icon");
        }
    }

    partial
}

/// Fill display fields the full record lacks; existing keys win
fn merge_partial(full: Value, partial: &PartialMetadata) -> Value {
    let mut record = match full {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    if let Ok(Value::Object(fields)) = serde_json::to_value(partial) {
        for (key, value) in fields {
            let missing = record.get(&key).map(Value::is_null).unwrap_or(true);
            if missing {
                record.insert(key, value);
            }
        }
    }

    Value::Object(record)
}

/// Absent and empty locators share the default field
fn cache_field(utxo: Option<&str>) -> &str {
    match utxo {
        Some(utxo) if !utxo.is_empty() => utxo,
        _ => DEFAULT_UTXO_FIELD,
    }
}

pub struct AssetMetadataCache {
    store: Arc<dyn DataStore>,
    provider: Arc<dyn MetadataProvider>,
}

impl AssetMetadataCache {
    pub fn new(store: Arc<dyn DataStore>, provider: Arc<dyn MetadataProvider>) -> Self {
        Self { store, provider }
    }

    /// Metadata of `asset_id`, optionally scoped to one UTXO
    ///
    /// Partial requests are answered from the cache when possible. Full
    /// requests always fetch the live record.
    pub async fn get(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
        full: bool,
    ) -> Result<AssetMetadata> {
        if !full {
            if let Some(partial) = self.cached(asset_id, utxo).await? {
                log::debug!("Metadata cache hit for {} / {}", asset_id, cache_field(utxo));
                return Ok(AssetMetadata::Partial(partial));
            }
        }

        let scope = utxo.filter(|u| !u.is_empty());
        let record = self.provider.get_asset_metadata(asset_id, scope).await?;
        let partial = derive_partial(&record);

        self.store_in_background(asset_id, utxo, &partial);

        if full {
            Ok(AssetMetadata::Full(merge_partial(record, &partial)))
        } else {
            Ok(AssetMetadata::Partial(partial))
        }
    }

    pub async fn get_full(&self, asset_id: &str, utxo: Option<&str>) -> Result<Value> {
        Ok(self.get(asset_id, utxo, true).await?.into_value())
    }

    pub async fn get_partial(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
    ) -> Result<PartialMetadata> {
        match self.get(asset_id, utxo, false).await? {
            AssetMetadata::Partial(partial) => Ok(partial),
            AssetMetadata::Full(record) => Ok(derive_partial(&record)),
        }
    }

    /// Cached partial, or `None` on a miss or an unreadable entry
    pub async fn cached(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
    ) -> Result<Option<PartialMetadata>> {
        let Some(raw) = self.store.hget(asset_id, cache_field(utxo)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(partial) => Ok(Some(partial)),
            Err(e) => {
                log::warn!("Discarding unreadable cache entry for {}: {}", asset_id, e);
                Ok(None)
            }
        }
    }

    pub async fn set(
        &self,
        asset_id: &str,
        utxo: Option<&str>,
        partial: &PartialMetadata,
    ) -> Result<()> {
        let encoded = serde_json::to_string(partial)?;
        self.store.hset(asset_id, cache_field(utxo), encoded).await
    }

    /// Write `partial` on a spawned task; lookups never wait on the store
    fn store_in_background(&self, asset_id: &str, utxo: Option<&str>, partial: &PartialMetadata) {
        let encoded = match serde_json::to_string(partial) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Failed to encode metadata of {} for caching: {}", asset_id, e);
                return;
            }
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("Skipping metadata cache write for {}: {}", asset_id, e);
                return;
            }
        };

        let store = self.store.clone();
        let asset_id = asset_id.to_string();
        let field = cache_field(utxo).to_string();
        handle.spawn(async move {
            if let Err(e) = store.hset(&asset_id, &field, encoded).await {
                log::warn!("Failed to cache metadata for {}: {}", asset_id, e);
            }
        });
    }
}
