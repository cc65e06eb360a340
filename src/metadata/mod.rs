//! Off-chain asset metadata
//!
//! - `MetadataProvider` - upload, seed and fetch contract
//! - `HttpMetadataProvider` - metadata server + colored-coins API client
//! - `cache` - partial-metadata cache over the wallet data store

pub mod cache;

pub use cache::{derive_partial, AssetMetadataCache, PartialMetadata};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::builder::BuildArgs;
use crate::error::{DigiAssetsError, Result};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Store `args.metadata` off-chain and return the args with `sha1`/`sha2` set
    async fn upload(&self, args: BuildArgs) -> Result<BuildArgs>;

    /// Anchor the content hash so peers can fetch it once the tx is public
    async fn seed(&self, sha1: &str) -> Result<()>;

    /// Full metadata record of an asset, optionally as seen at one UTXO
    async fn get_asset_metadata(&self, asset_id: &str, utxo: Option<&str>) -> Result<Value>;
}

/// SHA-256 hex digest of the metadata's JSON encoding
pub fn metadata_digest(metadata: &Value) -> Result<String> {
    let encoded = serde_json::to_vec(metadata)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    torrent_hash: String,
    #[serde(default)]
    sha2: Option<String>,
}

pub struct HttpMetadataProvider {
    metadata_url: String,
    api_url: String,
    http: reqwest::Client,
}

impl HttpMetadataProvider {
    pub fn new(
        metadata_url: impl Into<String>,
        api_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(DigiAssetsError::collaborator(format!(
            "{} returned {}: {}",
            what, status, text
        )))
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn upload(&self, mut args: BuildArgs) -> Result<BuildArgs> {
        let Some(metadata) = args.metadata.clone() else {
            return Ok(args);
        };

        let url = format!("{}/addMetadata", self.metadata_url);
        log::debug!("Uploading asset metadata to {}", url);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "metadata": metadata }))
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(response, "metadata upload")
            .await?
            .json()
            .await?;

        let sha2 = match uploaded.sha2 {
            Some(sha2) => sha2,
            None => metadata_digest(&metadata)?,
        };
        log::info!("Metadata uploaded, torrent hash {}", uploaded.torrent_hash);
        args.sha1 = Some(uploaded.torrent_hash);
        args.sha2 = Some(sha2);
        Ok(args)
    }

    async fn seed(&self, sha1: &str) -> Result<()> {
        let url = format!("{}/shareMetadata", self.metadata_url);
        let response = self
            .http
            .post(&url)
            .query(&[("torrentHash", sha1)])
            .send()
            .await?;
        Self::check(response, "metadata seed").await?;
        log::debug!("Seeded metadata {}", sha1);
        Ok(())
    }

    async fn get_asset_metadata(&self, asset_id: &str, utxo: Option<&str>) -> Result<Value> {
        let url = match utxo {
            Some(utxo) => format!("{}/assetmetadata/{}/{}", self.api_url, asset_id, utxo),
            None => format!("{}/assetmetadata/{}", self.api_url, asset_id),
        };
        log::debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        Ok(Self::check(response, "asset metadata").await?.json().await?)
    }
}
