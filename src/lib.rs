//! DigiAssets: colored-coin wallet orchestration
//!
//! This crate coordinates an HD wallet, a blockchain backend, a transaction
//! builder and an off-chain metadata service to issue, transfer and burn
//! DigiAssets, and to report wallet-scoped transaction events.
//!
//! # Architecture
//!
//! - **Chain adapters**: full node (JSON-RPC) or block explorer (REST + push channels)
//! - **Event router**: bulk or per-address subscriptions, filtered to wallet transactions
//! - **Transaction workflow**: input resolution, metadata upload, build, sign, broadcast
//! - **Metadata cache**: partial asset metadata kept in the wallet data store
//! - **Queries**: holdings, history and issued assets derived from chain data
//!
//! # Example
//!
//! ```ignore
//! use digiassets::{DigiAssets, IssueArgs, Settings, ChannelHub};
//!
//! let push = Arc::new(ChannelHub::new());
//! let client = DigiAssets::new(Settings::from_env(), keys, builder, push.clone())?;
//! client.init().await?;
//!
//! let outcome = client
//!     .issue_asset(IssueArgs {
//!         issue_address: Some(address),
//!         amount: Some(1000),
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

pub mod addresses;
pub mod builder;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod metadata;
pub mod query;
pub mod types;
pub mod verifier;
pub mod workflow;

// Re-exports for convenience
pub use addresses::AddressBook;
pub use builder::{
    BuildArgs, BuildFlags, BuilderError, BuiltTransaction, BurnEntry, TransactionBuilder,
    Transfer, TxKind,
};
pub use chain::{
    BlockExplorer, ChainAdapter, ChannelHub, FullNode, ProgressHandler, PushChannel, PushHandler,
    TransactionHandler,
};
pub use client::{ClientParts, DigiAssets, Subscription};
pub use config::{Network, Settings};
pub use error::{DigiAssetsError, Result};
pub use events::{is_local_transaction, EventRouter, EventSettings};
pub use keys::{AddressHandler, DataStore, KeyService, MemoryDataStore};
pub use metadata::cache::AssetMetadata;
pub use metadata::{
    derive_partial, metadata_digest, AssetMetadataCache, HttpMetadataProvider, MetadataProvider,
    PartialMetadata,
};
pub use query::{
    dedup_transactions, holdings_from_utxos, issued_assets_from_transactions, AssetQueryService,
};
pub use types::{
    Address, AddressInfo, AddressTransactions, AssetAmount, AssetHolding, Issuance, ScanProgress,
    Transaction, TransmitResult, Utxo, UtxoLocator, UtxoRef,
};
pub use verifier::IssuerVerifier;
pub use workflow::{
    AssetInfo, BurnArgs, IssueArgs, ReservationGuard, SendArgs, TransactionWorkflow,
    UtxoReservations, WorkflowOutcome,
};
