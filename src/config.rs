//! Client settings
//!
//! Selects the network, the backend endpoints and the event mode.
//! Defaults to mainnet hosts; `from_env()` reads overrides from the
//! environment (and a `.env` file when present).

use std::env;
use std::time::Duration;

pub const MAINNET_API_URL: &str = "https://api.digiassets.net/v3";
pub const TESTNET_API_URL: &str = "https://testnetapi.digiassets.net/v3";
pub const MAINNET_EXPLORER_URL: &str = "https://explorerapi.digiassets.net";
pub const TESTNET_EXPLORER_URL: &str = "https://testnetexplorerapi.digiassets.net";
pub const METADATA_SERVER_URL: &str = "https://metadata.digiassets.net";
pub const VERIFIER_URL: &str = "https://www.coloredcoins.org/explorer/verify/api.php";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "testnet" => Network::Testnet,
            "mainnet" | "" => Network::Mainnet,
            other => {
                log::warn!("Unknown network '{}', defaulting to mainnet", other);
                Network::Mainnet
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub network: Network,
    /// Colored-coins API (asset metadata lookups)
    pub api_url: String,
    /// Block explorer REST API, also the source of push channels
    pub explorer_url: String,
    /// When set, the full node becomes the chain adapter
    pub full_node_url: Option<String>,
    pub full_node_user: Option<String>,
    pub full_node_password: Option<String>,
    pub metadata_url: String,
    pub verifier_url: String,
    /// Master switch for transaction and progress subscriptions
    pub events: bool,
    /// Route events through the adapter's bulk stream even without a full node
    pub events_secure: bool,
    /// Deliver transactions that touch no wallet address
    pub all_transactions: bool,
    /// Ask the backend to rescan when the initial address set is imported
    pub reindex: bool,
    pub request_timeout: Duration,
    /// Full node readiness probe and progress poll period
    pub progress_interval: Duration,
}

impl Settings {
    /// Settings with the default hosts of `network`
    pub fn for_network(network: Network) -> Self {
        let (api_url, explorer_url) = match network {
            Network::Mainnet => (MAINNET_API_URL, MAINNET_EXPLORER_URL),
            Network::Testnet => (TESTNET_API_URL, TESTNET_EXPLORER_URL),
        };

        Self {
            network,
            api_url: api_url.to_string(),
            explorer_url: explorer_url.to_string(),
            full_node_url: None,
            full_node_user: None,
            full_node_password: None,
            metadata_url: METADATA_SERVER_URL.to_string(),
            verifier_url: VERIFIER_URL.to_string(),
            events: false,
            events_secure: false,
            all_transactions: false,
            reindex: false,
            request_timeout: Duration::from_secs(30),
            progress_interval: Duration::from_secs(5),
        }
    }

    /// Load settings from environment variables
    ///
    /// Environment variables:
    /// - `DIGIASSETS_NETWORK`: "mainnet" (default) or "testnet"
    /// - `DIGIASSETS_API_URL`, `DIGIASSETS_EXPLORER_URL`, `DIGIASSETS_METADATA_URL`,
    ///   `DIGIASSETS_VERIFIER_URL`: endpoint overrides
    /// - `DIGIASSETS_FULL_NODE_URL` (+ `_USER`, `_PASSWORD`): use a full node backend
    /// - `DIGIASSETS_EVENTS`, `DIGIASSETS_EVENTS_SECURE`, `DIGIASSETS_ALL_TRANSACTIONS`,
    ///   `DIGIASSETS_REINDEX`: boolean flags ("1"/"true"/"yes")
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let network = Network::parse(&env::var("DIGIASSETS_NETWORK").unwrap_or_default());
        let mut settings = Self::for_network(network);
        log::info!("Using {:?} network", network);

        if let Ok(url) = env::var("DIGIASSETS_API_URL") {
            settings.api_url = url;
        }
        if let Ok(url) = env::var("DIGIASSETS_EXPLORER_URL") {
            settings.explorer_url = url;
        }
        if let Ok(url) = env::var("DIGIASSETS_METADATA_URL") {
            settings.metadata_url = url;
        }
        if let Ok(url) = env::var("DIGIASSETS_VERIFIER_URL") {
            settings.verifier_url = url;
        }
        log::info!("Block explorer: {}", settings.explorer_url);

        settings.full_node_url = env::var("DIGIASSETS_FULL_NODE_URL").ok();
        settings.full_node_user = env::var("DIGIASSETS_FULL_NODE_USER").ok();
        settings.full_node_password = env::var("DIGIASSETS_FULL_NODE_PASSWORD").ok();
        if let Some(ref url) = settings.full_node_url {
            log::info!("Full node: {}", url);
        }

        settings.events = env_flag("DIGIASSETS_EVENTS");
        settings.events_secure = env_flag("DIGIASSETS_EVENTS_SECURE");
        settings.all_transactions = env_flag("DIGIASSETS_ALL_TRANSACTIONS");
        settings.reindex = env_flag("DIGIASSETS_REINDEX");

        settings
    }

    pub fn uses_full_node(&self) -> bool {
        self.full_node_url.is_some()
    }

    /// Shared HTTP client for every backend
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_network(Network::Mainnet)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
