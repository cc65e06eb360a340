//! Error types for DigiAssets wallet operations

use thiserror::Error;

/// Core error type for wallet orchestration
///
/// Variants follow the failure classes of a workflow: bad caller input is
/// reported before any I/O, collaborator failures pass through unchanged,
/// and shape or construction problems are turned into descriptive errors.
#[derive(Error, Debug)]
pub enum DigiAssetsError {
    /// Required argument missing or malformed
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Transport failure talking to a backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Full node reported a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A collaborator (key service, metadata server, explorer...) reported a failure
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Stage result failed a basic shape check
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Transaction builder rejected its input
    #[error("Transaction construction failed: {0}")]
    Construction(String),

    /// Inputs overlap a workflow that is still in flight
    #[error("Inputs already reserved by another workflow: {0}")]
    InputsReserved(String),

    /// Issuer verifier answered 204
    #[error("No Content")]
    NoContent,

    /// Issuer verifier answered with an unexpected status
    #[error("Issuer verification failed: {0}")]
    Verification(String),
}

impl DigiAssetsError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// True for errors raised before any collaborator was contacted
    pub fn is_invalid_arguments(&self) -> bool {
        matches!(self, Self::InvalidArguments(_))
    }
}

pub type Result<T> = std::result::Result<T, DigiAssetsError>;
