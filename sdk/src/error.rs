// ============ Errors ============

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The owner's free cells do not cover the requested capacity or token amount.
    #[error("insufficient {asset}: required {required}, collected {collected} (owner lock 0x{owner_lock_hash})")]
    InsufficientFunds {
        asset: String,
        required: u128,
        collected: u128,
        owner_lock_hash: String,
    },

    /// Rejected before touching the repository.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The ledger view is inconsistent with the order protocol.
    #[error("protocol violation in tx 0x{tx_hash}: {detail}")]
    ProtocolViolation { tx_hash: String, detail: String },

    #[error("repository failure: {0}")]
    Repository(String),

    #[error("fee estimation did not converge after {iterations} iterations (last fee {last_fee})")]
    FeeNotConverged { iterations: usize, last_fee: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl SdkError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        SdkError::MalformedRequest(msg.into())
    }

    pub fn protocol(tx_hash: &[u8; 32], detail: impl Into<String>) -> Self {
        SdkError::ProtocolViolation {
            tx_hash: hex::encode(tx_hash),
            detail: detail.into(),
        }
    }

    /// User-facing and retryable once the owner has more funds
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, SdkError::InsufficientFunds { .. })
    }
}

impl From<config::ConfigError> for SdkError {
    fn from(err: config::ConfigError) -> Self {
        SdkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Codec(format!("json: {}", err))
    }
}
