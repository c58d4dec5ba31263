//! Mempool error types

use ember_primitives::H256;
use thiserror::Error;

/// Mempool errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MempoolError {
    /// Transaction already resident
    #[error("transaction already exists: {0}")]
    Duplicate(H256),

    /// Global capacity reached and the incoming transaction would be the
    /// lowest-priority resident
    #[error("mempool is full (capacity: {0})")]
    PoolFull(usize),

    /// Per-account capacity reached and the incoming fee does not beat the
    /// account's lowest
    #[error("too many transactions for account (limit: {0})")]
    AccountLimitExceeded(usize),

    /// Transaction already stale at the admission reference point
    #[error("transaction expired")]
    Expired,

    /// Fee rate below the configured floor
    #[error("fee rate below minimum: {fee_rate} < {min}")]
    FeeBelowMinimum {
        /// Offered fee rate
        fee_rate: u64,
        /// Configured minimum
        min: u64,
    },

    /// Fee rate above the configured ceiling
    #[error("fee rate above maximum: {fee_rate} > {max}")]
    FeeAboveMaximum {
        /// Offered fee rate
        fee_rate: u64,
        /// Configured maximum
        max: u64,
    },

    /// Structural or fee validation failed
    #[error("transaction validation failed: {0}")]
    ValidationFailed(String),
}

impl From<ember_types::TxError> for MempoolError {
    fn from(err: ember_types::TxError) -> Self {
        match err {
            ember_types::TxError::FeeTooLow { fee, required } => {
                MempoolError::FeeBelowMinimum {
                    fee_rate: fee,
                    min: required,
                }
            }
            other => MempoolError::ValidationFailed(other.to_string()),
        }
    }
}

/// Result type for mempool operations
pub type MempoolResult<T> = Result<T, MempoolError>;
