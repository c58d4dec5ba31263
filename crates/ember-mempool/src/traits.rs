//! Collaborator contracts required by the mempool.
//!
//! The chain-state provider, peer-broadcast layer, nonce oracle and
//! submission entry point are external modules; the pool only depends on
//! these traits and is handed implementations at construction.

use crate::error::MempoolResult;
use ember_primitives::Address;
use ember_types::{Header, Transaction};
use thiserror::Error;

/// Failure of a synchronous collaborator query
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    /// Collaborator unreachable or timed out
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Result type for collaborator queries
pub type ClientResult<T> = Result<T, ClientError>;

/// Chain-state provider: current head and catch-up status.
///
/// Implementations must bound call latency; the pool treats failures as
/// retryable (one-shot initializers) or soft (per-call queries).
pub trait ChainClient: Send + Sync {
    /// Current chain head
    fn get_last_header(&self) -> ClientResult<Header>;
    /// Whether the node has caught up with the network
    fn is_caught_up(&self) -> ClientResult<bool>;
}

/// Peer-broadcast layer. Both calls are fire-and-forget.
pub trait Broadcast: Send + Sync {
    /// Forward an admitted transaction to peers
    fn broadcast_tx(&self, tx: &Transaction);
    /// Announce sync status on first catch-up
    fn notify_sync(&self, synced: bool);
}

/// Next-expected-nonce source for the Ethereum-style signature scheme.
///
/// Implementations must bound latency to ~2s; callers fall back to 0 on
/// failure.
pub trait NonceOracle: Send + Sync {
    /// Next expected nonce for the address
    fn next_nonce(&self, addr: &Address) -> ClientResult<i64>;
}

/// External submission entry point used by the delayed-tx resubmitter.
///
/// Must report pool saturation as [`crate::MempoolError::PoolFull`] so the
/// resubmitter can distinguish it from permanent failures.
pub trait TxSubmitter: Send + Sync {
    /// Validate and admit a transaction
    fn submit(&self, tx: Transaction) -> MempoolResult<()>;
}
