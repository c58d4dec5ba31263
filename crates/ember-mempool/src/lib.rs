//! # ember-mempool
//!
//! Pending-transaction pool for EmberChain.
//!
//! This crate provides:
//! - Fee-rate-prioritized transaction caching with per-account and
//!   global capacity eviction
//! - Block-window and wall-clock expiry
//! - Chain-head tracking and a sync readiness gate
//! - Nonce sequencing for Ethereum-style signed transactions
//! - A delayed-transaction resubmitter
//! - A channel-driven event loop for the node's message bus
//!
//! ## Architecture
//!
//! ```text
//! +---------------------+
//! |       Mempool       |  <- one lock over {header, sync flag, cache}
//! +---------------------+
//!           |
//! +---------+-----------+
//! |      FeeQueue       |  <- hash / account / short-hash indexes
//! |  (priority BTree)   |     + fee-rate eviction order
//! +---------------------+
//!           |
//! +---------------------+
//! | header poller, sync |
//! | gate, pruner, event |  <- background threads, joined on close
//! | loop, resubmitter   |
//! +---------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use ember_mempool::{Mempool, MempoolConfig, TxListFilter};
//!
//! let pool = Mempool::new(config, chain, broadcast, nonce_oracle);
//! pool.start(event_rx, submitter);
//! pool.wait_ready();
//! pool.push_tx(tx)?;
//! let batch = pool.get_tx_list(&TxListFilter { count: 100, ..Default::default() });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod config;
mod error;
mod event;
mod pool;
mod resubmit;
mod sequencer;
mod shutdown;
mod tracker;
mod traits;

pub use cache::{FeeQueue, QueueCache, TxCacheItem};
pub use config::{
    MempoolConfig, DEFAULT_MAX_TX_FEE, DEFAULT_MAX_TX_FEE_RATE, DEFAULT_MAX_TX_LAST,
    DEFAULT_MAX_TX_NUM_PER_ACCOUNT, DEFAULT_MIN_TX_FEE_RATE, DEFAULT_POOL_CACHE_SIZE,
};
pub use error::{MempoolError, MempoolResult};
pub use event::MempoolEvent;
pub use pool::{Mempool, ProperFeeRequest, TxListFilter, UNKNOWN_HEIGHT};
pub use sequencer::sort_eth_sign_txs;
pub use shutdown::{ReadySignal, ShutdownSignal, TaskSupervisor};
pub use traits::{Broadcast, ChainClient, ClientError, ClientResult, NonceOracle, TxSubmitter};
