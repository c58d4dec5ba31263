//! # ember-types
//!
//! Core chain types for the Ember node:
//! - Signed [`Transaction`] with executor namespace, fee, nonce and expiry
//! - [`TxGroup`] reassembly for atomic multi-transaction units
//! - [`Header`] and [`Block`]
//! - Structural and fee validation shared by the mempool and rollback paths

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block;
mod transaction;

pub use block::{Block, Header};
pub use transaction::{
    Signature, SignatureKind, Transaction, TxError, TxGroup, TxResult, EXPIRE_BOUND,
    MAX_BLOCK_SIZE, MAX_TX_PER_BLOCK, MAX_TX_SIZE, MINER_ACTION, PARA_PREFIX,
};
