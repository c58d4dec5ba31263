//! Block and header types

use crate::Transaction;
use ember_primitives::H256;

/// Chain head snapshot: the reference point for mempool expiry decisions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Block height
    pub height: i64,
    /// Block timestamp (unix seconds)
    pub block_time: i64,
    /// Block hash
    pub hash: H256,
}

/// A block as delivered by the commit/rollback feed
#[derive(Clone, Debug)]
pub struct Block {
    /// Block header
    pub header: Header,
    /// Transactions in block order; index 0 may be a miner transaction
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Header accessor
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Hashes of every transaction in the block
    pub fn tx_hashes(&self) -> Vec<H256> {
        self.txs.iter().map(|tx| tx.hash()).collect()
    }
}
