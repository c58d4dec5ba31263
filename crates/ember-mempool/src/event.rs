//! Mempool event loop.
//!
//! The node's message bus drives the pool through a single channel of
//! [`MempoolEvent`]s; query events carry a reply sender. The loop runs on
//! its own thread until shutdown or until the bus hangs up.

use crate::error::MempoolResult;
use crate::pool::{Mempool, ProperFeeRequest, TxListFilter};
use crossbeam_channel::{select, Receiver, Sender};
use ember_primitives::{Address, ShortHash, H256};
use ember_types::{Block, Transaction};
use std::sync::Arc;

/// Messages understood by the mempool event loop
pub enum MempoolEvent {
    /// Admit a transaction and broadcast it to peers on success
    PushTx {
        /// Transaction to admit
        tx: Transaction,
        /// Admission outcome
        reply: Sender<MempoolResult<()>>,
    },
    /// Priority-ordered listing for block assembly
    GetTxList {
        /// Listing bounds and dedup set
        filter: TxListFilter,
        /// Matching transactions
        reply: Sender<Vec<Transaction>>,
    },
    /// Remove the given hashes
    RemoveTxs {
        /// Hashes to drop
        hashes: Vec<H256>,
    },
    /// A block was connected to the chain
    AddBlock {
        /// The committed block
        block: Block,
    },
    /// A block was disconnected from the chain
    DelBlock {
        /// The rolled-back block
        block: Block,
    },
    /// Resident transaction count
    GetMempoolSize {
        /// Count reply
        reply: Sender<usize>,
    },
    /// Recommended fee rate for anticipated load
    GetProperFee {
        /// Anticipated load
        req: ProperFeeRequest,
        /// Recommended rate
        reply: Sender<u64>,
    },
    /// Resident transactions of the given accounts
    GetAccTxs {
        /// Accounts to query
        addrs: Vec<Address>,
        /// Matching transactions
        reply: Sender<Vec<Transaction>>,
    },
    /// Resident count for one account
    TxNumOfAccount {
        /// Account to count
        addr: Address,
        /// Count reply
        reply: Sender<usize>,
    },
    /// Most recently admitted transactions
    GetLatestTxs {
        /// Newest-first list
        reply: Sender<Vec<Transaction>>,
    },
    /// Point lookup by full hash
    GetTxsByHash {
        /// Hashes to look up
        hashes: Vec<H256>,
        /// Per-hash results
        reply: Sender<Vec<Option<Transaction>>>,
    },
    /// Point lookup by short hash
    GetTxsByShortHash {
        /// Short hashes to look up
        hashes: Vec<ShortHash>,
        /// Per-hash results
        reply: Sender<Vec<Option<Transaction>>>,
    },
    /// Hand transactions to the delayed-tx resubmitter
    DelayTxs {
        /// Transactions to submit later
        txs: Vec<Transaction>,
    },
}

/// Serve bus events until shutdown or bus disconnect
pub(crate) fn event_loop(pool: Arc<Mempool>, events: Receiver<MempoolEvent>) {
    let done = pool.shutdown_rx();
    loop {
        select! {
            recv(done) -> _ => break,
            recv(events) -> msg => {
                let Ok(event) = msg else { break };
                handle(&pool, event);
            }
        }
    }
    tracing::info!("mempool event loop quit");
}

fn handle(pool: &Mempool, event: MempoolEvent) {
    match event {
        MempoolEvent::PushTx { tx, reply } => {
            let result = push_and_broadcast(pool, tx);
            let _ = reply.send(result);
        }
        MempoolEvent::GetTxList { filter, reply } => {
            let _ = reply.send(pool.get_tx_list(&filter));
        }
        MempoolEvent::RemoveTxs { hashes } => pool.remove_txs(&hashes),
        MempoolEvent::AddBlock { block } => {
            pool.set_header(block.header);
            pool.remove_txs_of_block(&block);
        }
        MempoolEvent::DelBlock { block } => pool.rollback_block(&block),
        MempoolEvent::GetMempoolSize { reply } => {
            let _ = reply.send(pool.size());
        }
        MempoolEvent::GetProperFee { req, reply } => {
            let _ = reply.send(pool.get_proper_fee_rate(req));
        }
        MempoolEvent::GetAccTxs { addrs, reply } => {
            let _ = reply.send(pool.acc_txs(&addrs));
        }
        MempoolEvent::TxNumOfAccount { addr, reply } => {
            let _ = reply.send(pool.tx_num_of_account(&addr));
        }
        MempoolEvent::GetLatestTxs { reply } => {
            let _ = reply.send(pool.latest_txs());
        }
        MempoolEvent::GetTxsByHash { hashes, reply } => {
            let _ = reply.send(pool.get_txs_by_hash(&hashes));
        }
        MempoolEvent::GetTxsByShortHash { hashes, reply } => {
            let _ = reply.send(pool.get_txs_by_short_hash(&hashes));
        }
        MempoolEvent::DelayTxs { txs } => {
            if pool.delay_sender().try_send(txs).is_err() {
                tracing::warn!("delay channel saturated, dropping delayed batch");
            }
        }
    }
}

fn push_and_broadcast(pool: &Mempool, tx: Transaction) -> MempoolResult<()> {
    pool.check_tx(&tx)?;
    pool.push_tx(tx.clone())?;
    pool.broadcaster().broadcast_tx(&tx);
    Ok(())
}
