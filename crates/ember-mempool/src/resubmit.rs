//! Delayed-transaction resubmitter.
//!
//! Transactions that become valid only later (e.g. unlocked or scheduled
//! by contract logic) arrive over the pool's delay channel and are pushed
//! through the normal submission entry point. A submission that fails
//! because the pool is full is buffered and retried every second until it
//! lands; any other rejection is final.

use crate::error::MempoolError;
use crate::pool::Mempool;
use crate::traits::TxSubmitter;
use crossbeam_channel::{select, tick};
use ember_types::Transaction;
use std::sync::Arc;
use std::time::Duration;

const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Drain the delay channel until shutdown, retrying saturation rejects
pub(crate) fn resubmit_loop(pool: Arc<Mempool>, submitter: Arc<dyn TxSubmitter>) {
    let done = pool.shutdown_rx();
    let delay_rx = pool.delay_receiver();
    let ticker = tick(DRAIN_INTERVAL);
    let mut pending: Vec<Transaction> = Vec::new();

    loop {
        select! {
            recv(done) -> _ => break,
            recv(delay_rx) -> msg => {
                let Ok(txs) = msg else { break };
                submit_batch(txs, submitter.as_ref(), &mut pending);
            }
            recv(ticker) -> _ => {
                if pending.is_empty() {
                    continue;
                }
                let retry = std::mem::take(&mut pending);
                tracing::debug!("retrying {} delayed transactions", retry.len());
                submit_batch(retry, submitter.as_ref(), &mut pending);
            }
        }
    }
    tracing::info!("delayed-tx resubmitter quit");
}

fn submit_batch(txs: Vec<Transaction>, submitter: &dyn TxSubmitter, pending: &mut Vec<Transaction>) {
    for tx in txs {
        match submitter.submit(tx.clone()) {
            Ok(()) => {}
            Err(MempoolError::PoolFull(_)) => pending.push(tx),
            Err(err) => {
                tracing::warn!("delayed transaction rejected: {}", err);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::error::MempoolResult;
    use ember_primitives::H256;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Submitter that reports pool saturation for the first `full_calls`
    /// submissions, then accepts everything.
    pub(crate) struct CountingSubmitter {
        pub accepted: Mutex<Vec<H256>>,
        full_calls: AtomicUsize,
    }

    impl CountingSubmitter {
        pub fn accepting() -> Arc<Self> {
            Self::full_for(0)
        }

        pub fn full_for(full_calls: usize) -> Arc<Self> {
            Arc::new(Self {
                accepted: Mutex::new(Vec::new()),
                full_calls: AtomicUsize::new(full_calls),
            })
        }
    }

    impl TxSubmitter for CountingSubmitter {
        fn submit(&self, tx: Transaction) -> MempoolResult<()> {
            let remaining = self.full_calls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.full_calls.store(remaining - 1, Ordering::SeqCst);
                return Err(MempoolError::PoolFull(0));
            }
            self.accepted.lock().push(tx.hash());
            Ok(())
        }
    }
}
