//! Pool orchestrator.
//!
//! Owns the eviction cache, the chain-head snapshot and the single pool
//! lock; exposes admission/removal/query operations; runs the periodic
//! expiry pruner; computes recommended fee rates; and keeps the pool
//! consistent across block commits and rollbacks.

use crate::cache::{FeeQueue, QueueCache};
use crate::config::MempoolConfig;
use crate::error::MempoolResult;
use crate::event::MempoolEvent;
use crate::sequencer;
use crate::shutdown::{ReadySignal, ShutdownSignal, TaskSupervisor};
use crate::traits::{Broadcast, ChainClient, NonceOracle, TxSubmitter};
use crate::{event, resubmit, tracker};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use ember_primitives::{Address, ShortHash, H256};
use ember_types::{
    Block, Header, Transaction, TxGroup, MAX_BLOCK_SIZE, MAX_TX_PER_BLOCK, MINER_ACTION,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Height at which nonce sequencing of Ethereum-style transactions
/// activates (chain parameter)
const FORK_ETH_TX_SORT: i64 = 0;

/// Interval of the expiry pruner
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Capacity of the delayed-transaction channel
const DELAY_CHAN_CAP: usize = 16;

/// Height reported before the first header fetch completes
pub const UNKNOWN_HEIGHT: i64 = -1;

/// Query filter for [`Mempool::get_tx_list`]
#[derive(Clone, Debug, Default)]
pub struct TxListFilter {
    /// Maximum transactions to return; 0 = unbounded
    pub count: usize,
    /// Hashes the caller already holds
    pub exclude: Vec<H256>,
    /// Skip expiry filtering (full inventory listing)
    pub include_all: bool,
}

/// Anticipated load for a fee-rate recommendation
#[derive(Clone, Copy, Debug, Default)]
pub struct ProperFeeRequest {
    /// Additional transactions expected; 0 = default 20
    pub tx_count: i32,
    /// Additional bytes expected; 0 = default 10240
    pub tx_size: i32,
}

/// State guarded by the single pool lock
struct PoolInner {
    header: Option<Header>,
    synced: bool,
    cache: Box<dyn QueueCache>,
}

/// The pending-transaction pool
pub struct Mempool {
    cfg: MempoolConfig,
    inner: RwLock<PoolInner>,
    shutdown: ShutdownSignal,
    supervisor: TaskSupervisor,
    header_ready: ReadySignal,
    sync_ready: ReadySignal,
    chain: Arc<dyn ChainClient>,
    broadcast: Arc<dyn Broadcast>,
    nonce_oracle: Arc<dyn NonceOracle>,
    delay_tx: Sender<Vec<Transaction>>,
    delay_rx: Receiver<Vec<Transaction>>,
}

impl Mempool {
    /// Create a pool with the default fee-ordered cache
    pub fn new(
        cfg: MempoolConfig,
        chain: Arc<dyn ChainClient>,
        broadcast: Arc<dyn Broadcast>,
        nonce_oracle: Arc<dyn NonceOracle>,
    ) -> Arc<Self> {
        let cfg = cfg.normalized();
        let cache = Box::new(FeeQueue::new(&cfg));
        Self::with_cache(cfg, cache, chain, broadcast, nonce_oracle)
    }

    /// Create a pool with an alternate eviction policy
    pub fn with_cache(
        cfg: MempoolConfig,
        cache: Box<dyn QueueCache>,
        chain: Arc<dyn ChainClient>,
        broadcast: Arc<dyn Broadcast>,
        nonce_oracle: Arc<dyn NonceOracle>,
    ) -> Arc<Self> {
        let cfg = cfg.normalized();
        let (delay_tx, delay_rx) = bounded(DELAY_CHAN_CAP);
        Arc::new(Self {
            cfg,
            inner: RwLock::new(PoolInner {
                header: None,
                synced: false,
                cache,
            }),
            shutdown: ShutdownSignal::new(),
            supervisor: TaskSupervisor::new(),
            header_ready: ReadySignal::new(),
            sync_ready: ReadySignal::new(),
            chain,
            broadcast,
            nonce_oracle,
            delay_tx,
            delay_rx,
        })
    }

    /// Spawn the background loops: header poller, sync gate, expiry pruner,
    /// event loop and delayed-tx resubmitter.
    pub fn start(
        self: &Arc<Self>,
        events: Receiver<MempoolEvent>,
        submitter: Arc<dyn TxSubmitter>,
    ) {
        let pool = Arc::clone(self);
        self.supervisor
            .spawn("mempool-header", move || tracker::poll_last_header(pool));
        let pool = Arc::clone(self);
        self.supervisor
            .spawn("mempool-sync", move || tracker::check_sync(pool));
        let pool = Arc::clone(self);
        self.supervisor
            .spawn("mempool-pruner", move || prune_loop(pool));
        let pool = Arc::clone(self);
        self.supervisor
            .spawn("mempool-events", move || event::event_loop(pool, events));
        let pool = Arc::clone(self);
        self.supervisor.spawn("mempool-resubmit", move || {
            resubmit::resubmit_loop(pool, submitter)
        });
    }

    /// Pool configuration (normalized)
    pub fn config(&self) -> &MempoolConfig {
        &self.cfg
    }

    /// Sender side of the delayed-transaction channel
    pub fn delay_sender(&self) -> Sender<Vec<Transaction>> {
        self.delay_tx.clone()
    }

    pub(crate) fn delay_receiver(&self) -> Receiver<Vec<Transaction>> {
        self.delay_rx.clone()
    }

    pub(crate) fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub(crate) fn broadcaster(&self) -> &Arc<dyn Broadcast> {
        &self.broadcast
    }

    pub(crate) fn shutdown_rx(&self) -> Receiver<()> {
        self.shutdown.subscribe()
    }

    pub(crate) fn header_ready(&self) -> &ReadySignal {
        &self.header_ready
    }

    pub(crate) fn sync_ready(&self) -> &ReadySignal {
        &self.sync_ready
    }

    pub(crate) fn set_header(&self, header: Header) {
        self.inner.write().header = Some(header);
    }

    pub(crate) fn set_synced(&self, synced: bool) {
        self.inner.write().synced = synced;
    }

    /// Whether the sync gate has opened
    pub fn is_synced(&self) -> bool {
        self.inner.read().synced
    }

    /// Whether shutdown has been requested
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    /// Structural and fee validation applied before admission
    pub fn check_tx(&self, tx: &Transaction) -> MempoolResult<()> {
        tx.check(self.cfg.min_tx_fee_rate, self.cfg.max_tx_fee)?;
        Ok(())
    }

    /// Admit a transaction into the cache
    pub fn push_tx(&self, tx: Transaction) -> MempoolResult<()> {
        let mut inner = self.inner.write();
        let (height, block_time) = match &inner.header {
            Some(h) => (h.height, h.block_time),
            None => (0, 0),
        };
        inner.cache.push(tx, height, block_time)
    }

    /// Remove the given hashes; idempotent per hash
    pub fn remove_txs(&self, hashes: &[H256]) {
        let mut inner = self.inner.write();
        for hash in hashes {
            inner.cache.remove(hash);
        }
    }

    /// Drop every transaction the committed block contains
    pub fn remove_txs_of_block(&self, block: &Block) {
        let mut inner = self.inner.write();
        for tx in &block.txs {
            inner.cache.remove(&tx.hash());
        }
    }

    /// Re-admit a disconnected block's transactions.
    ///
    /// Skips a leading miner transaction, reassembles declared groups into
    /// one logical transaction, and revalidates each candidate against
    /// current policy. Candidates that fail are dropped, not propagated.
    pub fn rollback_block(&self, block: &Block) {
        if block.txs.is_empty() {
            return;
        }
        let txs = &block.txs;
        let mut i = 0;
        while i < txs.len() {
            let tx = &txs[i];
            if i == 0 && tx.action_name() == MINER_ACTION {
                i += 1;
                continue;
            }
            let group = tx.group_count as usize;
            let candidate = if group > 1 && i + group <= txs.len() {
                match TxGroup::try_from_slice(&txs[i..i + group]) {
                    Ok(g) => {
                        i += group;
                        g.into_tx()
                    }
                    Err(err) => {
                        tracing::warn!("skipping malformed group on rollback: {}", err);
                        i += 1;
                        continue;
                    }
                }
            } else {
                i += 1;
                tx.clone()
            };
            if self.check_tx(&candidate).is_err() {
                continue;
            }
            if !self.check_expire_valid(&candidate) {
                continue;
            }
            if let Err(err) = self.push_tx(candidate) {
                tracing::error!("rollback re-admission failed: {}", err);
            }
        }
    }

    /// Whether the transaction is still live at the next block
    fn check_expire_valid(&self, tx: &Transaction) -> bool {
        let inner = self.inner.read();
        match &inner.header {
            Some(h) => !tx.is_expired(h.height + 1, h.block_time),
            None => true,
        }
    }

    /// Return up to `filter.count` transactions in priority order,
    /// excluding the caller's dedup set and (unless `include_all`) expired
    /// items. Scans to exhaustion rather than stopping on raw items
    /// visited, since leading entries may be filtered out.
    pub fn get_tx_list(&self, filter: &TxListFilter) -> Vec<Transaction> {
        let mut txs = Vec::new();
        let eth_sort;
        {
            let inner = self.inner.read();
            let (ref_height, block_time) = match &inner.header {
                Some(h) => (h.height + 1, h.block_time),
                None => (0, 0),
            };
            let exclude: HashSet<H256> = filter.exclude.iter().copied().collect();
            let max_tx_last = self.cfg.max_tx_last;
            inner.cache.walk(0, &mut |item| {
                if exclude.contains(&item.hash) {
                    return true;
                }
                if !filter.include_all && item.expired(ref_height, block_time, max_tx_last) {
                    return true;
                }
                txs.push(item.tx.clone());
                !(filter.count > 0 && txs.len() >= filter.count)
            });
            eth_sort = inner
                .header
                .map(|h| h.height >= FORK_ETH_TX_SORT)
                .unwrap_or(false);
        }
        if eth_sort {
            sequencer::sort_eth_sign_txs(txs, self.nonce_oracle.as_ref())
        } else {
            txs
        }
    }

    /// Batch point lookup by full hash; full detail, no expiry filtering
    pub fn get_txs_by_hash(&self, hashes: &[H256]) -> Vec<Option<Transaction>> {
        let inner = self.inner.read();
        hashes
            .iter()
            .map(|h| inner.cache.get_by_hash(h).map(|item| item.tx.clone()))
            .collect()
    }

    /// Batch point lookup by short hash
    pub fn get_txs_by_short_hash(&self, hashes: &[ShortHash]) -> Vec<Option<Transaction>> {
        let inner = self.inner.read();
        hashes
            .iter()
            .map(|h| inner.cache.get_by_short_hash(h).map(|item| item.tx.clone()))
            .collect()
    }

    /// Every resident transaction for the given accounts
    pub fn acc_txs(&self, addrs: &[Address]) -> Vec<Transaction> {
        let inner = self.inner.read();
        inner
            .cache
            .acc_txs(addrs)
            .into_iter()
            .map(|item| item.tx)
            .collect()
    }

    /// Resident count for one account
    pub fn tx_num_of_account(&self, addr: &Address) -> usize {
        self.inner.read().cache.tx_num_of_account(addr)
    }

    /// Most recently admitted transactions, newest first
    pub fn latest_txs(&self) -> Vec<Transaction> {
        self.inner.read().cache.latest_txs()
    }

    /// Total serialized bytes resident in the cache
    pub fn total_cache_bytes(&self) -> u64 {
        self.inner.read().cache.cache_bytes()
    }

    /// Resident transaction count
    pub fn size(&self) -> usize {
        self.inner.read().cache.size()
    }

    /// Recommended fee rate for `req`'s anticipated load: the greater of
    /// the cache-fill rate and (if enabled) the tiered rate, rounded up to
    /// the `min_tx_fee_rate` unit and clamped to `max_tx_fee_rate`.
    pub fn get_proper_fee_rate(&self, req: ProperFeeRequest) -> u64 {
        let count = if req.tx_count == 0 { 20 } else { req.tx_count };
        let size = if req.tx_size == 0 { 10240 } else { req.tx_size };
        let mut fee_rate = self.cache_fee_rate();
        if self.cfg.is_level_fee {
            let level = self.level_fee_rate(self.cfg.min_tx_fee_rate, count, size);
            if level > fee_rate {
                fee_rate = level;
            }
        }
        fee_rate
    }

    fn cache_fee_rate(&self) -> u64 {
        let mut fee_rate = self.inner.read().cache.proper_fee();
        let unit = self.cfg.min_tx_fee_rate;
        if unit != 0 && fee_rate % unit > 0 {
            fee_rate = (fee_rate / unit + 1) * unit;
        }
        fee_rate.min(self.cfg.max_tx_fee_rate)
    }

    /// Tiered rate from current + anticipated occupancy
    fn level_fee_rate(&self, base: u64, append_count: i32, append_size: i32) -> u64 {
        let sum_bytes = self.total_cache_bytes() + append_size as u64;
        let occupancy = (self.size() as i64) + append_count as i64;
        let fee_rate = if sum_bytes >= (MAX_BLOCK_SIZE / 20) as u64
            || occupancy >= MAX_TX_PER_BLOCK / 2
        {
            100 * base
        } else if sum_bytes >= (MAX_BLOCK_SIZE / 100) as u64
            || occupancy >= MAX_TX_PER_BLOCK / 10
        {
            10 * base
        } else {
            base
        };
        fee_rate.min(self.cfg.max_tx_fee_rate)
    }

    /// Purge stale transactions relative to the current head
    pub fn remove_expired(&self) {
        let mut inner = self.inner.write();
        let (height, block_time) = match &inner.header {
            Some(h) => (h.height, h.block_time),
            None => return,
        };
        let purged = inner.cache.remove_expired_txs(height, block_time);
        if purged > 0 {
            tracing::info!("purged {} expired transactions", purged);
        }
    }

    /// Current chain height, or [`UNKNOWN_HEIGHT`] before the first fetch
    pub fn height(&self) -> i64 {
        self.inner
            .read()
            .header
            .map(|h| h.height)
            .unwrap_or(UNKNOWN_HEIGHT)
    }

    /// Current chain-head snapshot
    pub fn header(&self) -> Option<Header> {
        self.inner.read().header
    }

    /// Block until the header is known and sync status is resolved
    pub fn wait_ready(&self) {
        self.header_ready.wait();
        self.sync_ready.wait();
    }

    /// Signal shutdown and wait for every background loop to exit.
    /// Idempotent; concurrent callers all block until teardown completes.
    pub fn close(&self) {
        if self.shutdown.signal() {
            tracing::info!("mempool closing");
        }
        self.supervisor.join_all();
    }
}

/// Ticker-driven expiry sweep, runs until shutdown
fn prune_loop(pool: Arc<Mempool>) {
    let done = pool.shutdown_rx();
    let ticker = tick(PRUNE_INTERVAL);
    loop {
        select! {
            recv(done) -> _ => break,
            recv(ticker) -> _ => {
                if pool.is_closed() {
                    break;
                }
                pool.remove_expired();
            }
        }
    }
    tracing::info!("expiry pruner quit");
}
