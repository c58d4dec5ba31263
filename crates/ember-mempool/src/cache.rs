//! Priority/eviction cache for pooled transactions.
//!
//! The cache keeps four views over one set of items: a hash map for point
//! lookup, a per-sender list for account accounting, a short-hash index for
//! low-bandwidth peer lookup, and a fee-priority tree driving traversal,
//! eviction and fee estimation. Every mutation updates all four together.
//!
//! The cache carries no lock of its own; the orchestrator serializes access
//! through its single pool lock.

use crate::config::MempoolConfig;
use crate::error::{MempoolError, MempoolResult};
use ember_primitives::{Address, ShortHash, H256};
use ember_types::Transaction;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Number of transactions returned by the latest-N query
pub const LATEST_TX_COUNT: usize = 10;

/// Number of top-priority items averaged for the proper-fee estimate
const PROPER_FEE_WINDOW: usize = 100;

/// A pooled transaction with admission metadata
#[derive(Clone, Debug)]
pub struct TxCacheItem {
    /// The transaction
    pub tx: Transaction,
    /// Cached transaction hash
    pub hash: H256,
    /// Fee rate at admission
    pub fee_rate: u64,
    /// Serialized size in bytes
    pub size: usize,
    /// Chain height when admitted
    pub enter_height: i64,
    /// Insertion sequence; lower = older
    pub seq: u64,
}

impl TxCacheItem {
    /// Whether the item is stale at the given reference point, either by
    /// resident age in blocks or by the transaction's own expire field.
    pub fn expired(&self, ref_height: i64, block_time: i64, max_tx_last: i64) -> bool {
        ref_height - self.enter_height > max_tx_last || self.tx.is_expired(ref_height, block_time)
    }
}

/// Priority key: fee-rate descending, then insertion order ascending.
///
/// Ascending iteration over the tree therefore yields the traversal order
/// (best fee first, ties oldest-first).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct PriorityKey {
    fee_rate: u64,
    seq: u64,
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fee_rate
            .cmp(&self.fee_rate)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Capability set of the eviction engine. The orchestrator is polymorphic
/// over this trait; alternate ordering/eviction policies plug in at
/// construction.
pub trait QueueCache: Send + Sync {
    /// Admit a transaction. `height`/`block_time` are the current chain
    /// head; expiry is judged against `height + 1` since pooled
    /// transactions are candidates for the next block.
    fn push(&mut self, tx: Transaction, height: i64, block_time: i64) -> MempoolResult<()>;
    /// Remove by hash; idempotent
    fn remove(&mut self, hash: &H256);
    /// Whether a hash is resident
    fn exist(&self, hash: &H256) -> bool;
    /// Traverse items in stable priority order, skipping the first `start`.
    /// The visitor returns false to stop.
    fn walk(&self, start: usize, visitor: &mut dyn FnMut(&TxCacheItem) -> bool);
    /// Purge stale items relative to the current head; returns purge count
    fn remove_expired_txs(&mut self, height: i64, block_time: i64) -> usize;
    /// Point lookup by full hash
    fn get_by_hash(&self, hash: &H256) -> Option<&TxCacheItem>;
    /// Point lookup by short hash; collisions resolve to the first-admitted
    /// still-resident owner
    fn get_by_short_hash(&self, short: &ShortHash) -> Option<&TxCacheItem>;
    /// All resident items for the given accounts
    fn acc_txs(&self, addrs: &[Address]) -> Vec<TxCacheItem>;
    /// Resident count for one account
    fn tx_num_of_account(&self, addr: &Address) -> usize;
    /// Most recently admitted transactions, newest first, unfiltered
    fn latest_txs(&self) -> Vec<Transaction>;
    /// Total serialized bytes resident
    fn cache_bytes(&self) -> u64;
    /// Fee-rate threshold implied by the current fill level
    fn proper_fee(&self) -> u64;
    /// Resident transaction count
    fn size(&self) -> usize;
}

/// Default fee-ordered cache implementation
pub struct FeeQueue {
    max_per_account: usize,
    capacity: usize,
    max_tx_last: i64,
    min_fee_rate: u64,
    max_fee_rate: u64,
    txs: HashMap<H256, TxCacheItem>,
    accounts: HashMap<Address, Vec<H256>>,
    short_index: HashMap<ShortHash, H256>,
    priority: BTreeMap<PriorityKey, H256>,
    total_bytes: u64,
    next_seq: u64,
}

impl FeeQueue {
    /// Create a cache sized from the (normalized) config
    pub fn new(cfg: &MempoolConfig) -> Self {
        Self {
            max_per_account: cfg.max_tx_num_per_account,
            capacity: cfg.pool_cache_size,
            max_tx_last: cfg.max_tx_last,
            min_fee_rate: cfg.min_tx_fee_rate,
            max_fee_rate: cfg.max_tx_fee_rate,
            txs: HashMap::new(),
            accounts: HashMap::new(),
            short_index: HashMap::new(),
            priority: BTreeMap::new(),
            total_bytes: 0,
            next_seq: 0,
        }
    }

    fn insert(&mut self, item: TxCacheItem) {
        let hash = item.hash;
        self.accounts.entry(item.tx.sender).or_default().push(hash);
        // first writer wins on short-hash collisions
        self.short_index.entry(hash.short()).or_insert(hash);
        self.priority.insert(
            PriorityKey {
                fee_rate: item.fee_rate,
                seq: item.seq,
            },
            hash,
        );
        self.total_bytes += item.size as u64;
        self.txs.insert(hash, item);
    }

    /// Hash of the sender's lowest-fee item, ties broken oldest-first
    fn account_evict_candidate(&self, sender: &Address) -> Option<(H256, u64)> {
        let hashes = self.accounts.get(sender)?;
        hashes
            .iter()
            .filter_map(|h| self.txs.get(h))
            .min_by(|a, b| {
                a.fee_rate
                    .cmp(&b.fee_rate)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|item| (item.hash, item.fee_rate))
    }

    /// Hash of the globally lowest-fee item, ties broken oldest-first.
    ///
    /// The tree's last entry carries the lowest fee rate; a range query over
    /// that fee rate then picks the oldest holder.
    fn global_evict_candidate(&self) -> Option<(H256, u64)> {
        let (last_key, _) = self.priority.iter().next_back()?;
        let fee_rate = last_key.fee_rate;
        let lo = PriorityKey { fee_rate, seq: 0 };
        let hi = PriorityKey {
            fee_rate,
            seq: u64::MAX,
        };
        self.priority
            .range(lo..=hi)
            .next()
            .map(|(_, hash)| (*hash, fee_rate))
    }
}

impl QueueCache for FeeQueue {
    fn push(&mut self, tx: Transaction, height: i64, block_time: i64) -> MempoolResult<()> {
        let hash = tx.hash();
        if self.txs.contains_key(&hash) {
            return Err(MempoolError::Duplicate(hash));
        }
        if tx.is_expired(height + 1, block_time) {
            return Err(MempoolError::Expired);
        }
        let fee_rate = tx.fee_rate();
        if fee_rate < self.min_fee_rate {
            return Err(MempoolError::FeeBelowMinimum {
                fee_rate,
                min: self.min_fee_rate,
            });
        }
        if fee_rate > self.max_fee_rate {
            return Err(MempoolError::FeeAboveMaximum {
                fee_rate,
                max: self.max_fee_rate,
            });
        }

        // per-account capacity: displace the sender's cheapest item, but
        // only for a strictly better fee
        if self.tx_num_of_account(&tx.sender) >= self.max_per_account {
            match self.account_evict_candidate(&tx.sender) {
                Some((victim, lowest)) if fee_rate > lowest => self.remove(&victim),
                _ => return Err(MempoolError::AccountLimitExceeded(self.max_per_account)),
            }
        }

        // global capacity: displace the pool's cheapest item unless the
        // incoming one would itself be cheapest
        if self.txs.len() >= self.capacity {
            match self.global_evict_candidate() {
                Some((victim, lowest)) if fee_rate > lowest => self.remove(&victim),
                _ => return Err(MempoolError::PoolFull(self.capacity)),
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let size = tx.size();
        self.insert(TxCacheItem {
            tx,
            hash,
            fee_rate,
            size,
            enter_height: height,
            seq,
        });
        Ok(())
    }

    fn remove(&mut self, hash: &H256) {
        let item = match self.txs.remove(hash) {
            Some(item) => item,
            None => return,
        };
        if let Some(hashes) = self.accounts.get_mut(&item.tx.sender) {
            hashes.retain(|h| h != hash);
            if hashes.is_empty() {
                self.accounts.remove(&item.tx.sender);
            }
        }
        // only clear the short-hash slot if this hash owns it
        if self.short_index.get(&hash.short()) == Some(hash) {
            self.short_index.remove(&hash.short());
        }
        self.priority.remove(&PriorityKey {
            fee_rate: item.fee_rate,
            seq: item.seq,
        });
        self.total_bytes -= item.size as u64;
    }

    fn exist(&self, hash: &H256) -> bool {
        self.txs.contains_key(hash)
    }

    fn walk(&self, start: usize, visitor: &mut dyn FnMut(&TxCacheItem) -> bool) {
        for (_, hash) in self.priority.iter().skip(start) {
            let item = match self.txs.get(hash) {
                Some(item) => item,
                None => continue,
            };
            if !visitor(item) {
                break;
            }
        }
    }

    fn remove_expired_txs(&mut self, height: i64, block_time: i64) -> usize {
        let ref_height = height + 1;
        let stale: Vec<H256> = self
            .txs
            .values()
            .filter(|item| item.expired(ref_height, block_time, self.max_tx_last))
            .map(|item| item.hash)
            .collect();
        for hash in &stale {
            self.remove(hash);
        }
        stale.len()
    }

    fn get_by_hash(&self, hash: &H256) -> Option<&TxCacheItem> {
        self.txs.get(hash)
    }

    fn get_by_short_hash(&self, short: &ShortHash) -> Option<&TxCacheItem> {
        self.short_index.get(short).and_then(|h| self.txs.get(h))
    }

    fn acc_txs(&self, addrs: &[Address]) -> Vec<TxCacheItem> {
        let mut out = Vec::new();
        for addr in addrs {
            if let Some(hashes) = self.accounts.get(addr) {
                out.extend(hashes.iter().filter_map(|h| self.txs.get(h)).cloned());
            }
        }
        out
    }

    fn tx_num_of_account(&self, addr: &Address) -> usize {
        self.accounts.get(addr).map(|v| v.len()).unwrap_or(0)
    }

    fn latest_txs(&self) -> Vec<Transaction> {
        let mut items: Vec<&TxCacheItem> = self.txs.values().collect();
        items.sort_by(|a, b| b.seq.cmp(&a.seq));
        items
            .into_iter()
            .take(LATEST_TX_COUNT)
            .map(|item| item.tx.clone())
            .collect()
    }

    fn cache_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn proper_fee(&self) -> u64 {
        if self.priority.is_empty() {
            return 0;
        }
        let mut sum = 0u64;
        let mut count = 0u64;
        for key in self.priority.keys().take(PROPER_FEE_WINDOW) {
            sum += key.fee_rate;
            count += 1;
        }
        sum / count
    }

    fn size(&self) -> usize {
        self.txs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ember_types::{Signature, SignatureKind};

    fn test_config() -> MempoolConfig {
        MempoolConfig {
            max_tx_num_per_account: 2,
            max_tx_last: 10,
            pool_cache_size: 4,
            min_tx_fee_rate: 1,
            max_tx_fee_rate: 1_000_000,
            max_tx_fee: u64::MAX / 2,
            ..Default::default()
        }
    }

    fn tx(sender: u8, fee: u64, tag: u8) -> Transaction {
        Transaction {
            execer: "coins".to_string(),
            action: "transfer".to_string(),
            payload: Bytes::from(vec![tag]),
            signature: Some(Signature {
                kind: SignatureKind::Secp256k1,
                pubkey: Bytes::from_static(&[1u8; 33]),
                signature: Bytes::from_static(&[2u8; 65]),
            }),
            fee,
            nonce: 0,
            expire: 0,
            group_count: 0,
            sender: Address::from_bytes([sender; 20]),
            to: Address::from_bytes([0xff; 20]),
        }
    }

    // ==================== Admission ====================

    #[test]
    fn test_push_and_lookup() {
        let mut cache = FeeQueue::new(&test_config());
        let t = tx(1, 100, 0);
        let hash = t.hash();

        cache.push(t, 0, 0).unwrap();

        assert!(cache.exist(&hash));
        assert_eq!(cache.size(), 1);
        assert!(cache.get_by_hash(&hash).is_some());
        assert!(cache.get_by_short_hash(&hash.short()).is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut cache = FeeQueue::new(&test_config());
        let t = tx(1, 100, 0);
        cache.push(t.clone(), 0, 0).unwrap();
        assert!(matches!(
            cache.push(t, 0, 0),
            Err(MempoolError::Duplicate(_))
        ));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_expired_rejected_at_admission() {
        let mut cache = FeeQueue::new(&test_config());
        let mut t = tx(1, 100, 0);
        t.expire = 5; // block height
        assert_eq!(cache.push(t, 5, 0), Err(MempoolError::Expired));
    }

    #[test]
    fn test_fee_rate_bounds() {
        let cfg = MempoolConfig {
            min_tx_fee_rate: 50,
            max_tx_fee_rate: 200,
            ..test_config()
        };
        let mut cache = FeeQueue::new(&cfg);
        assert!(matches!(
            cache.push(tx(1, 10, 0), 0, 0),
            Err(MempoolError::FeeBelowMinimum { .. })
        ));
        assert!(matches!(
            cache.push(tx(1, 500, 1), 0, 0),
            Err(MempoolError::FeeAboveMaximum { .. })
        ));
        assert!(cache.push(tx(1, 100, 2), 0, 0).is_ok());
    }

    // ==================== Per-account eviction ====================

    #[test]
    fn test_account_limit_scenario() {
        // limit 2: fees 10 and 20 resident; 5 rejected; 30 evicts the 10
        let mut cache = FeeQueue::new(&test_config());
        let tx1 = tx(1, 10, 1);
        let tx2 = tx(1, 20, 2);
        cache.push(tx1.clone(), 0, 0).unwrap();
        cache.push(tx2.clone(), 0, 0).unwrap();

        assert_eq!(
            cache.push(tx(1, 5, 3), 0, 0),
            Err(MempoolError::AccountLimitExceeded(2))
        );
        assert_eq!(cache.size(), 2);

        let tx4 = tx(1, 30, 4);
        cache.push(tx4.clone(), 0, 0).unwrap();
        assert!(!cache.exist(&tx1.hash()));
        assert!(cache.exist(&tx2.hash()));
        assert!(cache.exist(&tx4.hash()));
        assert_eq!(cache.tx_num_of_account(&tx2.sender), 2);
    }

    #[test]
    fn test_account_eviction_equal_fee_rejected() {
        // equal fee does not displace; incoming must be strictly higher
        let mut cache = FeeQueue::new(&test_config());
        cache.push(tx(1, 10, 1), 0, 0).unwrap();
        cache.push(tx(1, 10, 2), 0, 0).unwrap();
        assert_eq!(
            cache.push(tx(1, 10, 3), 0, 0),
            Err(MempoolError::AccountLimitExceeded(2))
        );
    }

    #[test]
    fn test_account_eviction_tie_break_oldest() {
        let mut cache = FeeQueue::new(&test_config());
        let older = tx(1, 10, 1);
        let newer = tx(1, 10, 2);
        cache.push(older.clone(), 0, 0).unwrap();
        cache.push(newer.clone(), 0, 0).unwrap();

        cache.push(tx(1, 20, 3), 0, 0).unwrap();
        assert!(!cache.exist(&older.hash()));
        assert!(cache.exist(&newer.hash()));
    }

    // ==================== Global eviction ====================

    #[test]
    fn test_global_eviction_lowest_fee() {
        // capacity 4, distinct senders
        let mut cache = FeeQueue::new(&test_config());
        let low = tx(1, 10, 0);
        cache.push(low.clone(), 0, 0).unwrap();
        cache.push(tx(2, 20, 0), 0, 0).unwrap();
        cache.push(tx(3, 30, 0), 0, 0).unwrap();
        cache.push(tx(4, 40, 0), 0, 0).unwrap();

        // incoming not above the lowest: rejected
        assert_eq!(cache.push(tx(5, 10, 0), 0, 0), Err(MempoolError::PoolFull(4)));

        // higher fee displaces the cheapest resident
        cache.push(tx(5, 50, 0), 0, 0).unwrap();
        assert_eq!(cache.size(), 4);
        assert!(!cache.exist(&low.hash()));
    }

    #[test]
    fn test_global_eviction_tie_break_oldest() {
        let mut cache = FeeQueue::new(&test_config());
        let oldest = tx(1, 10, 0);
        cache.push(oldest.clone(), 0, 0).unwrap();
        cache.push(tx(2, 10, 0), 0, 0).unwrap();
        cache.push(tx(3, 10, 0), 0, 0).unwrap();
        cache.push(tx(4, 10, 0), 0, 0).unwrap();

        cache.push(tx(5, 50, 0), 0, 0).unwrap();
        assert!(!cache.exist(&oldest.hash()));
        assert_eq!(cache.size(), 4);
    }

    // ==================== Removal ====================

    #[test]
    fn test_remove_idempotent() {
        let mut cache = FeeQueue::new(&test_config());
        let t = tx(1, 100, 0);
        let hash = t.hash();
        cache.push(t, 0, 0).unwrap();

        cache.remove(&hash);
        assert!(!cache.exist(&hash));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.cache_bytes(), 0);
        assert_eq!(cache.tx_num_of_account(&Address::from_bytes([1; 20])), 0);

        cache.remove(&hash); // no-op
        assert_eq!(cache.size(), 0);
    }

    // ==================== Traversal ====================

    #[test]
    fn test_walk_priority_order() {
        let mut cache = FeeQueue::new(&test_config());
        cache.push(tx(1, 20, 0), 0, 0).unwrap();
        cache.push(tx(2, 40, 0), 0, 0).unwrap();
        cache.push(tx(3, 30, 0), 0, 0).unwrap();

        let mut fees = Vec::new();
        cache.walk(0, &mut |item| {
            fees.push(item.fee_rate);
            true
        });
        assert_eq!(fees, vec![40, 30, 20]);
    }

    #[test]
    fn test_walk_equal_fee_oldest_first() {
        let mut cache = FeeQueue::new(&test_config());
        let first = tx(1, 10, 0);
        let second = tx(2, 10, 0);
        cache.push(first.clone(), 0, 0).unwrap();
        cache.push(second.clone(), 0, 0).unwrap();

        let mut order = Vec::new();
        cache.walk(0, &mut |item| {
            order.push(item.hash);
            true
        });
        assert_eq!(order, vec![first.hash(), second.hash()]);
    }

    #[test]
    fn test_walk_start_and_stop() {
        let mut cache = FeeQueue::new(&test_config());
        cache.push(tx(1, 30, 0), 0, 0).unwrap();
        cache.push(tx(2, 20, 0), 0, 0).unwrap();
        cache.push(tx(3, 10, 0), 0, 0).unwrap();

        let mut seen = 0;
        cache.walk(1, &mut |_| {
            seen += 1;
            seen < 1
        });
        assert_eq!(seen, 1);

        let mut rest = Vec::new();
        cache.walk(1, &mut |item| {
            rest.push(item.fee_rate);
            true
        });
        assert_eq!(rest, vec![20, 10]);
    }

    // ==================== Expiry sweep ====================

    #[test]
    fn test_expiry_sweep_by_block_age() {
        let cfg = MempoolConfig {
            max_tx_last: 5,
            ..test_config()
        };
        let mut cache = FeeQueue::new(&cfg);
        cache.push(tx(1, 100, 0), 10, 0).unwrap();

        // age W at head height H+W-1: reference H+W, not yet past the window
        assert_eq!(cache.remove_expired_txs(14, 0), 0);
        assert_eq!(cache.size(), 1);

        assert_eq!(cache.remove_expired_txs(15, 0), 1);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_expiry_sweep_by_tx_expire_field() {
        let mut cache = FeeQueue::new(&test_config());
        let mut t = tx(1, 100, 0);
        t.expire = ember_types::EXPIRE_BOUND + 1000; // unix time
        cache.push(t, 0, 100).unwrap();

        assert_eq!(cache.remove_expired_txs(0, ember_types::EXPIRE_BOUND + 999), 1);
    }

    // ==================== Short hash ====================

    #[test]
    fn test_short_hash_owner_survives_other_removals() {
        let mut cache = FeeQueue::new(&test_config());
        let t = tx(1, 100, 0);
        let other = tx(2, 100, 0);
        let hash = t.hash();
        cache.push(t, 0, 0).unwrap();
        cache.push(other.clone(), 0, 0).unwrap();

        cache.remove(&other.hash());
        assert_eq!(
            cache.get_by_short_hash(&hash.short()).map(|i| i.hash),
            Some(hash)
        );
    }

    // ==================== Accessors ====================

    #[test]
    fn test_acc_txs_and_counts() {
        let mut cache = FeeQueue::new(&test_config());
        cache.push(tx(1, 10, 0), 0, 0).unwrap();
        cache.push(tx(1, 20, 1), 0, 0).unwrap();
        cache.push(tx(2, 30, 0), 0, 0).unwrap();

        let a = Address::from_bytes([1; 20]);
        let b = Address::from_bytes([2; 20]);
        assert_eq!(cache.tx_num_of_account(&a), 2);
        assert_eq!(cache.tx_num_of_account(&b), 1);
        assert_eq!(cache.acc_txs(&[a]).len(), 2);
        assert_eq!(cache.acc_txs(&[a, b]).len(), 3);
        // sum of per-account counts equals the resident total
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_latest_txs_newest_first() {
        let mut cache = FeeQueue::new(&test_config());
        let first = tx(1, 10, 0);
        let second = tx(2, 99, 0);
        cache.push(first.clone(), 0, 0).unwrap();
        cache.push(second.clone(), 0, 0).unwrap();

        let latest = cache.latest_txs();
        // insertion order, not fee order
        assert_eq!(latest[0].hash(), second.hash());
        assert_eq!(latest[1].hash(), first.hash());
    }

    #[test]
    fn test_cache_bytes_tracks_sizes() {
        let mut cache = FeeQueue::new(&test_config());
        let t = tx(1, 100, 0);
        let expected = t.size() as u64;
        cache.push(t.clone(), 0, 0).unwrap();
        assert_eq!(cache.cache_bytes(), expected);
        cache.remove(&t.hash());
        assert_eq!(cache.cache_bytes(), 0);
    }

    #[test]
    fn test_proper_fee_tracks_fill() {
        let mut cache = FeeQueue::new(&test_config());
        assert_eq!(cache.proper_fee(), 0);
        cache.push(tx(1, 10, 0), 0, 0).unwrap();
        cache.push(tx(2, 30, 0), 0, 0).unwrap();
        assert_eq!(cache.proper_fee(), 20);
    }
}
