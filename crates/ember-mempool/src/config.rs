//! Mempool configuration

use serde::Deserialize;

/// Default per-account transaction limit
pub const DEFAULT_MAX_TX_NUM_PER_ACCOUNT: usize = 100;
/// Default expiry window in blocks
pub const DEFAULT_MAX_TX_LAST: i64 = 10;
/// Default pool capacity in transactions
pub const DEFAULT_POOL_CACHE_SIZE: usize = 10240;
/// Default minimum fee rate (per 1000 bytes)
pub const DEFAULT_MIN_TX_FEE_RATE: u64 = 100_000;
/// Default maximum fee rate (per 1000 bytes)
pub const DEFAULT_MAX_TX_FEE_RATE: u64 = 10_000_000;
/// Default maximum total fee per transaction
pub const DEFAULT_MAX_TX_FEE: u64 = 1_000_000_000;

/// Mempool configuration.
///
/// Zero-valued numeric fields are replaced by defaults when the pool is
/// constructed, so a zeroed config is a usable config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MempoolConfig {
    /// Maximum resident transactions per sender account
    #[serde(default)]
    pub max_tx_num_per_account: usize,
    /// Expiry window in blocks
    #[serde(default)]
    pub max_tx_last: i64,
    /// Global pool capacity in transactions
    #[serde(default)]
    pub pool_cache_size: usize,
    /// Minimum admissible fee rate (per 1000 bytes)
    #[serde(default)]
    pub min_tx_fee_rate: u64,
    /// Maximum admissible fee rate (per 1000 bytes)
    #[serde(default)]
    pub max_tx_fee_rate: u64,
    /// Maximum total fee per transaction
    #[serde(default)]
    pub max_tx_fee: u64,
    /// Enable tiered fee recommendation
    #[serde(default)]
    pub is_level_fee: bool,
    /// Mark the pool synced immediately instead of polling catch-up status
    #[serde(default)]
    pub force_accept: bool,
}

impl MempoolConfig {
    /// Replace zero-valued fields with defaults
    pub fn normalized(mut self) -> Self {
        if self.max_tx_num_per_account == 0 {
            self.max_tx_num_per_account = DEFAULT_MAX_TX_NUM_PER_ACCOUNT;
        }
        if self.max_tx_last == 0 {
            self.max_tx_last = DEFAULT_MAX_TX_LAST;
        }
        if self.pool_cache_size == 0 {
            self.pool_cache_size = DEFAULT_POOL_CACHE_SIZE;
        }
        if self.min_tx_fee_rate == 0 {
            self.min_tx_fee_rate = DEFAULT_MIN_TX_FEE_RATE;
        }
        if self.max_tx_fee_rate == 0 {
            self.max_tx_fee_rate = DEFAULT_MAX_TX_FEE_RATE;
        }
        if self.max_tx_fee == 0 {
            self.max_tx_fee = DEFAULT_MAX_TX_FEE;
        }
        self
    }
}
