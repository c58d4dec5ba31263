//! Transaction types for Ember

use bytes::Bytes;
use ember_primitives::{Address, H256};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum serialized block size in bytes
pub const MAX_BLOCK_SIZE: usize = 20 * 1024 * 1024;

/// Maximum number of transactions packed into one block
pub const MAX_TX_PER_BLOCK: i64 = 1600;

/// Maximum serialized transaction size in bytes
pub const MAX_TX_SIZE: usize = 100 * 1024;

/// Expire values at or below this bound are block heights, above it
/// they are unix timestamps.
pub const EXPIRE_BOUND: i64 = 1_000_000_000;

/// Action name carried by miner/coinbase transactions
pub const MINER_ACTION: &str = "miner";

/// Executor namespace prefix for parallel-chain transactions
pub const PARA_PREFIX: &str = "user.p.";

/// Transaction validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Missing or structurally invalid signature
    #[error("invalid signature")]
    InvalidSignature,
    /// Empty executor name
    #[error("invalid executor name")]
    InvalidExecer,
    /// Serialized size exceeds the per-transaction limit
    #[error("transaction too large: {0} bytes")]
    TxTooLarge(usize),
    /// Fee below the size-scaled minimum
    #[error("fee too low: {fee}, required {required}")]
    FeeTooLow {
        /// Declared fee
        fee: u64,
        /// Minimum fee for this size
        required: u64,
    },
    /// Fee above the absolute ceiling
    #[error("fee too high: {fee}, limit {limit}")]
    FeeTooHigh {
        /// Declared fee
        fee: u64,
        /// Maximum allowed fee
        limit: u64,
    },
    /// Group shape does not match the declared count
    #[error("invalid transaction group: declared {declared}, got {got}")]
    InvalidGroup {
        /// Declared group size
        declared: usize,
        /// Transactions actually present
        got: usize,
    },
}

/// Result type for transaction validation
pub type TxResult<T> = Result<T, TxError>;

/// Signature scheme identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SignatureKind {
    /// Native secp256k1 signature
    #[default]
    Secp256k1 = 1,
    /// Ed25519 signature
    Ed25519 = 2,
    /// Ethereum-style secp256k1 signature; subject to nonce sequencing
    EthSecp256k1 = 3,
}

/// Signature attached to a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Signature scheme
    pub kind: SignatureKind,
    /// Signer public key
    pub pubkey: Bytes,
    /// Signature bytes
    pub signature: Bytes,
}

impl Signature {
    /// Check structural validity (non-empty key and signature)
    pub fn is_valid(&self) -> bool {
        !self.pubkey.is_empty() && !self.signature.is_empty()
    }
}

/// A signed transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Target executor namespace
    pub execer: String,
    /// Action name inside the executor (e.g. "transfer", "miner")
    pub action: String,
    /// Action payload
    pub payload: Bytes,
    /// Signature, if signed
    pub signature: Option<Signature>,
    /// Declared fee
    pub fee: u64,
    /// Sender-scoped sequence number (EthSecp256k1 scheme only)
    pub nonce: i64,
    /// Expiry: 0 = never, <= EXPIRE_BOUND = block height, else unix time
    pub expire: i64,
    /// Number of transactions in the group this one heads (0 or 1 = none)
    pub group_count: u32,
    /// Sender address
    pub sender: Address,
    /// Recipient address
    pub to: Address,
}

impl Transaction {
    /// Transaction hash: sha256 over the canonical field encoding
    pub fn hash(&self) -> H256 {
        let mut hasher = Sha256::new();
        hasher.update(self.execer.as_bytes());
        hasher.update(self.action.as_bytes());
        hasher.update(&self.payload);
        hasher.update(self.fee.to_be_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(self.expire.to_be_bytes());
        hasher.update(self.sender.as_bytes());
        hasher.update(self.to.as_bytes());
        if let Some(sig) = &self.signature {
            hasher.update([sig.kind as u8]);
            hasher.update(&sig.pubkey);
            hasher.update(&sig.signature);
        }
        let digest: [u8; 32] = hasher.finalize().into();
        H256::from_bytes(digest)
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        let sig_len = self
            .signature
            .as_ref()
            .map(|s| s.pubkey.len() + s.signature.len() + 1)
            .unwrap_or(0);
        // fixed-width fields: fee, nonce, expire, group_count, two addresses
        self.execer.len() + self.action.len() + self.payload.len() + sig_len + 8 + 8 + 8 + 4 + 40
    }

    /// Fee normalized per 1000 bytes of serialized size
    pub fn fee_rate(&self) -> u64 {
        self.fee / (self.size() as u64 / 1000 + 1)
    }

    /// Action name carried by this transaction
    pub fn action_name(&self) -> &str {
        &self.action
    }

    /// Whether this transaction is signed under the Ethereum-style scheme
    pub fn is_eth_signed(&self) -> bool {
        matches!(
            self.signature.as_ref().map(|s| s.kind),
            Some(SignatureKind::EthSecp256k1)
        )
    }

    /// Whether the executor lives in a parallel-chain namespace
    pub fn is_para(&self) -> bool {
        self.execer.starts_with(PARA_PREFIX)
    }

    /// Whether the transaction is stale at the given reference point.
    ///
    /// `expire == 0` never expires by its own clock; height/time bounds are
    /// interpreted per [`EXPIRE_BOUND`].
    pub fn is_expired(&self, height: i64, block_time: i64) -> bool {
        if self.expire == 0 {
            return false;
        }
        if self.expire <= EXPIRE_BOUND {
            self.expire <= height
        } else {
            self.expire <= block_time
        }
    }

    /// Structural and fee validation applied on admission and rollback
    /// re-admission.
    pub fn check(&self, min_fee_rate: u64, max_tx_fee: u64) -> TxResult<()> {
        match &self.signature {
            Some(sig) if sig.is_valid() => {}
            _ => return Err(TxError::InvalidSignature),
        }
        if self.execer.is_empty() {
            return Err(TxError::InvalidExecer);
        }
        let size = self.size();
        if size > MAX_TX_SIZE {
            return Err(TxError::TxTooLarge(size));
        }
        let required = min_fee_rate * (size as u64 / 1000 + 1);
        if self.fee < required {
            return Err(TxError::FeeTooLow {
                fee: self.fee,
                required,
            });
        }
        if self.fee > max_tx_fee {
            return Err(TxError::FeeTooHigh {
                fee: self.fee,
                limit: max_tx_fee,
            });
        }
        Ok(())
    }
}

/// A contiguous run of block transactions validated and admitted as one
/// atomic unit.
#[derive(Clone, Debug)]
pub struct TxGroup {
    txs: Vec<Transaction>,
}

impl TxGroup {
    /// Build a group from the slice the head transaction declares.
    ///
    /// The slice length must equal the head's `group_count`.
    pub fn try_from_slice(txs: &[Transaction]) -> TxResult<Self> {
        let declared = txs.first().map(|t| t.group_count as usize).unwrap_or(0);
        if declared < 2 || declared != txs.len() {
            return Err(TxError::InvalidGroup {
                declared,
                got: txs.len(),
            });
        }
        Ok(TxGroup { txs: txs.to_vec() })
    }

    /// Member transactions
    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    /// Collapse into one logical transaction: head identity with the
    /// group's combined fee and payload weight.
    pub fn into_tx(mut self) -> Transaction {
        let mut head = self.txs.remove(0);
        for tx in &self.txs {
            head.fee += tx.fee;
            let mut merged = head.payload.to_vec();
            merged.extend_from_slice(&tx.payload);
            head.payload = Bytes::from(merged);
        }
        head
    }
}
