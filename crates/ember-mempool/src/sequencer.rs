//! Nonce sequencing for Ethereum-style signed transactions.
//!
//! Block assembly must receive a sender's EthSecp256k1 transactions in
//! strictly increasing nonce order starting at the sender's next expected
//! nonce. Transactions past a gap stay in the pool and are simply withheld
//! this round. Parallel-chain transactions are excluded: this node cannot
//! know their nonce state, so they pass through untouched along with every
//! other non-matching transaction.

use crate::traits::NonceOracle;
use ember_primitives::Address;
use ember_types::Transaction;
use std::collections::BTreeMap;

/// Reorder/filter a query result so that each sender's Ethereum-style
/// transactions form the maximal consecutive nonce run from the expected
/// nonce. Non-matching transactions keep their relative order.
pub fn sort_eth_sign_txs(txs: Vec<Transaction>, oracle: &dyn NonceOracle) -> Vec<Transaction> {
    let mut merged = Vec::with_capacity(txs.len());
    let mut eth_txs: BTreeMap<Address, Vec<Transaction>> = BTreeMap::new();

    for tx in txs {
        if tx.is_eth_signed() && !tx.is_para() {
            eth_txs.entry(tx.sender).or_default().push(tx);
        } else {
            merged.push(tx);
        }
    }
    if eth_txs.is_empty() {
        return merged;
    }

    for (sender, mut list) in eth_txs {
        list.sort_by_key(|tx| tx.nonce);
        let expected = match oracle.next_nonce(&sender) {
            Ok(nonce) => nonce,
            Err(err) => {
                tracing::warn!("next nonce lookup failed for {}: {}", sender, err);
                0
            }
        };
        if list.first().map(|tx| tx.nonce) != Some(expected) {
            continue;
        }
        let mut prev = expected;
        for (i, tx) in list.into_iter().enumerate() {
            if i > 0 {
                if tx.nonce != prev + 1 {
                    break;
                }
                prev = tx.nonce;
            }
            merged.push(tx);
        }
    }

    merged
}
