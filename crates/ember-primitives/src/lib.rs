//! # ember-primitives
//!
//! Primitive types shared across the Ember node:
//! - [`H256`]: 32-byte transaction/block hash
//! - [`ShortHash`]: truncated 8-byte hash used for low-bandwidth peer lookup
//! - [`Address`]: 20-byte account address

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;

pub use address::{Address, AddressError};
pub use hash::{HashError, ShortHash, H256};
