/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, Sub},
    time::Duration,
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Number that uniquely identifies a blockchain.
///
/// Every block persisted into the same store should share the same `ChainID`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ChainID(u64);

impl ChainID {
    /// Create a new `ChainID` with an `int` value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the `u64` value of this `ChainID`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Height of a block in the chain.
///
/// Heights start at 1 for the first block after genesis and increase by 1 with every
/// subsequent block. The value 0 is reserved to mean "no block": an empty store
/// advertises `base == height == 0`, and the first block's
/// [`last_commit`](super::block::Block::last_commit) carries height 0.
///
/// The inner value is signed because ages of blocks are computed by subtraction, but a
/// block persisted into the store never has a negative height.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(i64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: i64) -> Self {
        Self(int)
    }

    /// Get the inner `i64` value of this `BlockHeight`.
    pub const fn int(&self) -> i64 {
        self.0
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: i64) -> Self::Output {
        BlockHeight::new(self.0 + rhs)
    }
}

impl Sub<i64> for BlockHeight {
    type Output = BlockHeight;
    fn sub(self, rhs: i64) -> Self::Output {
        BlockHeight::new(self.0 - rhs)
    }
}

/// Point in time, measured as nanoseconds since the Unix Epoch.
///
/// Block headers carry the proposer's wall clock in this form, and evidence expiry
/// compares these against the chain tip's time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new `Timestamp` from `nanos` nanoseconds since the Unix Epoch.
    pub const fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Get the inner nanoseconds-since-Unix-Epoch value of this `Timestamp`.
    pub const fn nanos(&self) -> u64 {
        self.0
    }

    /// Get the `Duration` elapsed between `earlier` and this `Timestamp`, or
    /// `Duration::ZERO` if `earlier` is not actually earlier.
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// 32-byte cryptographic hash.
///
/// Within the store, `CryptoHash`-es appear as block hashes (always SHA256), part set
/// roots, and the per-header hashes carried inside [`Header`](super::block::Header).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// Ed25519 digital signature produced by a validator.
///
/// The store persists signatures as opaque bytes; verifying them is the consensus
/// engine's business.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0[..].fmt(f)
    }
}

/// 20-byte address identifying a validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct ValidatorAddress([u8; 20]);

impl ValidatorAddress {
    /// Create a new `ValidatorAddress` wrapping `bytes`.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 20]` value of this `ValidatorAddress`.
    pub const fn bytes(&self) -> [u8; 20] {
        self.0
    }
}

/// A transaction, opaque to the store.
#[derive(Clone, PartialEq, Eq, Debug, BorshDeserialize, BorshSerialize)]
pub struct Tx(Vec<u8>);

impl Tx {
    /// Create a new `Tx` wrapping `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get a reference to the inner `Vec<u8>` of this `Tx`.
    pub const fn bytes(&self) -> &Vec<u8> {
        &self.0
    }
}
