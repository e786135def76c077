/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte keys under which the store persists its entities, and the order-preserving
//! encoding that produces them.
//!
//! # Key families
//!
//! Six families of keys coexist in the engine's single keyspace, each beginning with a
//! distinct small-integer prefix:
//!
//! | Family          | Components after the prefix | Prefix |
//! |-----------------|-----------------------------|--------|
//! | Block meta      | height                      | 0      |
//! | Block part      | height, part index          | 1      |
//! | Block commit    | height                      | 2      |
//! | Extended commit | height                      | 3      |
//! | Seen commit     | height                      | 4      |
//! | Block hash      | hash bytes                  | 5      |
//!
//! A seventh, standalone key — the ASCII literal [`BLOCK_STORE_STATE_KEY`] — holds the
//! store's summary record.
//!
//! # Encoding
//!
//! Logical numeric order must survive byte-lexicographic comparison in the engine, and
//! concatenated components must never be ambiguous. Both properties come from a
//! self-delimiting encoding per component:
//!
//! - A nonnegative integer is one length byte `n` (0..=8) followed by the `n`-byte
//!   minimal big-endian representation of the value.
//! - A byte string escapes every `0x00` as `0x00 0xFF` and terminates with `0x00 0x01`.
//!
//! The key layout is part of the on-disk contract and must stay stable across
//! versions.

use crate::types::basic::{BlockHeight, CryptoHash};

const PREFIX_BLOCK_META: u64 = 0;
const PREFIX_BLOCK_PART: u64 = 1;
const PREFIX_BLOCK_COMMIT: u64 = 2;
const PREFIX_EXT_COMMIT: u64 = 3;
const PREFIX_SEEN_COMMIT: u64 = 4;
const PREFIX_BLOCK_HASH: u64 = 5;

/// The key under which the store's [`BlockStoreState`](super::state::BlockStoreState)
/// record lives.
pub const BLOCK_STORE_STATE_KEY: &[u8] = b"blockStore";

/// Key of the block meta at `height`.
pub fn block_meta_key(height: BlockHeight) -> Vec<u8> {
    let mut key = Vec::with_capacity(11);
    append_nonnegative_int(&mut key, PREFIX_BLOCK_META);
    append_height(&mut key, height);
    key
}

/// Key of the part at `part_index` of the block at `height`.
pub fn block_part_key(height: BlockHeight, part_index: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    append_nonnegative_int(&mut key, PREFIX_BLOCK_PART);
    append_height(&mut key, height);
    append_nonnegative_int(&mut key, part_index as u64);
    key
}

/// Key of the canonical commit **at** `height`, i.e. the `last_commit` carried by the
/// block at `height + 1`.
pub fn block_commit_key(height: BlockHeight) -> Vec<u8> {
    let mut key = Vec::with_capacity(11);
    append_nonnegative_int(&mut key, PREFIX_BLOCK_COMMIT);
    append_height(&mut key, height);
    key
}

/// Key of the extended commit at `height`.
pub fn block_ext_commit_key(height: BlockHeight) -> Vec<u8> {
    let mut key = Vec::with_capacity(11);
    append_nonnegative_int(&mut key, PREFIX_EXT_COMMIT);
    append_height(&mut key, height);
    key
}

/// Key of the locally seen commit at `height`.
pub fn seen_commit_key(height: BlockHeight) -> Vec<u8> {
    let mut key = Vec::with_capacity(11);
    append_nonnegative_int(&mut key, PREFIX_SEEN_COMMIT);
    append_height(&mut key, height);
    key
}

/// Key of the hash-index entry mapping a block's `hash` to its height.
pub fn block_hash_key(hash: &CryptoHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(38);
    append_nonnegative_int(&mut key, PREFIX_BLOCK_HASH);
    append_bytes(&mut key, &hash.bytes());
    key
}

// Heights persisted by the store are never negative; a negative height here is a bug
// in the caller.
fn append_height(key: &mut Vec<u8>, height: BlockHeight) {
    if height.int() < 0 {
        panic!("cannot encode negative height {} into a key", height);
    }
    append_nonnegative_int(key, height.int() as u64);
}

fn append_nonnegative_int(key: &mut Vec<u8>, value: u64) {
    let len = (64 - value.leading_zeros() as usize + 7) / 8;
    key.push(len as u8);
    key.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

fn append_bytes(key: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == 0x00 {
            key.push(0x00);
            key.push(0xFF);
        } else {
            key.push(byte);
        }
    }
    key.push(0x00);
    key.push(0x01);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn height(int: i64) -> BlockHeight {
        BlockHeight::new(int)
    }

    #[test]
    fn integer_encoding_is_monotonic() {
        let samples: Vec<i64> = vec![
            0,
            1,
            2,
            127,
            128,
            255,
            256,
            65_535,
            65_536,
            1 << 24,
            (1 << 24) + 1,
            i64::MAX - 1,
            i64::MAX,
        ];
        for pair in samples.windows(2) {
            let smaller = block_meta_key(height(pair[0]));
            let larger = block_meta_key(height(pair[1]));
            assert!(
                smaller < larger,
                "key of height {} is not below key of height {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn part_keys_order_by_height_then_index() {
        assert!(block_part_key(height(5), 0) < block_part_key(height(5), 1));
        assert!(block_part_key(height(5), 255) < block_part_key(height(5), 256));
        assert!(block_part_key(height(5), u32::MAX) < block_part_key(height(6), 0));
    }

    #[test]
    fn key_families_are_disjoint() {
        let h = height(42);
        let keys = vec![
            block_meta_key(h),
            block_part_key(h, 0),
            block_commit_key(h),
            block_ext_commit_key(h),
            seen_commit_key(h),
            block_hash_key(&CryptoHash::new([42; 32])),
            BLOCK_STORE_STATE_KEY.to_vec(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                    assert!(!a.starts_with(b) && !b.starts_with(a));
                }
            }
        }
    }

    #[test]
    fn hash_keys_escape_interior_zero_bytes() {
        let mut bytes = [0xAA; 32];
        bytes[3] = 0x00;
        let with_zero = block_hash_key(&CryptoHash::new(bytes));
        let without_zero = block_hash_key(&CryptoHash::new([0xAA; 32]));

        assert_ne!(with_zero, without_zero);
        assert!(with_zero < without_zero);
    }

    #[test]
    #[should_panic(expected = "negative height")]
    fn negative_height_panics() {
        block_meta_key(height(-1));
    }
}
