/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The summary record describing which heights the store holds, and how it is
//! persisted.

use borsh::{BorshDeserialize, BorshSerialize};

use super::keys;
use super::kv_store::KVStore;
use super::wire;
use crate::types::basic::BlockHeight;

/// The contiguous range of heights the store holds.
///
/// `base` and `height` are both 0 if and only if the store is empty. When they are
/// nonzero, every height in `[base, height]` is retrievable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockStoreState {
    pub base: BlockHeight,
    pub height: BlockHeight,
}

/// Persist `state` under the [`BLOCK_STORE_STATE_KEY`](keys::BLOCK_STORE_STATE_KEY).
///
/// The write is synchronous: when this returns, the record — and through the engine's
/// flush, everything written before it — is durable.
///
/// # Panics
///
/// Panics if the engine rejects the write.
pub fn save_block_store_state<K: KVStore>(state: &BlockStoreState, db: &K) {
    if let Err(err) = db.set_sync(keys::BLOCK_STORE_STATE_KEY, &wire::encode(state)) {
        panic!("error persisting block store state: {}", err);
    }
}

/// Load the persisted [`BlockStoreState`], or the zero value if none was ever
/// persisted.
///
/// States persisted by versions that predate the `base` field load with `base == 0`
/// while `height > 0`; these are silently coerced to `base == 1`, which is where those
/// versions implicitly began.
///
/// # Panics
///
/// Panics if the engine read fails or the persisted record does not deserialize.
pub fn load_block_store_state<K: KVStore>(db: &K) -> BlockStoreState {
    let bytes = match db.get(keys::BLOCK_STORE_STATE_KEY) {
        Ok(bytes) => bytes,
        Err(err) => panic!("error reading block store state: {}", err),
    };
    let bytes = match bytes {
        Some(bytes) => bytes,
        None => {
            return BlockStoreState {
                base: BlockHeight::new(0),
                height: BlockHeight::new(0),
            }
        }
    };

    let mut state: BlockStoreState = wire::decode("block store state", &bytes);
    if state.height.int() > 0 && state.base.int() == 0 {
        state.base = BlockHeight::new(1);
    }
    state
}
