/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The store itself: a height-indexed repository of blocks and their commit evidence.
//!
//! Three kinds of information are persisted for every block:
//! - **Block meta**: summary information about the block.
//! - **Block parts**: the chunks of the serialized block, aggregated with
//!   [`PartSet`](crate::types::block::PartSet).
//! - **Commits**: the precommit evidence for the block, under the two roles described
//!   in [`crate::types::commit`].
//!
//! The store holds all contiguous blocks between [`base`](BlockStore::base) and
//! [`height`](BlockStore::height) (inclusive). Readers that ask for a height outside
//! that range get `None`; readers that find bytes they cannot decode panic, since that
//! indicates corruption on disk.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;

use crate::evidence::{is_evidence_expired, ChainState};
use crate::logging;
use crate::types::basic::{BlockHeight, CryptoHash};
use crate::types::block::{Block, BlockMeta, Part, PartSet};
use crate::types::commit::{Commit, ExtendedCommit};

use super::keys;
use super::kv_store::{EngineError, KVStore, WriteBatch};
use super::metrics::{self, Metrics};
use super::state::{self, BlockStoreState};
use super::wire;

/// How many deleted blocks a pruning batch accumulates before it is flushed.
const PRUNE_FLUSH_INTERVAL: u64 = 1000;

/// A store of blocks and their commit evidence over a pluggable key-value engine.
///
/// All methods take `&self`; the store synchronizes internally and may be shared
/// across threads.
pub struct BlockStore<K: KVStore> {
    db: K,
    metrics: Metrics,

    // Guards only the extents below. The engine enforces fine-grained concurrency for
    // its own contents; the extents are mirrored here because the key encoding does
    // not support range scans over the held interval.
    extents: RwLock<Extents>,
}

#[derive(Clone, Copy)]
struct Extents {
    base: BlockHeight,
    height: BlockHeight,
}

/// Options for constructing a [`BlockStore`].
#[derive(Default)]
pub struct BlockStoreOptions {
    /// Metric instruments to record into. `None` means observations are discarded.
    pub metrics: Option<Metrics>,
}

impl<K: KVStore> BlockStore<K> {
    /// Open a block store over `db`, initialized to the extents that were last
    /// durably persisted.
    ///
    /// Opening never fails; corruption, if any, surfaces on the first read.
    pub fn new(db: K, options: BlockStoreOptions) -> BlockStore<K> {
        let persisted = state::load_block_store_state(&db);
        BlockStore {
            db,
            metrics: options.metrics.unwrap_or_else(Metrics::nop),
            extents: RwLock::new(Extents {
                base: persisted.base,
                height: persisted.height,
            }),
        }
    }

    /// Whether the store holds no blocks at all.
    pub fn is_empty(&self) -> bool {
        let extents = self.extents.read().unwrap();
        extents.base.int() == 0 && extents.height.int() == 0
    }

    /// The first known contiguous block height, or 0 for empty stores.
    pub fn base(&self) -> BlockHeight {
        self.extents.read().unwrap().base
    }

    /// The last known contiguous block height, or 0 for empty stores.
    pub fn height(&self) -> BlockHeight {
        self.extents.read().unwrap().height
    }

    /// The number of blocks in the store.
    pub fn size(&self) -> i64 {
        let extents = self.extents.read().unwrap();
        if extents.height.int() == 0 {
            return 0;
        }
        extents.height.int() - extents.base.int() + 1
    }

    /// The meta of the block at [`base`](Self::base), or `None` if the store is empty.
    pub fn load_base_meta(&self) -> Option<BlockMeta> {
        let base = self.base();
        if base.int() == 0 {
            return None;
        }
        self.load_block_meta(base)
    }

    /// The meta of the block at `height`, or `None` if there is none.
    pub fn load_block_meta(&self, height: BlockHeight) -> Option<BlockMeta> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK_META);
        let bytes = self.must_get(&keys::block_meta_key(height))?;
        Some(wire::decode("block meta", &bytes))
    }

    /// The block at `height` together with its meta, or `None` if there is none.
    ///
    /// A block whose meta is present but whose parts have been removed by a concurrent
    /// prune is reported as missing, never as a truncated block.
    pub fn load_block(&self, height: BlockHeight) -> Option<(Block, BlockMeta)> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK);
        let meta = self.load_block_meta(height)?;

        let mut buf = Vec::new();
        for index in 0..meta.block_id.part_set_header.total {
            let part = self.load_block_part(height, index)?;
            buf.extend_from_slice(&part.bytes);
        }
        // Meta is only ever written after all parts, so a decode failure here is
        // corruption, not a racing writer.
        let block: Block = wire::decode("block", &buf);
        Some((block, meta))
    }

    /// The block with the given `hash` together with its meta, or `None` if the hash
    /// is unknown.
    pub fn load_block_by_hash(&self, hash: &CryptoHash) -> Option<(Block, BlockMeta)> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK_BY_HASH);
        let height = self.lookup_height_by_hash(hash)?;
        self.load_block(height)
    }

    /// The meta of the block with the given `hash`, or `None` if the hash is unknown.
    pub fn load_block_meta_by_hash(&self, hash: &CryptoHash) -> Option<BlockMeta> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK_META_BY_HASH);
        let height = self.lookup_height_by_hash(hash)?;
        self.load_block_meta(height)
    }

    /// The part at `index` of the block at `height`, or `None` if there is none.
    pub fn load_block_part(&self, height: BlockHeight, index: u32) -> Option<Part> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK_PART);
        let bytes = self.must_get(&keys::block_part_key(height, index))?;
        Some(wire::decode("block part", &bytes))
    }

    /// The canonical commit **at** `height`, or `None` if there is none.
    ///
    /// This commit aggregates the +2/3 precommits for the block at `height` and was
    /// taken from the `last_commit` of the block at `height + 1` when that block was
    /// saved.
    pub fn load_block_commit(&self, height: BlockHeight) -> Option<Commit> {
        let _timer = self.metrics.time(metrics::LOAD_BLOCK_COMMIT);
        let bytes = self.must_get(&keys::block_commit_key(height))?;
        Some(wire::decode("block commit", &bytes))
    }

    /// The locally seen commit for the block at `height`, or `None` if there is none.
    ///
    /// Useful when a commit has been seen but no block at `height + 1` exists yet to
    /// carry it; replicas restarting at the tip catch up from this.
    pub fn load_seen_commit(&self, height: BlockHeight) -> Option<Commit> {
        let _timer = self.metrics.time(metrics::LOAD_SEEN_COMMIT);
        let bytes = self.must_get(&keys::seen_commit_key(height))?;
        Some(wire::decode("seen commit", &bytes))
    }

    /// The extended commit for the block at `height`, or `None` if there is none.
    ///
    /// The extended commit is not guaranteed to aggregate the same precommits as the
    /// canonical commit at this height.
    pub fn load_block_extended_commit(&self, height: BlockHeight) -> Option<ExtendedCommit> {
        let _timer = self.metrics.time(metrics::LOAD_SEEN_EXT_COMMIT);
        let bytes = self.must_get(&keys::block_ext_commit_key(height))?;
        Some(wire::decode("extended commit", &bytes))
    }

    /// Persist `block`, its `parts`, and the `seen_commit` observed for it, then
    /// advance the store's extents and durably persist them.
    ///
    /// `seen_commit` must aggregate the +2/3 precommits that committed `block`: if all
    /// replicas restart after committing it, they reload these precommits to catch up
    /// instead of stalling one height behind.
    ///
    /// # Panics
    ///
    /// Panics if `block` does not extend the store's current height contiguously (the
    /// first block saved into an empty store is exempt), if `parts` is incomplete, or
    /// if `seen_commit.height` is not the block's height.
    pub fn save_block(&self, block: &Block, parts: &PartSet, seen_commit: &Commit) {
        let _timer = self.metrics.time(metrics::SAVE_BLOCK);
        self.save_block_entries(block, parts, seen_commit);

        // Persist the new extents. This also flushes everything above to disk.
        self.save_state();
        logging::log_save_block(&block.hash(), block.header.height);
    }

    /// Like [`save_block`](Self::save_block), but for a block committed with vote
    /// extensions: the extended commit is stored under its own key and its plain
    /// projection becomes the seen commit.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as `save_block`, and additionally if any
    /// `Commit`-flagged vote in `seen_extended_commit` lacks a signed extension.
    pub fn save_block_with_extended_commit(
        &self,
        block: &Block,
        parts: &PartSet,
        seen_extended_commit: &ExtendedCommit,
    ) {
        let _timer = self.metrics.time(metrics::SAVE_SEEN_EXT_COMMIT);
        if let Err(err) = seen_extended_commit.ensure_extensions(true) {
            panic!("saving block with extensions: {}", err);
        }
        self.save_block_entries(block, parts, &seen_extended_commit.to_commit());

        let height = block.header.height;
        self.must_set(
            &keys::block_ext_commit_key(height),
            &wire::encode(seen_extended_commit),
        );

        self.save_state();
        logging::log_save_block(&block.hash(), height);
    }

    /// Store only a seen commit at `height`, without touching the store's extents.
    ///
    /// Used by state-sync bootstrap, which needs the commit in place before any block
    /// is materialized.
    pub fn save_seen_commit(
        &self,
        height: BlockHeight,
        seen_commit: &Commit,
    ) -> Result<(), StoreError> {
        let _timer = self.metrics.time(metrics::SAVE_SEEN_COMMIT);
        self.db
            .set(&keys::seen_commit_key(height), &wire::encode(seen_commit))
            .map_err(StoreError::from)
    }

    /// Remove block data up to (but not including) `target`, keeping header and
    /// commit data for heights where evidence of misbehavior could still be
    /// committed.
    ///
    /// Returns the number of blocks pruned and the evidence retain height: the lowest
    /// height whose header and commit were kept as evidence-proving material.
    pub fn prune_blocks(
        &self,
        target: BlockHeight,
        chain_state: &ChainState,
    ) -> Result<(u64, BlockHeight), StoreError> {
        let _timer = self.metrics.time(metrics::PRUNE_BLOCKS);
        if target.int() <= 0 {
            return Err(StoreError::PruneTargetNotPositive { target });
        }
        let current = *self.extents.read().unwrap();
        if target > current.height {
            return Err(StoreError::PruneTargetBeyondTip {
                target,
                height: current.height,
            });
        }
        if target < current.base {
            return Err(StoreError::PruneTargetBelowBase {
                target,
                base: current.base,
            });
        }

        let mut pruned: u64 = 0;
        let mut batch = self.db.new_batch();
        let mut evidence_retain = target;
        for h in current.base.int()..target.int() {
            let h = BlockHeight::new(h);
            let meta = match self.load_block_meta(h) {
                Some(meta) => meta,
                // Assume already deleted by an earlier, interrupted prune.
                None => continue,
            };

            // Data that proves misbehavior must outlive the block: while evidence at
            // this height is still committable, its header and commit stay behind.
            if evidence_retain == target
                && !is_evidence_expired(
                    chain_state.last_block_height,
                    chain_state.last_block_time,
                    h,
                    meta.header.time,
                    &chain_state.consensus_params.evidence,
                )
            {
                evidence_retain = h;
            }

            if h < evidence_retain {
                batch.delete(&keys::block_meta_key(h));
                batch.delete(&keys::block_commit_key(h));
            }
            batch.delete(&keys::block_hash_key(&meta.block_id.hash));
            batch.delete(&keys::seen_commit_key(h));
            for index in 0..meta.block_id.part_set_header.total {
                batch.delete(&keys::block_part_key(h, index));
            }
            pruned += 1;

            // Flush periodically so batches stay bounded.
            if pruned % PRUNE_FLUSH_INTERVAL == 0 {
                self.flush_pruned(batch, h)?;
                batch = self.db.new_batch();
            }
        }

        self.flush_pruned(batch, target)?;
        logging::log_prune_blocks(target, pruned, evidence_retain);
        Ok((pruned, evidence_retain))
    }

    /// Remove the block at the store's current height, lowering the height by one.
    pub fn delete_latest_block(&self) -> Result<(), StoreError> {
        let target_height = self.height();
        if target_height.int() == 0 {
            return Err(StoreError::DeleteOnEmptyStore);
        }

        let mut batch = self.db.new_batch();
        // Delete what is present and skip what is already missing, so that partially
        // deleted blocks get cleaned up fully.
        if let Some(meta) = self.load_block_meta(target_height) {
            batch.delete(&keys::block_hash_key(&meta.block_id.hash));
            for index in 0..meta.block_id.part_set_header.total {
                batch.delete(&keys::block_part_key(target_height, index));
            }
        }
        batch.delete(&keys::block_commit_key(target_height));
        batch.delete(&keys::seen_commit_key(target_height));
        // The meta goes last, so keys derived from it never dangle while it is gone.
        batch.delete(&keys::block_meta_key(target_height));

        {
            let mut extents = self.extents.write().unwrap();
            extents.height = target_height - 1;
        }
        self.save_state();

        batch.write_sync()?;
        logging::log_delete_latest_block(target_height);
        Ok(())
    }

    /// Close the underlying engine. Closing is idempotent; afterwards, the store's
    /// fallible operations return errors and its readers treat the engine's refusal
    /// as fatal.
    pub fn close(&self) -> Result<(), EngineError> {
        self.db.close()
    }

    // Persist everything belonging to `block` except its extended commit, then advance
    // the extents in memory. Parts are written before the meta: callers load the meta
    // as their indication that the block exists, so the block must be complete as soon
    // as the meta is visible.
    fn save_block_entries(&self, block: &Block, parts: &PartSet, seen_commit: &Commit) {
        let height = block.header.height;
        let hash = block.hash();

        let current = *self.extents.read().unwrap();
        if current.base.int() > 0 && height != current.height + 1 {
            panic!(
                "can only save contiguous blocks. Wanted {}, got {}",
                current.height + 1,
                height
            );
        }
        if !parts.is_complete() {
            panic!("can only save complete block part sets");
        }
        if height != seen_commit.height {
            panic!(
                "cannot save seen commit of a different height (block: {}, commit: {})",
                height, seen_commit.height
            );
        }

        for index in 0..parts.total() {
            let part = parts.get_part(index).unwrap();
            self.must_set(&keys::block_part_key(height, index), &wire::encode(part));
        }

        let meta = BlockMeta::new(block, parts);
        self.must_set(&keys::block_meta_key(height), &wire::encode(&meta));
        self.must_set(&keys::block_hash_key(&hash), height.to_string().as_bytes());

        // The block's own commit, stored under the height it commits (duplicated from
        // and separate from the block itself).
        self.must_set(
            &keys::block_commit_key(height - 1),
            &wire::encode(&block.last_commit),
        );

        // The seen +2/3 precommits for the block. Pruning may delete this at a later
        // height.
        self.must_set(&keys::seen_commit_key(height), &wire::encode(seen_commit));

        let mut extents = self.extents.write().unwrap();
        extents.height = height;
        if extents.base.int() == 0 {
            extents.base = height;
        }
    }

    fn lookup_height_by_hash(&self, hash: &CryptoHash) -> Option<BlockHeight> {
        let bytes = self.must_get(&keys::block_hash_key(hash))?;
        let text = std::str::from_utf8(&bytes)
            .unwrap_or_else(|err| panic!("corrupt hash index entry: {}", err));
        let height = text
            .parse::<i64>()
            .unwrap_or_else(|err| panic!("failed to extract height from {}: {}", text, err));
        Some(BlockHeight::new(height))
    }

    // Advance `base` past the heights deleted by `batch`, then write the batch
    // durably. Batches are not trusted to be atomic, so `base` moves first: a reader
    // probing a half-deleted height then observes "not found" rather than torn data.
    fn flush_pruned(&self, batch: K::WriteBatch, base: BlockHeight) -> Result<(), StoreError> {
        {
            let mut extents = self.extents.write().unwrap();
            extents.base = base;
        }
        self.save_state();

        batch.write_sync()?;
        Ok(())
    }

    fn save_state(&self) {
        let persisted = {
            let extents = self.extents.read().unwrap();
            BlockStoreState {
                base: extents.base,
                height: extents.height,
            }
        };
        state::save_block_store_state(&persisted, &self.db);
    }

    fn must_get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.db.get(key) {
            Ok(value) => value,
            Err(err) => panic!("engine read failed: {}", err),
        }
    }

    fn must_set(&self, key: &[u8], value: &[u8]) {
        if let Err(err) = self.db.set(key, value) {
            panic!("engine write failed: {}", err);
        }
    }
}

/// Operational (recoverable) error returned by the store's fallible operations.
///
/// Corruption and contract violations are not represented here: those panic, because
/// the store cannot keep its invariants once they occur.
#[derive(Debug)]
pub enum StoreError {
    /// The prune target must be greater than 0.
    PruneTargetNotPositive { target: BlockHeight },
    /// The prune target lies beyond the latest stored height.
    PruneTargetBeyondTip {
        target: BlockHeight,
        height: BlockHeight,
    },
    /// The prune target lies below the store's base.
    PruneTargetBelowBase {
        target: BlockHeight,
        base: BlockHeight,
    },
    /// The latest block of an empty store cannot be deleted.
    DeleteOnEmptyStore,
    /// The underlying engine reported an error.
    Engine { source: EngineError },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::PruneTargetNotPositive { target } => {
                write!(f, "cannot prune to non-positive height {}", target)
            }
            StoreError::PruneTargetBeyondTip { target, height } => {
                write!(
                    f,
                    "cannot prune to height {}, it is beyond the latest height {}",
                    target, height
                )
            }
            StoreError::PruneTargetBelowBase { target, base } => {
                write!(
                    f,
                    "cannot prune to height {}, it is lower than base height {}",
                    target, base
                )
            }
            StoreError::DeleteOnEmptyStore => {
                write!(f, "cannot delete the latest block of an empty store")
            }
            StoreError::Engine { source } => {
                write!(f, "engine error: {}", source)
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Engine { source } => Some(source),
            _ => None,
        }
    }
}

impl From<EngineError> for StoreError {
    fn from(source: EngineError) -> StoreError {
        StoreError::Engine { source }
    }
}
