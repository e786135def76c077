/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The evidence-expiry predicate the store consults while pruning.
//!
//! Evidence of Byzantine behavior at a height can only be committed while it is
//! younger than both bounds in [`EvidenceParams`]. While evidence at a height could
//! still be committed, the pruner keeps that height's header and commit around as
//! proving material, even though the rest of the block's data is reclaimed.

use std::time::Duration;

use crate::types::basic::{BlockHeight, Timestamp};

/// Bounds on how long evidence of Byzantine behavior remains committable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvidenceParams {
    pub max_age_num_blocks: i64,
    pub max_age_duration: Duration,
}

/// The consensus parameters the store reads. Only the evidence bounds matter here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusParams {
    pub evidence: EvidenceParams,
}

/// Snapshot of the chain state the pruner evaluates evidence expiry against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainState {
    pub last_block_height: BlockHeight,
    pub last_block_time: Timestamp,
    pub consensus_params: ConsensusParams,
}

/// Whether evidence of Byzantine behavior in the block at `height` (committed at
/// `time`) can no longer be committed to the chain whose tip is at
/// `last_block_height` / `last_block_time`.
///
/// Evidence only expires once it is too old by **both** measures.
pub fn is_evidence_expired(
    last_block_height: BlockHeight,
    last_block_time: Timestamp,
    height: BlockHeight,
    time: Timestamp,
    params: &EvidenceParams,
) -> bool {
    let age_duration = last_block_time.duration_since(time);
    let age_num_blocks = last_block_height.int() - height.int();
    age_duration > params.max_age_duration && age_num_blocks > params.max_age_num_blocks
}
