//! Builders for the blocks, part sets, and commits the integration tests save.

use std::time::Duration;

use blockstore::evidence::{ChainState, ConsensusParams, EvidenceParams};
use blockstore::types::basic::{
    BlockHeight, ChainID, CryptoHash, SignatureBytes, Timestamp, Tx, ValidatorAddress,
};
use blockstore::types::block::{Block, BlockId, Header, PartSet};
use blockstore::types::commit::{
    BlockIdFlag, Commit, CommitSig, ExtendedCommit, ExtendedCommitSig,
};
use blockstore::{BlockStore, BlockStoreOptions};

use super::mem_db::MemDB;

pub(crate) const NANOS_PER_SEC: u64 = 1_000_000_000;

// Small parts so that every test block splits into several of them.
pub(crate) const TEST_PART_SIZE: usize = 64;

pub(crate) fn genesis_time() -> Timestamp {
    Timestamp::new(1_700_000_000 * NANOS_PER_SEC)
}

// Block times advance by one second per height.
pub(crate) fn block_time(height: i64) -> Timestamp {
    Timestamp::new(genesis_time().nanos() + height as u64 * NANOS_PER_SEC)
}

pub(crate) fn open_store(db: MemDB) -> BlockStore<MemDB> {
    BlockStore::new(db, BlockStoreOptions::default())
}

pub(crate) fn make_commit(height: i64, block_id: Option<BlockId>) -> Commit {
    Commit {
        height: BlockHeight::new(height),
        round: 0,
        block_id,
        signatures: (1..=3u8)
            .map(|validator| CommitSig {
                flag: BlockIdFlag::Commit,
                validator_address: ValidatorAddress::new([validator; 20]),
                timestamp: block_time(height),
                signature: Some(SignatureBytes::new([validator; 64])),
            })
            .collect(),
    }
}

pub(crate) fn make_extended_commit(height: i64, block_id: Option<BlockId>) -> ExtendedCommit {
    ExtendedCommit {
        height: BlockHeight::new(height),
        round: 0,
        block_id,
        extended_signatures: (1..=3u8)
            .map(|validator| ExtendedCommitSig {
                commit_sig: CommitSig {
                    flag: BlockIdFlag::Commit,
                    validator_address: ValidatorAddress::new([validator; 20]),
                    timestamp: block_time(height),
                    signature: Some(SignatureBytes::new([validator; 64])),
                },
                extension: vec![height as u8, validator],
                extension_signature: Some(SignatureBytes::new([validator + 10; 64])),
            })
            .collect(),
    }
}

pub(crate) fn make_block(
    height: i64,
    last_block_id: Option<BlockId>,
    last_commit: Commit,
) -> Block {
    let header = Header {
        chain_id: ChainID::new(7),
        height: BlockHeight::new(height),
        time: block_time(height),
        last_block_id,
        data_hash: CryptoHash::new([height as u8; 32]),
        app_hash: CryptoHash::new([!(height as u8); 32]),
        proposer_address: ValidatorAddress::new([1; 20]),
    };
    let data = (0..4u8)
        .map(|tx| Tx::new(vec![height as u8, tx, 0xAB]))
        .collect();
    Block::new(header, data, last_commit)
}

pub(crate) fn block_id_for(block: &Block, parts: &PartSet) -> BlockId {
    BlockId {
        hash: block.hash(),
        part_set_header: parts.header().clone(),
    }
}

// The empty commit carried by the first block of a chain starting at `height`.
pub(crate) fn empty_last_commit(height: i64) -> Commit {
    Commit {
        height: BlockHeight::new(height - 1),
        round: 0,
        block_id: None,
        signatures: Vec::new(),
    }
}

/// Build and save blocks `from..=to` sequentially, returning each saved block along
/// with the seen commit it was saved with.
pub(crate) fn save_chain(
    store: &BlockStore<MemDB>,
    from: i64,
    to: i64,
) -> Vec<(Block, Commit)> {
    let mut saved = Vec::new();
    let mut last_block_id = None;
    let mut last_commit = empty_last_commit(from);
    for height in from..=to {
        let block = make_block(height, last_block_id.clone(), last_commit.clone());
        let parts = PartSet::split(&block, TEST_PART_SIZE);
        let block_id = block_id_for(&block, &parts);
        let seen_commit = make_commit(height, Some(block_id.clone()));

        store.save_block(&block, &parts, &seen_commit);

        last_block_id = Some(block_id);
        last_commit = seen_commit.clone();
        saved.push((block, seen_commit));
    }
    saved
}

/// A chain-state snapshot whose tip is at `last_height`, with the given evidence
/// bounds.
pub(crate) fn make_chain_state(
    last_height: i64,
    max_age_num_blocks: i64,
    max_age_duration: Duration,
) -> ChainState {
    ChainState {
        last_block_height: BlockHeight::new(last_height),
        last_block_time: block_time(last_height),
        consensus_params: ConsensusParams {
            evidence: EvidenceParams {
                max_age_num_blocks,
                max_age_duration,
            },
        },
    }
}

/// A chain-state snapshot under which all evidence in the store is long expired.
pub(crate) fn evidence_all_expired(last_height: i64) -> ChainState {
    make_chain_state(last_height + 1000, 1, Duration::from_secs(1))
}
