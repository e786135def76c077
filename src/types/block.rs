/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type, its chunked "part set" form, and its methods.
//!
//! A block travels through gossip as a set of fixed-size **parts**: the serialized
//! block is chunked, every chunk gets a Merkle inclusion proof against the part set's
//! root, and the `(total, root)` pair travels inside the block's
//! [`BlockId`](BlockId). The store persists parts individually and reassembles the
//! block by concatenating them in index order.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
pub use sha2::Sha256 as CryptoHasher;
use sha2::Digest;

use super::basic::{BlockHeight, ChainID, CryptoHash, Timestamp, Tx, ValidatorAddress};
use super::commit::Commit;
use super::merkle::{self, MerkleProof};

/// Size in bytes of the chunks a block is split into for gossip.
pub const BLOCK_PART_SIZE_BYTES: usize = 65536;

/// The header of a block.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Header {
    pub chain_id: ChainID,
    pub height: BlockHeight,
    pub time: Timestamp,
    /// Id of the previous block, or `None` in the first block after genesis.
    pub last_block_id: Option<BlockId>,
    pub data_hash: CryptoHash,
    pub app_hash: CryptoHash,
    pub proposer_address: ValidatorAddress,
}

/// A block: a header, the transactions it orders, and the commit for its predecessor.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Block {
    pub header: Header,
    pub data: Vec<Tx>,
    /// Commit for the block at `header.height - 1`. In the first block after genesis
    /// this commit has height 0 and no signatures.
    pub last_commit: Commit,
}

impl Block {
    pub fn new(header: Header, data: Vec<Tx>, last_commit: Commit) -> Block {
        Block {
            header,
            data,
            last_commit,
        }
    }

    /// The hash of this block: the SHA256 digest of its serialized header.
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&self.header.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }
}

/// Identifies a block by its hash together with the header of its part set, so that a
/// replica can recognize the parts belonging to the block while it gossips them.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockId {
    pub hash: CryptoHash,
    pub part_set_header: PartSetHeader,
}

/// Number of parts a block was split into, and the Merkle root over their bytes.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: CryptoHash,
}

/// One chunk of a serialized block.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Part {
    pub index: u32,
    pub bytes: Vec<u8>,
    /// Inclusion proof of `bytes` under the part set's root.
    pub proof: MerkleProof,
}

/// The set of parts a block splits into.
///
/// A `PartSet` is either produced whole by [`split`](Self::split)-ting a block, or
/// assembled part-by-part from gossip via [`add_part`](Self::add_part). Only a
/// [`complete`](Self::is_complete) part set may be saved into the store.
#[derive(Clone, Debug)]
pub struct PartSet {
    header: PartSetHeader,
    parts: Vec<Option<Part>>,
    count: u32,
}

impl PartSet {
    /// Split `block` into parts of `part_size` bytes (consensus uses
    /// [`BLOCK_PART_SIZE_BYTES`]). The final part may be shorter.
    pub fn split(block: &Block, part_size: usize) -> PartSet {
        let bytes = block.try_to_vec().unwrap();
        let chunks: Vec<&[u8]> = bytes.chunks(part_size).collect();
        let leaf_hashes: Vec<CryptoHash> =
            chunks.iter().map(|chunk| merkle::leaf_hash(chunk)).collect();
        let (root, proofs) = merkle::root_and_proofs(&leaf_hashes);

        let parts: Vec<Option<Part>> = chunks
            .iter()
            .zip(proofs)
            .enumerate()
            .map(|(index, (chunk, proof))| {
                Some(Part {
                    index: index as u32,
                    bytes: chunk.to_vec(),
                    proof,
                })
            })
            .collect();
        let count = parts.len() as u32;

        PartSet {
            header: PartSetHeader {
                total: count,
                hash: root,
            },
            parts,
            count,
        }
    }

    /// Create an empty `PartSet` that expects the parts described by `header`.
    pub fn new_from_header(header: PartSetHeader) -> PartSet {
        let parts = vec![None; header.total as usize];
        PartSet {
            header,
            parts,
            count: 0,
        }
    }

    /// Add a part received from gossip. Returns `false` if the part was already
    /// present, `true` if it was newly added.
    pub fn add_part(&mut self, part: Part) -> Result<bool, PartSetError> {
        if part.index >= self.header.total {
            return Err(PartSetError::IndexOutOfBounds {
                index: part.index,
                total: self.header.total,
            });
        }
        if !part.proof.verify(&self.header.hash, &part.bytes)
            || part.proof.index != part.index
            || part.proof.total != self.header.total
        {
            return Err(PartSetError::InvalidProof { index: part.index });
        }
        if self.parts[part.index as usize].is_some() {
            return Ok(false);
        }
        self.parts[part.index as usize] = Some(part);
        self.count += 1;
        Ok(true)
    }

    /// Get a reference to this part set's header.
    pub fn header(&self) -> &PartSetHeader {
        &self.header
    }

    /// The number of parts this set holds when complete.
    pub fn total(&self) -> u32 {
        self.header.total
    }

    /// The number of parts currently present.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether every part up to `total` is present.
    pub fn is_complete(&self) -> bool {
        self.count == self.header.total
    }

    /// Get a reference to the part at `index`, if present.
    pub fn get_part(&self, index: u32) -> Option<&Part> {
        self.parts.get(index as usize)?.as_ref()
    }
}

/// Error when adding a part to a [`PartSet`].
#[derive(Debug)]
pub enum PartSetError {
    IndexOutOfBounds { index: u32, total: u32 },
    InvalidProof { index: u32 },
}

impl Display for PartSetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PartSetError::IndexOutOfBounds { index, total } => {
                write!(f, "part index {} out of bounds (total: {})", index, total)
            }
            PartSetError::InvalidProof { index } => {
                write!(f, "part {} carries an invalid inclusion proof", index)
            }
        }
    }
}

/// Summary information about a stored block.
///
/// The existence of a block's meta in the store implies that all of the block's parts
/// are stored too, unless pruning has removed them in the meantime.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct BlockMeta {
    pub block_id: BlockId,
    pub header: Header,
    pub num_txs: u32,
}

impl BlockMeta {
    pub fn new(block: &Block, parts: &PartSet) -> BlockMeta {
        BlockMeta {
            block_id: BlockId {
                hash: block.hash(),
                part_set_header: parts.header().clone(),
            },
            header: block.header.clone(),
            num_txs: block.data.len() as u32,
        }
    }
}
