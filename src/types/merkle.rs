/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Merkle root and inclusion proofs over the parts of a block.
//!
//! The tree is the RFC 6962 construction: leaves and inner nodes are hashed under
//! distinct domain prefixes, and a tree over `n > 1` leaves splits at the largest power
//! of two strictly smaller than `n`. The root of a part set is carried in its
//! [`PartSetHeader`](super::block::PartSetHeader), and every [`Part`](super::block::Part)
//! carries a [`MerkleProof`] connecting its bytes to that root.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;

use super::basic::CryptoHash;
use super::block::CryptoHasher;

const LEAF_PREFIX: [u8; 1] = [0x00];
const INNER_PREFIX: [u8; 1] = [0x01];

/// Hash a leaf's bytes under the leaf domain prefix.
pub fn leaf_hash(leaf: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(LEAF_PREFIX);
    hasher.update(leaf);
    CryptoHash::new(hasher.finalize().into())
}

fn inner_hash(left: &CryptoHash, right: &CryptoHash) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(INNER_PREFIX);
    hasher.update(left.bytes());
    hasher.update(right.bytes());
    CryptoHash::new(hasher.finalize().into())
}

// Largest power of two strictly smaller than `n`. Callers guarantee `n >= 2`.
fn split_point(n: u32) -> u32 {
    n.next_power_of_two() / 2
}

/// Compute the root of the tree over the given leaf hashes.
///
/// The root over zero leaves is the hash of the empty bytestring.
pub fn root(leaf_hashes: &[CryptoHash]) -> CryptoHash {
    match leaf_hashes.len() {
        0 => CryptoHash::new(CryptoHasher::digest(b"").into()),
        1 => leaf_hashes[0],
        n => {
            let k = split_point(n as u32) as usize;
            inner_hash(&root(&leaf_hashes[..k]), &root(&leaf_hashes[k..]))
        }
    }
}

/// Compute the root of the tree over the given leaf hashes, together with one
/// [`MerkleProof`] per leaf.
///
/// # Panics
///
/// Panics if `leaf_hashes` is empty: an inclusion proof over an empty tree proves
/// nothing.
pub fn root_and_proofs(leaf_hashes: &[CryptoHash]) -> (CryptoHash, Vec<MerkleProof>) {
    if leaf_hashes.is_empty() {
        panic!("cannot build inclusion proofs over an empty tree");
    }
    let total = leaf_hashes.len() as u32;
    let (root, aunts) = aunts_per_leaf(leaf_hashes);
    let proofs = leaf_hashes
        .iter()
        .zip(aunts)
        .enumerate()
        .map(|(index, (leaf_hash, aunts))| MerkleProof {
            total,
            index: index as u32,
            leaf_hash: *leaf_hash,
            aunts,
        })
        .collect();
    (root, proofs)
}

// Returns the root over `leaf_hashes` and, for each leaf, its aunts ordered from
// closest-to-leaf to closest-to-root.
fn aunts_per_leaf(leaf_hashes: &[CryptoHash]) -> (CryptoHash, Vec<Vec<CryptoHash>>) {
    match leaf_hashes.len() {
        1 => (leaf_hashes[0], vec![Vec::new()]),
        n => {
            let k = split_point(n as u32) as usize;
            let (left_root, mut left_aunts) = aunts_per_leaf(&leaf_hashes[..k]);
            let (right_root, mut right_aunts) = aunts_per_leaf(&leaf_hashes[k..]);
            for aunts in &mut left_aunts {
                aunts.push(right_root);
            }
            for aunts in &mut right_aunts {
                aunts.push(left_root);
            }
            left_aunts.append(&mut right_aunts);
            (inner_hash(&left_root, &right_root), left_aunts)
        }
    }
}

/// Proof that a leaf at a given index is included in the tree with a given root.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct MerkleProof {
    pub total: u32,
    pub index: u32,
    pub leaf_hash: CryptoHash,
    /// Sibling hashes on the path from the leaf to the root, ordered leaf-first.
    pub aunts: Vec<CryptoHash>,
}

impl MerkleProof {
    /// Check that `leaf`'s bytes hash to this proof's `leaf_hash` and that the proof's
    /// path reproduces `root`.
    pub fn verify(&self, root: &CryptoHash, leaf: &[u8]) -> bool {
        if leaf_hash(leaf) != self.leaf_hash {
            return false;
        }
        match compute_root_from_aunts(self.index, self.total, self.leaf_hash, &self.aunts) {
            Some(computed) => computed == *root,
            None => false,
        }
    }
}

// Recompute the root from a leaf hash and its aunts. Returns `None` if the number of
// aunts does not match the shape of a tree with `total` leaves.
fn compute_root_from_aunts(
    index: u32,
    total: u32,
    leaf_hash: CryptoHash,
    aunts: &[CryptoHash],
) -> Option<CryptoHash> {
    if index >= total || total == 0 {
        return None;
    }
    if total == 1 {
        if !aunts.is_empty() {
            return None;
        }
        return Some(leaf_hash);
    }
    let (last, rest) = aunts.split_last()?;
    let k = split_point(total);
    if index < k {
        let left = compute_root_from_aunts(index, k, leaf_hash, rest)?;
        Some(inner_hash(&left, last))
    } else {
        let right = compute_root_from_aunts(index - k, total - k, leaf_hash, rest)?;
        Some(inner_hash(last, &right))
    }
}
