/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for commits: the precommit-vote aggregates that accompany every block.
//!
//! The same sequence of precommits is stored by the store under two distinct roles:
//! as the **block commit** at height `h` (the canonical commit carried inside block
//! `h + 1`'s [`last_commit`](super::block::Block::last_commit)), and as the **seen
//! commit** at the block's own height (the precommits a replica observed locally,
//! which may differ from the canonical set). The two must never be unified; restart
//! catch-up depends on the seen commit and gossip depends on the canonical one.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{BlockHeight, SignatureBytes, Timestamp, ValidatorAddress};
use super::block::BlockId;

/// How a validator's precommit vote relates to the committed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum BlockIdFlag {
    /// The validator's vote was not received.
    Absent,
    /// The validator voted for the committed block.
    Commit,
    /// The validator voted for nil.
    Nil,
}

/// One validator's precommit vote inside a [`Commit`].
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct CommitSig {
    pub flag: BlockIdFlag,
    pub validator_address: ValidatorAddress,
    pub timestamp: Timestamp,
    /// `None` when the vote is [`Absent`](BlockIdFlag::Absent).
    pub signature: Option<SignatureBytes>,
}

/// Precommit votes from more than two thirds of voting power for the block at `height`.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct Commit {
    pub height: BlockHeight,
    pub round: u32,
    /// `None` only in the empty commit carried by the first block after genesis.
    pub block_id: Option<BlockId>,
    pub signatures: Vec<CommitSig>,
}

/// One validator's precommit vote plus the application-defined extension it produced
/// at vote time.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ExtendedCommitSig {
    pub commit_sig: CommitSig,
    pub extension: Vec<u8>,
    pub extension_signature: Option<SignatureBytes>,
}

/// A seen commit augmented with per-vote extension payloads.
///
/// The extended commit is not guaranteed to aggregate the same precommits as the
/// canonical commit inside the next block.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct ExtendedCommit {
    pub height: BlockHeight,
    pub round: u32,
    pub block_id: Option<BlockId>,
    pub extended_signatures: Vec<ExtendedCommitSig>,
}

impl ExtendedCommit {
    /// Check that extension data is consistently present or consistently absent.
    ///
    /// With `expect_extensions`, every [`Commit`](BlockIdFlag::Commit)-flagged vote
    /// must carry a signed extension, and no other vote may carry extension data;
    /// without it, no vote may carry extension data at all. The store calls this with
    /// `true` before persisting an extended commit.
    pub fn ensure_extensions(&self, expect_extensions: bool) -> Result<(), ExtensionError> {
        for (index, extended_sig) in self.extended_signatures.iter().enumerate() {
            let is_commit_vote = extended_sig.commit_sig.flag == BlockIdFlag::Commit;
            let has_extension_data = !extended_sig.extension.is_empty()
                || extended_sig.extension_signature.is_some();
            if expect_extensions && is_commit_vote {
                if extended_sig.extension_signature.is_none() {
                    return Err(ExtensionError::MissingExtensionSignature {
                        height: self.height,
                        validator_index: index,
                    });
                }
            } else if has_extension_data {
                // Absent and nil votes never carry extensions, and no vote does when
                // extensions are disabled.
                return Err(ExtensionError::UnexpectedExtension {
                    height: self.height,
                    validator_index: index,
                });
            }
        }
        Ok(())
    }

    /// Project this extended commit onto the plain [`Commit`] it extends.
    pub fn to_commit(&self) -> Commit {
        Commit {
            height: self.height,
            round: self.round,
            block_id: self.block_id.clone(),
            signatures: self
                .extended_signatures
                .iter()
                .map(|extended_sig| extended_sig.commit_sig.clone())
                .collect(),
        }
    }
}

/// Error when an [`ExtendedCommit`]'s extension data does not match expectations.
#[derive(Debug)]
pub enum ExtensionError {
    MissingExtensionSignature {
        height: BlockHeight,
        validator_index: usize,
    },
    UnexpectedExtension {
        height: BlockHeight,
        validator_index: usize,
    },
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionError::MissingExtensionSignature {
                height,
                validator_index,
            } => write!(
                f,
                "vote {} in the extended commit at height {} lacks an extension signature",
                validator_index, height
            ),
            ExtensionError::UnexpectedExtension {
                height,
                validator_index,
            } => write!(
                f,
                "vote {} in the extended commit at height {} carries unexpected extension data",
                validator_index, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extended_sig(flag: BlockIdFlag, extension: Vec<u8>, signed: bool) -> ExtendedCommitSig {
        ExtendedCommitSig {
            commit_sig: CommitSig {
                flag,
                validator_address: ValidatorAddress::new([9; 20]),
                timestamp: Timestamp::new(1_700_000_000_000_000_000),
                signature: if flag == BlockIdFlag::Absent {
                    None
                } else {
                    Some(SignatureBytes::new([7; 64]))
                },
            },
            extension,
            extension_signature: if signed {
                Some(SignatureBytes::new([8; 64]))
            } else {
                None
            },
        }
    }

    fn extended_commit(signatures: Vec<ExtendedCommitSig>) -> ExtendedCommit {
        ExtendedCommit {
            height: BlockHeight::new(4),
            round: 1,
            block_id: None,
            extended_signatures: signatures,
        }
    }

    #[test]
    fn ensure_extensions_accepts_signed_commit_votes() {
        let commit = extended_commit(vec![
            extended_sig(BlockIdFlag::Commit, vec![1, 2, 3], true),
            extended_sig(BlockIdFlag::Absent, Vec::new(), false),
            extended_sig(BlockIdFlag::Nil, Vec::new(), false),
        ]);
        assert!(commit.ensure_extensions(true).is_ok());
    }

    #[test]
    fn ensure_extensions_rejects_unsigned_commit_vote() {
        let commit = extended_commit(vec![
            extended_sig(BlockIdFlag::Commit, vec![1, 2, 3], true),
            extended_sig(BlockIdFlag::Commit, vec![4, 5], false),
        ]);
        assert!(matches!(
            commit.ensure_extensions(true),
            Err(ExtensionError::MissingExtensionSignature {
                validator_index: 1,
                ..
            })
        ));
    }

    #[test]
    fn ensure_extensions_rejects_extension_data_on_non_commit_votes() {
        let commit = extended_commit(vec![
            extended_sig(BlockIdFlag::Commit, vec![1], true),
            extended_sig(BlockIdFlag::Nil, vec![9], false),
        ]);
        assert!(matches!(
            commit.ensure_extensions(true),
            Err(ExtensionError::UnexpectedExtension {
                validator_index: 1,
                ..
            })
        ));

        let commit = extended_commit(vec![extended_sig(BlockIdFlag::Absent, Vec::new(), true)]);
        assert!(matches!(
            commit.ensure_extensions(true),
            Err(ExtensionError::UnexpectedExtension {
                validator_index: 0,
                ..
            })
        ));
    }

    #[test]
    fn ensure_extensions_rejects_extension_data_when_disabled() {
        let commit = extended_commit(vec![extended_sig(BlockIdFlag::Commit, vec![1], true)]);
        assert!(matches!(
            commit.ensure_extensions(false),
            Err(ExtensionError::UnexpectedExtension { .. })
        ));
    }

    #[test]
    fn to_commit_projects_signatures() {
        let commit = extended_commit(vec![
            extended_sig(BlockIdFlag::Commit, vec![1], true),
            extended_sig(BlockIdFlag::Nil, Vec::new(), false),
        ]);
        let plain = commit.to_commit();

        assert_eq!(plain.height, commit.height);
        assert_eq!(plain.round, commit.round);
        assert_eq!(plain.signatures.len(), 2);
        assert_eq!(plain.signatures[0], commit.extended_signatures[0].commit_sig);
        assert_eq!(plain.signatures[1], commit.extended_signatures[1].commit_sig);
    }
}
