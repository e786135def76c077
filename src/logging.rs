/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out store events.
//!
//! The store logs using the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values). The first two values are always:
//! 1. The name of the event in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the
//! following snippet is how a saved block is printed:
//!
//! ```text
//! SaveBlock, 1701329264, fNGCJyk, 42
//! ```
//!
//! In the snippet, the third value is the first seven characters of the Base64
//! encoding of the block's hash, and the fourth value is the block's height.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::types::basic::{BlockHeight, CryptoHash};

// Names of each event in PascalCase for printing:
pub const SAVE_BLOCK: &str = "SaveBlock";
pub const PRUNE_BLOCKS: &str = "PruneBlocks";
pub const DELETE_LATEST_BLOCK: &str = "DeleteLatestBlock";

pub(crate) fn log_save_block(hash: &CryptoHash, height: BlockHeight) {
    log::info!(
        "{}, {}, {}, {}",
        SAVE_BLOCK,
        secs_since_unix_epoch(SystemTime::now()),
        first_seven_base64_chars(&hash.bytes()),
        height
    )
}

pub(crate) fn log_prune_blocks(target: BlockHeight, pruned: u64, evidence_retain: BlockHeight) {
    log::info!(
        "{}, {}, {}, {}, {}",
        PRUNE_BLOCKS,
        secs_since_unix_epoch(SystemTime::now()),
        target,
        pruned,
        evidence_retain
    )
}

pub(crate) fn log_delete_latest_block(height: BlockHeight) {
    log::info!(
        "{}, {}, {}",
        DELETE_LATEST_BLOCK,
        secs_since_unix_epoch(SystemTime::now()),
        height
    )
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking
// the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
