/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits specifying the required interface for the ordered key-value engine provided
//! by the user.
//!
//! The store keeps bytes in whatever engine the user plugs in, as long as it can do
//! point reads, plain and synchronous writes, and batched deletes. The engine is
//! trusted to provide its own fine-grained concurrency control for its contents.
//! [`RocksDBStore`](super::rocks_db::RocksDBStore) is the engine shipped with this
//! crate.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

pub trait KVStore: Clone + Send + Sync + 'static {
    type WriteBatch: WriteBatch;

    /// Get the value stored under `key`, or `None` if the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Set `key` to `value`.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Set `key` to `value` and flush the write to durable storage before returning.
    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Create an empty write batch targeting this engine.
    fn new_batch(&self) -> Self::WriteBatch;

    /// Flush outstanding writes and mark the engine closed. Afterwards, every
    /// operation through this handle, a clone of it, or a batch created from it
    /// fails with an [`EngineError`]. Closing an already-closed engine is a no-op.
    fn close(&self) -> Result<(), EngineError>;
}

/// A set of writes applied to the engine together.
///
/// Batches are **not** assumed to apply atomically; callers sequence their updates so
/// that a partially applied batch is observable only as missing data, never as
/// inconsistent data.
pub trait WriteBatch {
    fn set(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    /// Apply the batch. Consumes the batch, so a written batch can never be reused.
    fn write(self) -> Result<(), EngineError>;

    /// Apply the batch and flush it to durable storage before returning.
    fn write_sync(self) -> Result<(), EngineError>;
}

/// Error reported by the underlying key-value engine.
#[derive(Debug)]
pub struct EngineError {
    detail: String,
}

impl EngineError {
    pub fn new(detail: impl Into<String>) -> EngineError {
        EngineError {
            detail: detail.into(),
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "key-value engine error: {}", self.detail)
    }
}

impl Error for EngineError {}
