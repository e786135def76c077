/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A RocksDB-backed implementation of [`KVStore`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::kv_store::{EngineError, KVStore, WriteBatch};

/// Handle on a RocksDB database implementing [`KVStore`]. Cloning is cheap and every
/// clone points at the same database.
///
/// [`close`](KVStore::close)-ing any handle flushes the database and makes every
/// handle reject further use; RocksDB itself releases its resources once the last
/// clone drops.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<rocksdb::DB>,
    closed: Arc<AtomicBool>,
}

impl RocksDBStore {
    /// Open the database at `path`, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<RocksDBStore, EngineError> {
        let db = rocksdb::DB::open_default(path)?;
        Ok(RocksDBStore {
            db: Arc::new(db),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl KVStore for RocksDBStore {
    type WriteBatch = RocksDBWriteBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        ensure_open(&self.closed)?;
        Ok(self.db.get(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        ensure_open(&self.closed)?;
        Ok(self.db.put(key, value)?)
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        ensure_open(&self.closed)?;
        Ok(self.db.put_opt(key, value, &sync_write_options())?)
    }

    fn new_batch(&self) -> RocksDBWriteBatch {
        RocksDBWriteBatch {
            db: Arc::clone(&self.db),
            closed: Arc::clone(&self.closed),
            batch: rocksdb::WriteBatch::default(),
        }
    }

    fn close(&self) -> Result<(), EngineError> {
        // Only the first close flushes; the rest are no-ops.
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        Ok(self.db.flush()?)
    }
}

pub struct RocksDBWriteBatch {
    db: Arc<rocksdb::DB>,
    closed: Arc<AtomicBool>,
    batch: rocksdb::WriteBatch,
}

impl WriteBatch for RocksDBWriteBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.batch.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.batch.delete(key);
    }

    fn write(self) -> Result<(), EngineError> {
        ensure_open(&self.closed)?;
        Ok(self.db.write(self.batch)?)
    }

    fn write_sync(self) -> Result<(), EngineError> {
        ensure_open(&self.closed)?;
        Ok(self.db.write_opt(self.batch, &sync_write_options())?)
    }
}

fn ensure_open(closed: &AtomicBool) -> Result<(), EngineError> {
    if closed.load(Ordering::Acquire) {
        return Err(EngineError::new("database is closed"));
    }
    Ok(())
}

fn sync_write_options() -> rocksdb::WriteOptions {
    let mut options = rocksdb::WriteOptions::default();
    options.set_sync(true);
    options
}

impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> EngineError {
        EngineError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_batched_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = RocksDBStore::open(dir.path()).unwrap();

        db.set(b"alpha", b"1").unwrap();
        db.set_sync(b"beta", b"2").unwrap();
        assert_eq!(db.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.get(b"beta").unwrap(), Some(b"2".to_vec()));
        assert_eq!(db.get(b"gamma").unwrap(), None);

        let mut batch = db.new_batch();
        batch.set(b"gamma", b"3");
        batch.delete(b"alpha");
        batch.write_sync().unwrap();

        assert_eq!(db.get(b"alpha").unwrap(), None);
        assert_eq!(db.get(b"gamma").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn close_rejects_further_use_on_every_handle() {
        let dir = tempfile::tempdir().unwrap();
        let db = RocksDBStore::open(dir.path()).unwrap();
        db.set_sync(b"alpha", b"1").unwrap();

        let clone = db.clone();
        let stale_batch = db.new_batch();
        db.close().unwrap();
        // Closing again is a no-op.
        db.close().unwrap();

        assert!(db.get(b"alpha").is_err());
        assert!(db.set(b"beta", b"2").is_err());
        assert!(clone.get(b"alpha").is_err());
        assert!(clone.set_sync(b"beta", b"2").is_err());
        assert!(stale_batch.write_sync().is_err());

        // Dropping the last handle releases the database; reopening sees the writes
        // that were flushed by close.
        drop(clone);
        drop(db);
        let reopened = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reopened.get(b"beta").unwrap(), None);
    }
}
