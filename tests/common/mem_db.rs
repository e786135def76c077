//! A simple, volatile, in-memory implementation of [`KVStore`].

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use blockstore::{EngineError, KVStore, WriteBatch};

/// An in-memory implementation of [`KVStore`]. Clones share the stored bytes and the
/// open/closed state, so closing any handle closes them all.
#[derive(Clone)]
pub(crate) struct MemDB {
    map: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB {
            map: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A fresh handle over the same stored bytes, open regardless of whether the
    /// original was closed. Stands in for closing and reopening an on-disk database.
    pub(crate) fn reopen(&self) -> MemDB {
        MemDB {
            map: Arc::clone(&self.map),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::new("database is closed"));
        }
        Ok(())
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        self.ensure_open()?;
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.map.lock().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn set_sync(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.set(key, value)
    }

    fn new_batch(&self) -> MemWriteBatch {
        MemWriteBatch {
            db: self.clone(),
            insertions: HashMap::new(),
            deletions: HashSet::new(),
        }
    }

    fn close(&self) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    db: MemDB,
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
}

impl WriteBatch for MemWriteBatch {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }

    fn write(self) -> Result<(), EngineError> {
        self.db.ensure_open()?;
        let mut map = self.db.map.lock().unwrap();
        for (key, value) in self.insertions {
            map.insert(key, value);
        }
        for key in self.deletions {
            map.remove(&key);
        }
        Ok(())
    }

    fn write_sync(self) -> Result<(), EngineError> {
        self.write()
    }
}
