pub mod types;

pub mod store;

pub mod evidence;

pub mod logging;

// Re-exports
pub use store::block_store::{BlockStore, BlockStoreOptions, StoreError};
pub use store::kv_store::{EngineError, KVStore, WriteBatch};
pub use store::metrics::Metrics;
pub use store::rocks_db::RocksDBStore;
