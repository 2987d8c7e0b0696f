//! Ordered key-value store over a relational engine.
//!
//! Entries are `(key, value, tag)` triples kept in a single three-column
//! table. The same [`Store`] contract runs on an embedded SQLite file or on
//! a PostgreSQL server; only the [`Backend`] differs.
//!
//! Range scans are bound queries, not substring prefix matches: scanning
//! upward from `"k"` visits every key `>= "k"` until the limit is reached.
//!
//! ```ignore
//! use tagkv::{SqliteConfig, SqliteStore};
//!
//! let store = SqliteStore::open(&SqliteConfig::in_memory("users"))?;
//! store.put("user:1", "alice", "v1")?;
//! store.iterate_ascending_from("user:", 100, |entry, stop| {
//!     if !entry.key.starts_with("user:") {
//!         *stop = true;
//!         return;
//!     }
//!     println!("{} = {}", entry.key, entry.value);
//! })?;
//! ```

pub mod backend;
pub mod codec;
pub mod config;
mod iter;
pub mod postgres;
pub mod sqlite;
mod store;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: backend error: {0}")]
    Backend(String),

    #[error("kv: decode error: {0}")]
    Decode(String),

    #[error("kv: encode error: {0}")]
    Encode(String),

    #[error("kv: invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub tag: String,
}

/// Result of [`Store::count_all`].
///
/// `min_key` and `max_key` are empty when the store is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Count {
    pub count: i64,
    pub min_key: String,
    pub max_key: String,
}

pub use backend::Backend;
pub use config::StoreConfig;
pub use crate::postgres::{PostgresBackend, PostgresConfig, ValueType};
pub use crate::sqlite::{SqliteBackend, SqliteConfig, TxState};
pub use store::Store;

/// A store over the embedded engine. Supports transactions.
pub type SqliteStore = Store<SqliteBackend>;

/// A store over the client/server engine.
pub type PostgresStore = Store<PostgresBackend>;

/// A store whose backend is chosen at runtime.
pub type DynStore = Store<Box<dyn Backend>>;
