//! Point operations shared by every backend.

use std::ops::ControlFlow;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::{Backend, Param, Stmt};
use crate::{Count, Entry, KVResult, codec};

/// An ordered key-value store over a relational [`Backend`].
///
/// Every call is a blocking round-trip; nothing is cached in memory.
pub struct Store<B> {
    pub(crate) backend: B,
}

impl<B: Backend> Store<B> {
    /// Wrap an already bootstrapped backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Close the store, releasing its connections.
    pub fn close(self) {
        tracing::debug!("kv: closing {} store", self.backend.name());
    }

    /// Insert or replace the entry for `key`.
    ///
    /// An existing entry's value and tag are overwritten, not merged.
    pub fn put(&self, key: &str, value: &str, tag: &str) -> KVResult<u64> {
        self.backend.execute(
            Stmt::Insert,
            &[Param::Text(key), Param::Text(value), Param::Text(tag)],
        )
    }

    /// Insert or replace `key` with the empty tag.
    pub fn put_kv(&self, key: &str, value: &str) -> KVResult<u64> {
        self.put(key, value, "")
    }

    /// Store `value` as JSON under `(key, tag)`.
    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, tag: &str, value: &T) -> KVResult<u64> {
        let data = codec::encode(value)?;
        self.put(key, &data, tag)
    }

    /// Get the entry for `key`.
    pub fn get_entry(&self, key: &str) -> KVResult<Option<Entry>> {
        let mut found = None;
        self.backend.query(Stmt::Get, &[Param::Text(key)], &mut |entry| {
            // K is the primary key: the first row is the only row.
            found = Some(entry);
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    /// Get the value for `key`.
    pub fn get(&self, key: &str) -> KVResult<Option<String>> {
        Ok(self.get_entry(key)?.map(|e| e.value))
    }

    /// Get the value for `key` decoded from JSON.
    ///
    /// Unlike [`Store::iterate_all`], a value that does not decode is an
    /// error here.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> KVResult<Option<T>> {
        match self.get(key)? {
            Some(data) => codec::decode(&data).map(Some),
            None => Ok(None),
        }
    }

    /// Delete `key`. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> KVResult<u64> {
        self.backend.execute(Stmt::Delete, &[Param::Text(key)])
    }

    /// Delete every entry tagged exactly `tag`.
    pub fn delete_all_with_tag(&self, tag: &str) -> KVResult<u64> {
        self.backend.execute(Stmt::DeleteTag, &[Param::Text(tag)])
    }

    /// Delete every entry whose tag sorts strictly before `tag`.
    ///
    /// Tags compare as strings. Use fixed-width tags (zero-padded
    /// timestamps, for instance) when they encode time.
    pub fn delete_where_tag_less_than(&self, tag: &str) -> KVResult<u64> {
        self.backend.execute(Stmt::DeleteTagLt, &[Param::Text(tag)])
    }

    /// Delete every entry.
    pub fn delete_all(&self) -> KVResult<u64> {
        self.backend.execute(Stmt::DeleteAll, &[])
    }

    /// Number of entries with the smallest and largest key.
    pub fn count_all(&self) -> KVResult<Count> {
        self.backend.count_all()
    }
}
