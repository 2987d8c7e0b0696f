//! Ordered scans with caller-driven early stop.
//!
//! Callbacks receive each row and a `stop` flag. Setting the flag ends the
//! scan after the current row; no further rows are fetched and the cursor is
//! released before the iteration call returns.

use std::ops::ControlFlow;

use serde::de::DeserializeOwned;

use crate::backend::{Backend, Param, Stmt};
use crate::store::Store;
use crate::{Entry, KVResult, codec};

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn visit_with_stop<F>(mut f: F) -> impl FnMut(Entry) -> ControlFlow<()>
where
    F: FnMut(&Entry, &mut bool),
{
    move |entry| {
        let mut stop = false;
        f(&entry, &mut stop);
        if stop {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

impl<B: Backend> Store<B> {
    fn scan<F>(&self, stmt: Stmt, start: Option<&str>, limit: usize, f: F) -> KVResult<()>
    where
        F: FnMut(&Entry, &mut bool),
    {
        if limit == 0 {
            return Ok(());
        }
        let limit = Param::Int(limit_param(limit));
        let params = match start {
            Some(start) => vec![Param::Text(start), limit],
            None => vec![limit],
        };
        self.backend.query(stmt, &params, &mut visit_with_stop(f))
    }

    /// Visit entries with `key >= start` in ascending key order, at most
    /// `limit` of them.
    ///
    /// This is a bound, not a prefix match: keys that merely sort after
    /// `start` are visited too.
    pub fn iterate_ascending_from<F>(&self, start: &str, limit: usize, f: F) -> KVResult<()>
    where
        F: FnMut(&Entry, &mut bool),
    {
        self.scan(Stmt::IterateAsc, Some(start), limit, f)
    }

    /// Visit entries with `key <= start` in descending key order, at most
    /// `limit` of them.
    pub fn iterate_descending_from<F>(&self, start: &str, limit: usize, f: F) -> KVResult<()>
    where
        F: FnMut(&Entry, &mut bool),
    {
        self.scan(Stmt::IterateDesc, Some(start), limit, f)
    }

    /// Visit the `limit` greatest keys in descending order.
    pub fn iterate_latest<F>(&self, limit: usize, f: F) -> KVResult<()>
    where
        F: FnMut(&Entry, &mut bool),
    {
        self.scan(Stmt::IterateLatest, None, limit, f)
    }

    /// Visit every entry in ascending key order with its value decoded as `T`.
    ///
    /// Rows whose value does not decode as `T` are logged and skipped so one
    /// bad row cannot stall a full scan. [`Store::get_json`] reports the same
    /// condition as an error instead.
    pub fn iterate_all<T, F>(&self, mut f: F) -> KVResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(&Entry, T, &mut bool),
    {
        self.backend.query(Stmt::IterateAll, &[], &mut |entry| {
            let decoded = match codec::decode::<T>(&entry.value) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("kv: skipping {}: {}", entry.key, e);
                    return ControlFlow::Continue(());
                }
            };
            let mut stop = false;
            f(&entry, decoded, &mut stop);
            if stop {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }
}
