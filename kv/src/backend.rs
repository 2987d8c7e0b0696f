//! The capability seam between the store and a relational engine.

use std::ops::ControlFlow;

use crate::{Count, Entry, KVError, KVResult};

/// The query templates every backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stmt {
    /// Upsert `(key, value, tag)`.
    Insert,
    /// Select the row for `key`.
    Get,
    /// Select every row in ascending key order.
    IterateAll,
    /// Select rows with `K >= start`, ascending, limited.
    IterateAsc,
    /// Select rows with `K <= start`, descending, limited.
    IterateDesc,
    /// Select the greatest keys, descending, limited.
    IterateLatest,
    /// Delete the row for `key`.
    Delete,
    /// Delete rows whose tag equals the argument.
    DeleteTag,
    /// Delete rows whose tag sorts before the argument.
    DeleteTagLt,
    /// Delete every row.
    DeleteAll,
    /// `COUNT`, `MIN` and `MAX` over the key column.
    CountAll,
}

impl Stmt {
    pub const ALL: [Stmt; 11] = [
        Stmt::Insert,
        Stmt::Get,
        Stmt::IterateAll,
        Stmt::IterateAsc,
        Stmt::IterateDesc,
        Stmt::IterateLatest,
        Stmt::Delete,
        Stmt::DeleteTag,
        Stmt::DeleteTagLt,
        Stmt::DeleteAll,
        Stmt::CountAll,
    ];
}

/// A bound statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    Text(&'a str),
    Int(i64),
}

/// Query text for each [`Stmt`], rendered once per store.
#[derive(Debug, Clone)]
pub struct Templates {
    sql: Vec<String>,
}

impl Templates {
    /// Render every statement with `render`.
    pub fn new(render: impl Fn(Stmt) -> String) -> Self {
        Self {
            sql: Stmt::ALL.into_iter().map(render).collect(),
        }
    }

    /// The query text for `stmt`.
    pub fn get(&self, stmt: Stmt) -> &str {
        &self.sql[stmt as usize]
    }

    /// Iterate over `(stmt, sql)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Stmt, &str)> {
        Stmt::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

/// A relational engine able to run the store's query templates.
///
/// Implementations own their connection handling and DDL; the store only
/// ever refers to statements by [`Stmt`].
pub trait Backend: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Run a mutation and return the number of affected rows.
    fn execute(&self, stmt: Stmt, params: &[Param<'_>]) -> KVResult<u64>;

    /// Run a row query, feeding each `(K, V, T)` row to `visit` until it
    /// breaks or the rows run out. The cursor is released before returning.
    fn query(
        &self,
        stmt: Stmt,
        params: &[Param<'_>],
        visit: &mut dyn FnMut(Entry) -> ControlFlow<()>,
    ) -> KVResult<()>;

    /// Run [`Stmt::CountAll`].
    fn count_all(&self) -> KVResult<Count>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, stmt: Stmt, params: &[Param<'_>]) -> KVResult<u64> {
        (**self).execute(stmt, params)
    }

    fn query(
        &self,
        stmt: Stmt,
        params: &[Param<'_>],
        visit: &mut dyn FnMut(Entry) -> ControlFlow<()>,
    ) -> KVResult<()> {
        (**self).query(stmt, params, visit)
    }

    fn count_all(&self) -> KVResult<Count> {
        (**self).count_all()
    }
}

impl Count {
    /// Build a count from an aggregate row. `MIN`/`MAX` over zero rows are
    /// NULL and become empty strings.
    pub fn from_aggregate(count: i64, min_key: Option<String>, max_key: Option<String>) -> Self {
        Self {
            count,
            min_key: min_key.unwrap_or_default(),
            max_key: max_key.unwrap_or_default(),
        }
    }
}

/// Table name for a store name. Store names are spliced into DDL, so only
/// ASCII letters, digits and `_` are accepted.
pub fn table_name(name: &str) -> KVResult<String> {
    if name.is_empty() {
        return Err(KVError::InvalidInput("store name is empty".into()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(KVError::InvalidInput(format!(
            "store name {name:?} may only contain ASCII letters, digits and '_'"
        )));
    }
    Ok(format!("kv_{name}"))
}
