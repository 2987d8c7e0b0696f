//! SQLite backend: one database file, one connection.

use std::cell::Cell;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::ReentrantMutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, Param, Stmt, Templates, table_name};
use crate::store::Store;
use crate::{Count, Entry, KVError, KVResult};

/// Directory value selecting an in-memory database.
pub const MEMORY: &str = ":memory:";

/// Default `busy_timeout` pragma in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 50_000;

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Configuration for a SQLite store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Store name. The database file is `<dir>/<name>.db`.
    pub name: String,

    /// Directory holding the database file. Empty means the current
    /// directory and [`MEMORY`] means no file at all.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    /// How long a statement waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// `journal_mode` pragma, left at SQLite's default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_mode: Option<String>,
}

impl SqliteConfig {
    /// A file-backed store in `dir`.
    pub fn new(name: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: None,
        }
    }

    /// An in-memory store, gone when the store is dropped.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, MEMORY)
    }

    /// Database file path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<PathBuf> {
        if self.dir == MEMORY {
            return None;
        }
        let dir = if self.dir.is_empty() { "." } else { self.dir.as_str() };
        Some(Path::new(dir).join(format!("{}.db", self.name)))
    }
}

impl From<rusqlite::Error> for KVError {
    fn from(e: rusqlite::Error) -> Self {
        KVError::Backend(e.to_string())
    }
}

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match *self {
            Param::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Param::Int(i) => ToSqlOutput::Owned(Value::Integer(i)),
        })
    }
}

/// State of the transaction coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    InTransaction,
}

struct Session {
    conn: Connection,
    state: Cell<TxState>,
}

/// SQLite implementation of [`Backend`].
///
/// The connection sits behind a re-entrant lock, so a scan callback or a
/// transaction body may call back into the store on the same thread. Other
/// threads wait for the lock.
pub struct SqliteBackend {
    session: ReentrantMutex<Session>,
    templates: Templates,
    path: Option<PathBuf>,
}

fn templates(table: &str) -> Templates {
    Templates::new(|stmt| match stmt {
        Stmt::Insert => format!(
            "INSERT INTO {table} (K, V, T) VALUES (?1, ?2, ?3) \
             ON CONFLICT (K) DO UPDATE SET V = excluded.V, T = excluded.T"
        ),
        Stmt::Get => format!("SELECT K, V, T FROM {table} WHERE K = ?1"),
        Stmt::IterateAll => format!("SELECT K, V, T FROM {table} ORDER BY K ASC"),
        Stmt::IterateAsc => {
            format!("SELECT K, V, T FROM {table} WHERE K >= ?1 ORDER BY K ASC LIMIT ?2")
        }
        Stmt::IterateDesc => {
            format!("SELECT K, V, T FROM {table} WHERE K <= ?1 ORDER BY K DESC LIMIT ?2")
        }
        Stmt::IterateLatest => format!("SELECT K, V, T FROM {table} ORDER BY K DESC LIMIT ?1"),
        Stmt::Delete => format!("DELETE FROM {table} WHERE K = ?1"),
        Stmt::DeleteTag => format!("DELETE FROM {table} WHERE T = ?1"),
        Stmt::DeleteTagLt => format!("DELETE FROM {table} WHERE T < ?1"),
        Stmt::DeleteAll => format!("DELETE FROM {table}"),
        Stmt::CountAll => format!("SELECT COUNT(K), MIN(K), MAX(K) FROM {table}"),
    })
}

fn bootstrap(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (K TEXT PRIMARY KEY, V TEXT, T TEXT);
         CREATE INDEX IF NOT EXISTS {table}_kt ON {table} (K, T);
         CREATE INDEX IF NOT EXISTS {table}_tk ON {table} (T, K);"
    ))
}

impl SqliteBackend {
    /// Open (creating if needed) the database and its table.
    pub fn open(config: &SqliteConfig) -> KVResult<Self> {
        let table = table_name(&config.name)?;
        let path = config.path();

        let conn = match &path {
            Some(p) => {
                if let Some(dir) = p.parent() {
                    std::fs::create_dir_all(dir).map_err(|e| KVError::Backend(e.to_string()))?;
                }
                Connection::open(p)?
            }
            None => Connection::open_in_memory()?,
        };

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if let Some(want) = &config.journal_mode {
            let got: String =
                conn.pragma_update_and_check(None, "journal_mode", want, |row| row.get(0))?;
            // In-memory databases always report "memory".
            if path.is_some() && !got.eq_ignore_ascii_case(want) {
                return Err(KVError::InvalidInput(format!(
                    "journal_mode {want:?} not applied, sqlite kept {got:?}"
                )));
            }
            tracing::debug!("kv: sqlite journal_mode={}", got);
        }

        bootstrap(&conn, &table)?;

        let templates = templates(&table);
        conn.set_prepared_statement_cache_capacity(Stmt::ALL.len() * 2);
        for (_, sql) in templates.iter() {
            conn.prepare_cached(sql)?;
        }

        tracing::debug!(
            "kv: opened sqlite store {} at {}",
            table,
            path.as_deref().map_or(MEMORY.into(), |p| p.display().to_string())
        );

        Ok(Self {
            session: ReentrantMutex::new(Session {
                conn,
                state: Cell::new(TxState::Idle),
            }),
            templates,
            path,
        })
    }

    /// Database file path, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current transaction coordinator state.
    pub fn state(&self) -> TxState {
        self.session.lock().state.get()
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn execute(&self, stmt: Stmt, params: &[Param<'_>]) -> KVResult<u64> {
        let session = self.session.lock();
        let mut prepared = session.conn.prepare_cached(self.templates.get(stmt))?;
        let n = prepared.execute(params_from_iter(params.iter()))?;
        Ok(n as u64)
    }

    fn query(
        &self,
        stmt: Stmt,
        params: &[Param<'_>],
        visit: &mut dyn FnMut(Entry) -> ControlFlow<()>,
    ) -> KVResult<()> {
        let session = self.session.lock();
        let mut prepared = session.conn.prepare_cached(self.templates.get(stmt))?;
        let mut rows = prepared.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let entry = Entry {
                key: row.get(0)?,
                value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                tag: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            };
            if visit(entry).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count_all(&self) -> KVResult<Count> {
        let session = self.session.lock();
        let mut prepared = session.conn.prepare_cached(self.templates.get(Stmt::CountAll))?;
        let count = prepared.query_row([], |row| {
            Ok(Count::from_aggregate(row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        Ok(count)
    }
}

/// Resets the coordinator to `Idle` however the body exits.
struct StateGuard<'a>(&'a Cell<TxState>);

impl<'a> StateGuard<'a> {
    fn enter(state: &'a Cell<TxState>) -> Self {
        state.set(TxState::InTransaction);
        Self(state)
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.set(TxState::Idle);
    }
}

impl Store<SqliteBackend> {
    /// Open a SQLite store.
    pub fn open(config: &SqliteConfig) -> KVResult<Self> {
        Ok(Self::new(SqliteBackend::open(config)?))
    }

    /// Run `body` as one transaction.
    ///
    /// Store calls made by `body` on this thread join the transaction. It
    /// commits when `body` returns `Ok` and rolls back when `body` returns
    /// `Err` or panics. Calls from other threads wait until it finishes.
    ///
    /// Only one transaction may be active: calling this from inside `body`
    /// aborts the process.
    pub fn run_in_transaction<T, F>(&self, body: F) -> KVResult<T>
    where
        F: FnOnce(&Self) -> KVResult<T>,
    {
        let session = self.backend.session.lock();
        if session.state.get() == TxState::InTransaction {
            tracing::error!("kv: nested transaction on sqlite store, aborting");
            std::process::abort();
        }

        let tx = session.conn.unchecked_transaction()?;
        let _state = StateGuard::enter(&session.state);
        tracing::debug!("kv: transaction begin");

        match body(self) {
            Ok(v) => {
                tx.commit()?;
                tracing::debug!("kv: transaction commit");
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!("kv: rollback failed: {}", rollback);
                }
                tracing::debug!("kv: transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Close the store and remove its database file.
    pub fn close_and_delete(self) -> KVResult<()> {
        let path = self.backend.path.clone();
        drop(self);
        let Some(path) = path else {
            return Ok(());
        };
        tracing::debug!("kv: removing {}", path.display());
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KVError::Backend(e.to_string())),
        }
    }
}
