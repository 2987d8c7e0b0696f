//! PostgreSQL backend over an r2d2 connection pool.

use std::ops::ControlFlow;

use postgres::fallible_iterator::FallibleIterator;
use postgres::types::ToSql;
use postgres::{Config, NoTls};
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, Param, Stmt, Templates, table_name};
use crate::store::Store;
use crate::{Count, Entry, KVError, KVResult};

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Rows pulled from the server per cursor round-trip.
const FETCH_ROWS: i32 = 256;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Column type of the value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Values must be valid JSON text.
    #[default]
    Jsonb,
    /// Values are stored verbatim.
    Text,
}

impl ValueType {
    fn sql(self) -> &'static str {
        match self {
            ValueType::Jsonb => "jsonb",
            ValueType::Text => "text",
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = KVError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonb" => Ok(ValueType::Jsonb),
            "text" => Ok(ValueType::Text),
            _ => Err(KVError::InvalidInput(format!("unknown value type {s:?}"))),
        }
    }
}

/// Configuration for a PostgreSQL store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Store name. The table is `kv_<name>`.
    pub name: String,

    /// libpq-style connection string or URL, e.g.
    /// `host=localhost user=test password=test dbname=test`.
    pub connection: String,

    #[serde(default)]
    pub value_type: ValueType,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl PostgresConfig {
    pub fn new(name: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: connection.into(),
            value_type: ValueType::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl From<postgres::Error> for KVError {
    fn from(e: postgres::Error) -> Self {
        KVError::Backend(e.to_string())
    }
}

impl From<r2d2::Error> for KVError {
    fn from(e: r2d2::Error) -> Self {
        KVError::Backend(e.to_string())
    }
}

fn sql_params<'a>(params: &'a [Param<'_>]) -> Vec<&'a (dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| match p {
            Param::Text(s) => s as &(dyn ToSql + Sync),
            Param::Int(i) => i as &(dyn ToSql + Sync),
        })
        .collect()
}

fn templates(table: &str, value_type: ValueType) -> Templates {
    let vt = value_type.sql();
    Templates::new(|stmt| match stmt {
        Stmt::Insert => format!(
            "INSERT INTO {table} (K, V, T) VALUES ($1, $2::text::{vt}, $3) \
             ON CONFLICT (K) DO UPDATE SET V = EXCLUDED.V, T = EXCLUDED.T"
        ),
        Stmt::Get => format!("SELECT K, V::text, T FROM {table} WHERE K = $1"),
        Stmt::IterateAll => format!("SELECT K, V::text, T FROM {table} ORDER BY K ASC"),
        Stmt::IterateAsc => {
            format!("SELECT K, V::text, T FROM {table} WHERE K >= $1 ORDER BY K ASC LIMIT $2")
        }
        Stmt::IterateDesc => {
            format!("SELECT K, V::text, T FROM {table} WHERE K <= $1 ORDER BY K DESC LIMIT $2")
        }
        Stmt::IterateLatest => {
            format!("SELECT K, V::text, T FROM {table} ORDER BY K DESC LIMIT $1")
        }
        Stmt::Delete => format!("DELETE FROM {table} WHERE K = $1"),
        Stmt::DeleteTag => format!("DELETE FROM {table} WHERE T = $1"),
        Stmt::DeleteTagLt => format!("DELETE FROM {table} WHERE T < $1"),
        Stmt::DeleteAll => format!("DELETE FROM {table}"),
        Stmt::CountAll => format!("SELECT COUNT(K), MIN(K), MAX(K) FROM {table}"),
    })
}

// K uses the "C" collation so key order is byte order, as in SQLite.
fn ddl(table: &str, value_type: ValueType) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (K TEXT COLLATE \"C\" PRIMARY KEY, V {vt}, T TEXT);
         CREATE INDEX IF NOT EXISTS {table}_kt ON {table} (K, T);
         CREATE INDEX IF NOT EXISTS {table}_tk ON {table} (T, K);",
        vt = value_type.sql()
    )
}

/// PostgreSQL implementation of [`Backend`].
///
/// Each call checks a client out of the pool, so a scan callback may call
/// back into the store as long as the pool has a spare connection. Every
/// statement commits on its own; there is no multi-statement transaction.
pub struct PostgresBackend {
    pool: Pool<PostgresConnectionManager<NoTls>>,
    templates: Templates,
}

impl PostgresBackend {
    /// Connect, create the table and indexes, and check every query template.
    pub fn open(config: &PostgresConfig) -> KVResult<Self> {
        let table = table_name(&config.name)?;
        let pg: Config = config.connection.parse()?;
        let manager = PostgresConnectionManager::new(pg, NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections.max(1))
            .build(manager)?;

        let templates = templates(&table, config.value_type);
        {
            let mut client = pool.get()?;
            client.batch_execute(&ddl(&table, config.value_type))?;
            for (_, sql) in templates.iter() {
                client.prepare(sql)?;
            }
        }

        tracing::debug!(
            "kv: opened postgres store {} (value type {})",
            table,
            config.value_type.sql()
        );

        Ok(Self { pool, templates })
    }
}

impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn execute(&self, stmt: Stmt, params: &[Param<'_>]) -> KVResult<u64> {
        let mut client = self.pool.get()?;
        let n = client.execute(self.templates.get(stmt), &sql_params(params))?;
        Ok(n)
    }

    fn query(
        &self,
        stmt: Stmt,
        params: &[Param<'_>],
        visit: &mut dyn FnMut(Entry) -> ControlFlow<()>,
    ) -> KVResult<()> {
        let mut client = self.pool.get()?;
        // Portals need a transaction; it only reads, so dropping it early
        // (on stop) is a plain rollback.
        let mut tx = client.transaction()?;
        let portal = tx.bind(self.templates.get(stmt), &sql_params(params))?;
        loop {
            let mut fetched = 0;
            let mut rows = tx.query_portal_raw(&portal, FETCH_ROWS)?;
            while let Some(row) = rows.next()? {
                fetched += 1;
                let entry = Entry {
                    key: row.try_get(0)?,
                    value: row.try_get::<_, Option<String>>(1)?.unwrap_or_default(),
                    tag: row.try_get::<_, Option<String>>(2)?.unwrap_or_default(),
                };
                if visit(entry).is_break() {
                    return Ok(());
                }
            }
            if fetched < FETCH_ROWS {
                break;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_all(&self) -> KVResult<Count> {
        let mut client = self.pool.get()?;
        let row = client.query_one(self.templates.get(Stmt::CountAll), &[])?;
        Ok(Count::from_aggregate(
            row.try_get(0)?,
            row.try_get(1)?,
            row.try_get(2)?,
        ))
    }
}

impl Store<PostgresBackend> {
    /// Open a PostgreSQL store.
    pub fn open(config: &PostgresConfig) -> KVResult<Self> {
        Ok(Self::new(PostgresBackend::open(config)?))
    }
}
