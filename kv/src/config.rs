//! Backend selection from serialized configuration.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::postgres::{PostgresBackend, PostgresConfig};
use crate::sqlite::{SqliteBackend, SqliteConfig};
use crate::{DynStore, KVResult, Store};

/// Configuration for either backend, tagged by `backend`.
///
/// ```yaml
/// backend: sqlite
/// name: sessions
/// dir: /var/lib/app
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Sqlite(SqliteConfig),
    Postgres(PostgresConfig),
}

impl StoreConfig {
    /// Store name.
    pub fn name(&self) -> &str {
        match self {
            StoreConfig::Sqlite(c) => &c.name,
            StoreConfig::Postgres(c) => &c.name,
        }
    }

    /// Backend name.
    pub fn backend(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite(_) => "sqlite",
            StoreConfig::Postgres(_) => "postgres",
        }
    }

    /// Open the configured store.
    pub fn open(&self) -> KVResult<DynStore> {
        let backend: Box<dyn Backend> = match self {
            StoreConfig::Sqlite(c) => Box::new(SqliteBackend::open(c)?),
            StoreConfig::Postgres(c) => Box::new(PostgresBackend::open(c)?),
        };
        Ok(Store::new(backend))
    }
}

impl From<SqliteConfig> for StoreConfig {
    fn from(c: SqliteConfig) -> Self {
        StoreConfig::Sqlite(c)
    }
}

impl From<PostgresConfig> for StoreConfig {
    fn from(c: PostgresConfig) -> Self {
        StoreConfig::Postgres(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::ValueType;
    use crate::sqlite::DEFAULT_BUSY_TIMEOUT_MS;

    #[test]
    fn test_sqlite_from_json() {
        let cfg: StoreConfig =
            serde_json::from_str(r#"{"backend":"sqlite","name":"kv_test","dir":"/tmp"}"#).unwrap();
        let StoreConfig::Sqlite(c) = &cfg else {
            panic!("expected sqlite config, got {cfg:?}");
        };
        assert_eq!(c.name, "kv_test");
        assert_eq!(c.dir, "/tmp");
        assert_eq!(c.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(c.journal_mode, None);
        assert_eq!(cfg.name(), "kv_test");
        assert_eq!(cfg.backend(), "sqlite");
    }

    #[test]
    fn test_postgres_defaults() {
        let cfg: StoreConfig = serde_json::from_str(
            r#"{"backend":"postgres","name":"test","connection":"host=localhost"}"#,
        )
        .unwrap();
        let StoreConfig::Postgres(c) = cfg else {
            panic!("expected postgres config");
        };
        assert_eq!(c.value_type, ValueType::Jsonb);
        assert_eq!(c.max_connections, 10);
    }

    #[test]
    fn test_value_type_lowercase() {
        let mut c = PostgresConfig::new("test", "host=localhost");
        c.value_type = ValueType::Text;
        let json = serde_json::to_string(&StoreConfig::from(c)).unwrap();
        assert!(json.contains(r#""backend":"postgres""#));
        assert!(json.contains(r#""value_type":"text""#));
    }

    #[test]
    fn test_unknown_backend() {
        let err = serde_json::from_str::<StoreConfig>(r#"{"backend":"redis","name":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_open_dyn_store() {
        let store = StoreConfig::from(SqliteConfig::in_memory("dyn")).open().unwrap();
        assert_eq!(store.backend().name(), "sqlite");
        store.put("k", "v", "t").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }
}
