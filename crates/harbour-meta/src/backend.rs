use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MetaResult;
use crate::memory::InMemoryMetaStore;
use crate::sqlite::SqliteMetaStore;
use crate::traits::MetadataStore;

/// Which metadata backend to open at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MetaBackend {
    /// Process-local maps. Everything is lost on exit.
    Memory,
    /// A SQLite database file.
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("harbour-meta.db")
}

impl Default for MetaBackend {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

impl MetaBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
        }
    }

    /// Open the configured backend.
    pub fn open(&self) -> MetaResult<Arc<dyn MetadataStore>> {
        let store: Arc<dyn MetadataStore> = match self {
            Self::Memory => Arc::new(InMemoryMetaStore::new()),
            Self::Sqlite { path } => Arc::new(SqliteMetaStore::open(path)?),
        };
        info!(backend = store.backend_name(), "metadata store opened");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sqlite_file() {
        assert_eq!(
            MetaBackend::default(),
            MetaBackend::Sqlite {
                path: "harbour-meta.db".into()
            }
        );
    }

    #[test]
    fn deserializes_tagged_form() {
        let memory: MetaBackend = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(memory, MetaBackend::Memory);

        let sqlite: MetaBackend =
            serde_json::from_str(r#"{"backend":"sqlite","path":"/tmp/x.db"}"#).unwrap();
        assert_eq!(sqlite, MetaBackend::Sqlite { path: "/tmp/x.db".into() });

        let defaulted: MetaBackend = serde_json::from_str(r#"{"backend":"sqlite"}"#).unwrap();
        assert_eq!(defaulted, MetaBackend::default());

        assert!(serde_json::from_str::<MetaBackend>(r#"{"backend":"cassandra"}"#).is_err());
    }

    #[test]
    fn opens_each_backend() {
        assert_eq!(MetaBackend::Memory.open().unwrap().backend_name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let backend = MetaBackend::Sqlite {
            path: dir.path().join("meta.db"),
        };
        let store = backend.open().unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        store.close().unwrap();
    }
}
