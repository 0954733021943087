//! SQLite-based object store

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::store::{ObjectStore, ObjectStoreName, StoreOp};

/// SQLite-backed implementation of [`ObjectStore`], one table per store
pub struct SqliteObjectStore {
    db_path: Arc<PathBuf>,
    // Shared-cache in-memory databases vanish when the last connection
    // closes; the keepalive pins them for the store's lifetime.
    _keepalive: Option<Arc<Mutex<Connection>>>,
}

impl SqliteObjectStore {
    /// Open (or create) the store at the given path.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let db_path_clone = db_path.clone();

        async_std::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path_clone)?;
            create_tables(&conn)
        })
        .await?;

        Ok(Self {
            db_path: Arc::new(db_path),
            _keepalive: None,
        })
    }

    /// Create an in-memory store for testing.
    pub async fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_path = PathBuf::from(format!("file:fathomdb{}?mode=memory&cache=shared", id));

        let db_path_clone = db_path.clone();
        let keepalive = async_std::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path_clone)?;
            create_tables(&conn)?;
            Ok::<Connection, Error>(conn)
        })
        .await?;

        Ok(Self {
            db_path: Arc::new(db_path),
            _keepalive: Some(Arc::new(Mutex::new(keepalive))),
        })
    }
}

fn create_tables(conn: &Connection) -> Result<()> {
    for store in ObjectStoreName::all() {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL
                )",
                store.table()
            ),
            [],
        )?;
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn get(&self, store: ObjectStoreName, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        let db_path = Arc::clone(&self.db_path);

        async_std::task::spawn_blocking(move || {
            let conn = Connection::open(&*db_path)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT value FROM {} WHERE key = ?1",
                store.table()
            ))?;
            let mut rows = stmt.query(params![key])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let db_path = Arc::clone(&self.db_path);

        async_std::task::spawn_blocking(move || {
            let mut conn = Connection::open(&*db_path)?;
            let tx = conn.transaction()?;
            for op in &ops {
                match op {
                    StoreOp::Put { store, key, value } => {
                        tx.execute(
                            &format!(
                                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                                store.table()
                            ),
                            params![key, value],
                        )?;
                    }
                    StoreOp::Delete { store, key } => {
                        tx.execute(
                            &format!("DELETE FROM {} WHERE key = ?1", store.table()),
                            params![key],
                        )?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear_all(&self) -> Result<()> {
        let db_path = Arc::clone(&self.db_path);

        async_std::task::spawn_blocking(move || {
            let mut conn = Connection::open(&*db_path)?;
            let tx = conn.transaction()?;
            for store in ObjectStoreName::all() {
                tx.execute(&format!("DELETE FROM {}", store.table()), [])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
