//! SQLite backend for durable maps.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use super::backend::MapBackend;
use super::error::StoreError;

/// SQLite-based map backend.
///
/// Each store gets its own table inside a shared database file, so the
/// uploading database and the sync database can live side by side.
/// Uses WAL mode for better concurrent read performance.
pub struct SqliteMapBackend {
    /// Database connection (protected by mutex for thread safety).
    conn: Mutex<Connection>,
    /// Table name (versioned for schema migrations).
    table_name: String,
}

impl SqliteMapBackend {
    /// Database schema version.
    const STORE_DB_VERSION: u32 = 1;

    /// Create or open a table in the SQLite database at the given path.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `name` - Store name, used as the table name prefix
    ///
    /// # Errors
    /// Returns error if the name is invalid or the database cannot be
    /// opened or initialized.
    pub fn open(db_path: &Path, name: &str) -> Result<Self, StoreError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let conn: Connection = Connection::open(db_path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        // Set busy timeout to handle concurrent access
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let table_name: String = format!("{}_v{}", name, Self::STORE_DB_VERSION);

        let create_sql: String = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            table_name
        );
        conn.execute(&create_sql, [])?;

        Ok(Self {
            conn: Mutex::new(conn),
            table_name,
        })
    }

    /// Get the number of persisted entries.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait::async_trait]
impl MapBackend for SqliteMapBackend {
    async fn load_all(&self) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("SELECT key, value FROM {}", self.table_name))?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;

        let mut entries: Vec<(String, String)> = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    async fn apply(&self, puts: &[(String, String)], deletes: &[String]) -> Result<(), StoreError> {
        if puts.is_empty() && deletes.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();
        let now: i64 = current_epoch_seconds();

        // One transaction per flush keeps the batch atomic
        let tx = conn.unchecked_transaction()?;

        for key in deletes {
            tx.execute(
                &format!("DELETE FROM {} WHERE key = ?", self.table_name),
                params![key],
            )?;
        }

        for (key, value) in puts {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (key, value, updated_at) VALUES (?, ?, ?)",
                    self.table_name
                ),
                params![key, value, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {}", self.table_name), [])?;
        Ok(())
    }
}

/// Get current time as epoch seconds.
fn current_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn kv(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn test_apply_and_load() {
        let dir = tempdir().unwrap();
        let backend = SqliteMapBackend::open(&dir.path().join("store.db"), "uploading").unwrap();

        backend
            .apply(&[kv("a", "1"), kv("b", "2")], &[])
            .await
            .unwrap();
        let mut entries = backend.load_all().await.unwrap();
        entries.sort();
        assert_eq!(entries, vec![kv("a", "1"), kv("b", "2")]);
    }

    #[tokio::test]
    async fn test_apply_replaces_and_deletes() {
        let dir = tempdir().unwrap();
        let backend = SqliteMapBackend::open(&dir.path().join("store.db"), "uploading").unwrap();

        backend.apply(&[kv("a", "1"), kv("b", "2")], &[]).await.unwrap();
        backend
            .apply(&[kv("a", "3")], &["b".to_string()])
            .await
            .unwrap();

        assert_eq!(backend.load_all().await.unwrap(), vec![kv("a", "3")]);
        assert_eq!(backend.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let uploading = SqliteMapBackend::open(&db_path, "uploading").unwrap();
        let sync = SqliteMapBackend::open(&db_path, "sync_meta").unwrap();

        uploading.apply(&[kv("/a", "x")], &[]).await.unwrap();

        assert_eq!(uploading.count().unwrap(), 1);
        assert_eq!(sync.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");

        {
            let backend = SqliteMapBackend::open(&db_path, "uploading").unwrap();
            backend.apply(&[kv("ñ/ñ.txt", "v")], &[]).await.unwrap();
        }

        {
            let backend = SqliteMapBackend::open(&db_path, "uploading").unwrap();
            assert_eq!(backend.load_all().await.unwrap(), vec![kv("ñ/ñ.txt", "v")]);
        }
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempdir().unwrap();
        let backend = SqliteMapBackend::open(&dir.path().join("store.db"), "uploading").unwrap();
        backend.apply(&[kv("a", "1")], &[]).await.unwrap();
        backend.clear().await.unwrap();
        assert_eq!(backend.count().unwrap(), 0);
    }

    #[test]
    fn test_rejects_invalid_name() {
        let dir = tempdir().unwrap();
        let result = SqliteMapBackend::open(&dir.path().join("store.db"), "bad; DROP");
        assert!(matches!(result, Err(StoreError::InvalidName(_))));
    }
}
