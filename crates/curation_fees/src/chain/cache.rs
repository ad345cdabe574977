//! SQLite cache of transaction receipts, keyed by lowercase transaction hash.
//!
//! Receipts never change once mined, so entries are never invalidated.

use crate::chain::normalize::normalize_id;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ReceiptCache {
    conn: Mutex<Connection>,
}

impl ReceiptCache {
    /// Open or create cache at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS receipts (
                tx_hash TEXT PRIMARY KEY,
                receipt_json TEXT NOT NULL,
                cached_utc INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }

    /// Cached receipt JSON for `tx_hash`, if any.
    pub fn get(&self, tx_hash: &str) -> Result<Option<String>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT receipt_json FROM receipts WHERE tx_hash = ?1")?;
        let row = stmt
            .query_row([normalize_id(tx_hash)], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    pub fn put(&self, tx_hash: &str, receipt_json: &str) -> Result<(), CacheError> {
        let cached = time::OffsetDateTime::now_utc().unix_timestamp();
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO receipts (tx_hash, receipt_json, cached_utc) \
             VALUES (?1, ?2, ?3)",
            rusqlite::params![normalize_id(tx_hash), receipt_json, cached],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM receipts", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn put_get_case_insensitive() {
        let cache = ReceiptCache::open_in_memory().unwrap();
        cache.put("0xABC", r#"{"logs":[]}"#).unwrap();
        assert_eq!(cache.get("0xabc").unwrap().as_deref(), Some(r#"{"logs":[]}"#));
        assert!(cache.get("0xdef").unwrap().is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let cache = ReceiptCache::open(tmp.path()).unwrap();
            assert!(cache.is_empty().unwrap());
            cache.put("0x01", "{}").unwrap();
            cache.put("0x01", r#"{"logs":[]}"#).unwrap();
        }
        let cache = ReceiptCache::open(tmp.path()).unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get("0x01").unwrap().as_deref(), Some(r#"{"logs":[]}"#));
    }
}
