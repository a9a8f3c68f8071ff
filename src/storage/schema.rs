use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection},
    ConnectOptions, Connection,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::CacheError;

/// Tables the move touches; both must exist before anything is written.
const REQUIRED_TABLES: [&str; 2] = ["rss_feed", "rss_item"];

// ============================================================================
// Cache
// ============================================================================

/// An open handle to the feed reader's cache database.
///
/// One connection per run. The handle is not pooled or shared, and it is
/// closed by [`Cache::close`] (or dropped) before the lock is released.
pub struct Cache {
    pub(crate) conn: SqliteConnection,
    path: PathBuf,
}

impl Cache {
    /// Open an existing cache file.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` if `path` does not exist; the cache is
    /// owned by the feed reader and is never created here. Returns
    /// `CacheError::MissingTable` if the file is a SQLite database without
    /// the feed reader's tables.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        if !path.is_file() {
            return Err(CacheError::NotFound(path.to_path_buf()));
        }

        // Contention between lock holders is settled by the marker, which
        // fails fast. busy_timeout only applies to SQLite's own file lock when
        // a process that ignores the marker (a sqlite3 shell) is mid-write.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .busy_timeout(Duration::from_secs(5));
        let conn = options.connect().await?;

        let mut cache = Self {
            conn,
            path: path.to_path_buf(),
        };
        cache.check_schema().await?;
        tracing::debug!(path = %path.display(), "Opened cache");
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the underlying connection, flushing any pending work.
    pub async fn close(self) -> Result<(), CacheError> {
        self.conn.close().await?;
        tracing::debug!(path = %self.path.display(), "Closed cache");
        Ok(())
    }

    async fn check_schema(&mut self) -> Result<(), CacheError> {
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN (?, ?)",
        )
        .bind(REQUIRED_TABLES[0])
        .bind(REQUIRED_TABLES[1])
        .fetch_all(&mut self.conn)
        .await?;

        for table in REQUIRED_TABLES {
            if !tables.iter().any(|(name,)| name == table) {
                return Err(CacheError::MissingTable {
                    path: self.path.clone(),
                    table,
                });
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let err = Cache::open(&path).await.err().unwrap();
        assert!(matches!(err, CacheError::NotFound(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_open_rejects_foreign_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query("CREATE TABLE rss_feed (rssurl TEXT PRIMARY KEY)")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();

        let err = Cache::open(&path).await.err().unwrap();
        match err {
            CacheError::MissingTable { table, .. } => assert_eq!(table, "rss_item"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_open_and_close_existing_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        fixture::finish(fixture::create(&path).await).await;

        let cache = Cache::open(&path).await.unwrap();
        assert_eq!(cache.path(), path.as_path());
        cache.close().await.unwrap();
    }
}
