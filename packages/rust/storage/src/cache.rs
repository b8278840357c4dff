//! libSQL-backed HTTP response cache.
//!
//! Successful responses are keyed by URL. Entries older than the configured
//! TTL are treated as missing, so a rerun inside the window never touches the
//! network for URLs it already fetched.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use corpusfetch_shared::{CorpusError, Result};
use libsql::{Connection, Database, Value, params};

use crate::migrations;

/// A stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Response cache handle wrapping a local libSQL database.
pub struct ResponseCache {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    ttl: Duration,
}

impl ResponseCache {
    /// Open or create the cache database at `path`.
    pub async fn open(path: &Path, ttl: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CorpusError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| CorpusError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| CorpusError::Storage(e.to_string()))?;

        let cache = Self { db, conn, ttl };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying cache migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CorpusError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Look up a fresh entry for `url`.
    pub async fn get(&self, url: &str) -> Result<Option<CachedResponse>> {
        let cutoff = self.cutoff();
        let mut rows = self
            .conn
            .query(
                "SELECT url, status, content_type, body, fetched_at
                 FROM http_cache WHERE url = ?1 AND fetched_at >= ?2",
                params![url, cutoff],
            )
            .await
            .map_err(|e| CorpusError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let status = row
                    .get::<i64>(1)
                    .map_err(|e| CorpusError::Storage(e.to_string()))?;
                let fetched_at = row
                    .get::<i64>(4)
                    .map_err(|e| CorpusError::Storage(e.to_string()))?;
                Ok(Some(CachedResponse {
                    url: row
                        .get::<String>(0)
                        .map_err(|e| CorpusError::Storage(e.to_string()))?,
                    status: u16::try_from(status).unwrap_or(200),
                    content_type: row
                        .get::<Option<String>>(2)
                        .map_err(|e| CorpusError::Storage(e.to_string()))?,
                    body: row
                        .get::<Vec<u8>>(3)
                        .map_err(|e| CorpusError::Storage(e.to_string()))?,
                    fetched_at: DateTime::from_timestamp(fetched_at, 0).unwrap_or_default(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(CorpusError::Storage(e.to_string())),
        }
    }

    /// Insert or replace the entry for `response.url`.
    pub async fn put(&self, response: &CachedResponse) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO http_cache (url, status, content_type, body, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(url) DO UPDATE SET
                   status = excluded.status,
                   content_type = excluded.content_type,
                   body = excluded.body,
                   fetched_at = excluded.fetched_at",
                params![
                    response.url.as_str(),
                    i64::from(response.status),
                    response.content_type.as_deref(),
                    Value::Blob(response.body.clone()),
                    response.fetched_at.timestamp(),
                ],
            )
            .await
            .map_err(|e| CorpusError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete entries older than the TTL. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let cutoff = self.cutoff();
        self.conn
            .execute(
                "DELETE FROM http_cache WHERE fetched_at < ?1",
                params![cutoff],
            )
            .await
            .map_err(|e| CorpusError::Storage(e.to_string()))
    }

    fn cutoff(&self) -> i64 {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_sub(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tmp_db() -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("cf-cache-test-{}", Uuid::now_v7()))
            .join("http_cache.db")
    }

    fn response(url: &str, fetched_at: DateTime<Utc>) -> CachedResponse {
        CachedResponse {
            url: url.into(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".into()),
            body: b"<p>cached</p>".to_vec(),
            fetched_at,
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_entry() {
        let path = tmp_db();
        let cache = ResponseCache::open(&path, Duration::from_secs(3600))
            .await
            .unwrap();

        cache
            .put(&response("https://example.com/a", Utc::now()))
            .await
            .unwrap();

        let hit = cache.get("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, b"<p>cached</p>");
        assert_eq!(hit.content_type.as_deref(), Some("text/html; charset=utf-8"));

        assert!(cache.get("https://example.com/b").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn stale_entries_are_misses_and_purged() {
        let path = tmp_db();
        let cache = ResponseCache::open(&path, Duration::from_secs(60))
            .await
            .unwrap();

        let old = Utc::now() - chrono::Duration::hours(2);
        cache
            .put(&response("https://example.com/old", old))
            .await
            .unwrap();

        assert!(cache.get("https://example.com/old").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn reopen_keeps_entries_and_skips_migrations() {
        let path = tmp_db();
        {
            let cache = ResponseCache::open(&path, Duration::from_secs(3600))
                .await
                .unwrap();
            cache
                .put(&response("https://example.com/a", Utc::now()))
                .await
                .unwrap();
        }

        let cache = ResponseCache::open(&path, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(cache.get("https://example.com/a").await.unwrap().is_some());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
