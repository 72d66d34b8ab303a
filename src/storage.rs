//! Last-applied filter cache keyed by screen

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::errors::ListError;
use crate::models::FilterMap;

/// Keyed store for the filter each screen last applied successfully.
/// Read once on mount, written after every successful apply.
#[async_trait]
pub trait FilterCache: Send + Sync {
    async fn get(&self, screen: &str) -> Result<Option<FilterMap>, ListError>;

    async fn set(&self, screen: &str, filters: &FilterMap) -> Result<(), ListError>;
}

/// Process-lifetime cache
#[derive(Default)]
pub struct MemoryFilterCache {
    entries: Mutex<HashMap<String, FilterMap>>,
}

impl MemoryFilterCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilterCache for MemoryFilterCache {
    async fn get(&self, screen: &str) -> Result<Option<FilterMap>, ListError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(screen).cloned())
    }

    async fn set(&self, screen: &str, filters: &FilterMap) -> Result<(), ListError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(screen.to_string(), filters.clone());
        Ok(())
    }
}

/// Writes applied filters through to a cache in version order. A write
/// for a version at or below the last one written is skipped, so a slow
/// older apply never overwrites a newer one.
pub struct VersionedCacheWriter {
    cache: Arc<dyn FilterCache>,
    written: tokio::sync::Mutex<u64>,
}

impl VersionedCacheWriter {
    pub fn new(cache: Arc<dyn FilterCache>) -> Self {
        Self {
            cache,
            written: tokio::sync::Mutex::new(0),
        }
    }

    /// Returns false when a newer version was already written
    pub async fn write(&self, version: u64, screen: &str, filters: &FilterMap) -> Result<bool, ListError> {
        let mut written = self.written.lock().await;
        if version <= *written {
            debug!("Skipping cache write v{} for {} (v{} written)", version, screen, *written);
            return Ok(false);
        }
        self.cache.set(screen, filters).await?;
        *written = version;
        Ok(true)
    }
}

/// Cache persisted in SQLite so filters survive restarts
pub struct SqliteFilterCache {
    pool: SqlitePool,
}

impl SqliteFilterCache {
    pub async fn new(database_path: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Path::new(database_path).exists() {
            std::fs::File::create(database_path)
                .with_context(|| format!("Failed to create filter cache at {}", database_path))?;
        }

        let database_url = format!("sqlite://{}", database_path);
        let pool = SqlitePool::connect(&database_url)
            .await
            .with_context(|| format!("Failed to open filter cache at {}", database_path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applied_filters (
                screen TEXT PRIMARY KEY,
                filters_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl FilterCache for SqliteFilterCache {
    async fn get(&self, screen: &str) -> Result<Option<FilterMap>, ListError> {
        let row = sqlx::query("SELECT filters_json FROM applied_filters WHERE screen = ?")
            .bind(screen)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.get("filters_json");
        match serde_json::from_str(&json) {
            Ok(filters) => Ok(Some(filters)),
            Err(e) => {
                // A corrupt entry behaves like no entry; the next apply overwrites it
                warn!("Ignoring unreadable cached filters for {}: {}", screen, e);
                Ok(None)
            }
        }
    }

    async fn set(&self, screen: &str, filters: &FilterMap) -> Result<(), ListError> {
        let json = serde_json::to_string(filters).map_err(|e| ListError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO applied_filters (screen, filters_json, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(screen)
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Cached {} applied filter(s) for {}", filters.len(), screen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterDate, FilterValue};
    use tempfile::TempDir;

    fn sample() -> FilterMap {
        let mut filters = FilterMap::new();
        filters.insert("entityType".into(), FilterValue::select("Trust", "TRUST"));
        filters.insert("startDate".into(), FilterValue::date(FilterDate::parse("2024-01-01").unwrap()));
        filters
    }

    #[tokio::test]
    async fn test_memory_cache_is_keyed_by_screen() {
        let cache = MemoryFilterCache::new();
        cache.set("credit-limits", &sample()).await.unwrap();

        assert_eq!(cache.get("credit-limits").await.unwrap(), Some(sample()));
        assert_eq!(cache.get("debtors").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_versioned_writer_keeps_newest_filters() {
        let cache = Arc::new(MemoryFilterCache::new());
        let writer = VersionedCacheWriter::new(cache.clone());

        let mut newer = sample();
        newer.remove("startDate");
        assert!(writer.write(2, "credit-limits", &newer).await.unwrap());
        assert!(!writer.write(1, "credit-limits", &sample()).await.unwrap());
        assert!(!writer.write(2, "credit-limits", &sample()).await.unwrap());

        assert_eq!(cache.get("credit-limits").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_sqlite_cache_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("filters.db");
        let db_path = db_path.to_str().unwrap();

        {
            let cache = SqliteFilterCache::new(db_path).await.unwrap();
            cache.set("credit-limits", &FilterMap::new()).await.unwrap();
            cache.set("credit-limits", &sample()).await.unwrap();
        }

        let cache = SqliteFilterCache::new(db_path).await.unwrap();
        let cached = cache.get("credit-limits").await.unwrap().unwrap();
        assert_eq!(cached, sample());
        assert_eq!(cached["startDate"].to_param(), "2024-01-01");
        assert_eq!(cache.get("debtors").await.unwrap(), None);
    }
}
