use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};
use crate::database::Database;
use crate::models::SavedAnalysis;

// Import logging macros
use crate::log_db_operation;

/// Process-local store; contents are lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<Uuid, SavedAnalysis>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, saved: SavedAnalysis) {
        let mut entries = self.entries.write().await;
        entries.insert(saved.id, saved);
        debug!(store_size = entries.len(), "Stored analysis in memory");
    }

    /// Expired entries are removed on read
    async fn get(&self, id: Uuid, now: DateTime<Utc>) -> Option<SavedAnalysis> {
        let mut entries = self.entries.write().await;

        match entries.get(&id) {
            Some(saved) if !saved.is_expired_at(now) => Some(saved.clone()),
            Some(_) => {
                debug!(analysis_id = %id, "Saved analysis expired, removing");
                entries.remove(&id);
                None
            }
            None => None,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> u64 {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, saved| !saved.is_expired_at(now));
        (before - entries.len()) as u64
    }

    async fn count_active(&self, now: DateTime<Utc>) -> u64 {
        let entries = self.entries.read().await;
        entries.values().filter(|saved| !saved.is_expired_at(now)).count() as u64
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Memory(MemoryStore),
    Sqlite(Database),
}

/// Saved analyses with a fixed retention period, backed by memory or SQLite
#[derive(Debug, Clone)]
pub struct AnalysisStore {
    backend: Backend,
    retention: Duration,
}

impl AnalysisStore {
    pub fn memory(retention: Duration) -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::new()),
            retention,
        }
    }

    pub fn sqlite(database: Database, retention: Duration) -> Self {
        Self {
            backend: Backend::Sqlite(database),
            retention,
        }
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let retention = Duration::try_hours(config.retention_hours)
            .ok_or_else(|| anyhow!("SAVE_RETENTION_HOURS is out of range: {}", config.retention_hours))?;

        match config.backend {
            StorageBackend::Memory => {
                info!(retention_hours = config.retention_hours, "Using in-memory analysis store");
                Ok(Self::memory(retention))
            }
            StorageBackend::Sqlite => {
                let database = Database::new(&config.database_url).await?;
                info!(retention_hours = config.retention_hours, "Using SQLite analysis store");
                Ok(Self::sqlite(database, retention))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Memory(_) => "memory",
            Backend::Sqlite(_) => "sqlite",
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn save(&self, email: &str, document_name: Option<String>, analysis: Value) -> Result<SavedAnalysis> {
        self.save_at(email, document_name, analysis, Utc::now()).await
    }

    pub async fn save_at(
        &self,
        email: &str,
        document_name: Option<String>,
        analysis: Value,
        now: DateTime<Utc>,
    ) -> Result<SavedAnalysis> {
        let start = Instant::now();
        let saved = SavedAnalysis {
            id: Uuid::new_v4(),
            email: email.to_string(),
            document_name,
            analysis,
            created_at: now,
            expires_at: now + self.retention,
        };

        match &self.backend {
            Backend::Memory(store) => store.insert(saved.clone()).await,
            Backend::Sqlite(db) => db.insert_analysis(&saved).await.inspect_err(|e| {
                log_db_operation!(error, "save_analysis", error = e);
            })?,
        }

        log_db_operation!(
            debug,
            "save_analysis",
            analysis_id = saved.id,
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(saved)
    }

    /// Returns `None` for unknown ids and for analyses past their expiry
    pub async fn get(&self, id: Uuid) -> Result<Option<SavedAnalysis>> {
        self.get_at(id, Utc::now()).await
    }

    pub async fn get_at(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<SavedAnalysis>> {
        let start = Instant::now();

        let found = match &self.backend {
            Backend::Memory(store) => store.get(id, now).await,
            Backend::Sqlite(db) => db
                .get_analysis(id)
                .await
                .inspect_err(|e| {
                    log_db_operation!(error, "get_analysis", error = e);
                })?
                .filter(|saved| !saved.is_expired_at(now)),
        };

        log_db_operation!(
            debug,
            "get_analysis",
            analysis_id = id,
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(found)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        let start = Instant::now();

        let removed = match &self.backend {
            Backend::Memory(store) => store.purge_expired(now).await,
            Backend::Sqlite(db) => db.delete_expired(now).await?,
        };

        log_db_operation!(
            debug,
            "purge_expired",
            count = removed,
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(removed)
    }

    pub async fn count_active(&self) -> Result<u64> {
        let now = Utc::now();
        match &self.backend {
            Backend::Memory(store) => Ok(store.count_active(now).await),
            Backend::Sqlite(db) => db.count_active(now).await,
        }
    }

    /// Purge expired analyses on a fixed interval until the runtime shuts down
    pub fn spawn_purge_task(&self, every: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        info!(interval_secs = every.as_secs(), backend = store.backend_name(), "Starting expiry purge task");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        log_db_operation!(info, "purge_expired", format!("removed {} expired analyses", removed));
                    }
                    Err(e) => {
                        log_db_operation!(error, "purge_expired", error = e);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis() -> Value {
        json!({
            "summary": { "title": "Employment agreement" },
            "keyInformation": {},
            "riskAssessment": {},
            "actionPlan": {}
        })
    }

    async fn stores() -> Vec<AnalysisStore> {
        vec![
            AnalysisStore::memory(Duration::hours(24)),
            AnalysisStore::sqlite(Database::new("sqlite::memory:").await.unwrap(), Duration::hours(24)),
        ]
    }

    #[tokio::test]
    async fn test_saved_analysis_expires_after_retention() {
        for store in stores().await {
            let now = Utc::now();
            let saved = store
                .save_at("worker@example.com", Some("offer.pdf".into()), analysis(), now)
                .await
                .unwrap();

            assert_eq!(saved.expires_at - saved.created_at, Duration::hours(24));

            let just_before = now + Duration::hours(24) - Duration::seconds(1);
            let found = store.get_at(saved.id, just_before).await.unwrap();
            assert_eq!(found.map(|s| s.email), Some("worker@example.com".to_string()), "{}", store.backend_name());

            let at_expiry = now + Duration::hours(24);
            assert!(store.get_at(saved.id, at_expiry).await.unwrap().is_none(), "{}", store.backend_name());
        }
    }

    #[tokio::test]
    async fn test_unknown_id_returns_none() {
        for store in stores().await {
            assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired() {
        for store in stores().await {
            let now = Utc::now();
            store.save_at("a@example.com", None, analysis(), now - Duration::hours(25)).await.unwrap();
            store.save_at("b@example.com", None, analysis(), now).await.unwrap();

            assert_eq!(store.purge_expired_at(now).await.unwrap(), 1, "{}", store.backend_name());
            assert_eq!(store.count_active().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_from_config_rejects_overflowing_retention() {
        let config = StorageConfig {
            retention_hours: i64::MAX,
            ..StorageConfig::default()
        };
        assert!(AnalysisStore::from_config(&config).await.is_err());
    }
}
