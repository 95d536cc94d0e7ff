use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::SavedAnalysis;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        // Every connection to an in-memory database gets its own empty database,
        // so keep exactly one alive for the lifetime of the pool
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_analyses (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                document_name TEXT,
                analysis TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_saved_analyses_expires_at ON saved_analyses(expires_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn insert_analysis(&self, saved: &SavedAnalysis) -> Result<()> {
        let analysis_json = serde_json::to_string(&saved.analysis)?;

        sqlx::query(
            r#"
            INSERT INTO saved_analyses (id, email, document_name, analysis, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(saved.id.to_string())
        .bind(&saved.email)
        .bind(&saved.document_name)
        .bind(analysis_json)
        .bind(timestamp(saved.created_at))
        .bind(timestamp(saved.expires_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch a saved analysis regardless of expiry; callers decide what expired means
    pub async fn get_analysis(&self, id: Uuid) -> Result<Option<SavedAnalysis>> {
        let row = sqlx::query("SELECT * FROM saved_analyses WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_saved_analysis(&row)).transpose()
    }

    /// Delete every row whose expiry is at or before `now`, returning the number removed
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM saved_analyses WHERE expires_at <= ?1")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<SavedAnalysis>> {
        let rows = sqlx::query("SELECT * FROM saved_analyses WHERE expires_at <= ?1 ORDER BY expires_at")
            .bind(timestamp(now))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_saved_analysis).collect()
    }

    pub async fn count_active(&self, now: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_analyses WHERE expires_at > ?1")
            .bind(timestamp(now))
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

// Fixed-width UTC timestamps so expiry comparisons can run on the TEXT column
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_saved_analysis(row: &SqliteRow) -> Result<SavedAnalysis> {
    let id: String = row.get("id");
    let analysis: String = row.get("analysis");
    let created_at: String = row.get("created_at");
    let expires_at: String = row.get("expires_at");

    Ok(SavedAnalysis {
        id: Uuid::parse_str(&id)?,
        email: row.get("email"),
        document_name: row.get("document_name"),
        analysis: serde_json::from_str::<Value>(&analysis)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        expires_at: DateTime::parse_from_rfc3339(&expires_at)?.with_timezone(&Utc),
    })
}
