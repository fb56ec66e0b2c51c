use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Entity fields as JSON, without the id.
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable home for committed entities of every kind.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn insert_entity(&self, kind: EntityKind, body: &Value) -> Result<EntityId>;
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<StoredEntity>>;
    async fn load_entity(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredEntity>>;
    /// Returns `false` when no entity of `kind` has `id`.
    async fn update_entity(&self, kind: EntityKind, id: EntityId, body: &Value) -> Result<bool>;
    /// Returns `false` when no entity of `kind` has `id`.
    async fn delete_entity(&self, kind: EntityKind, id: EntityId) -> Result<bool>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Closes the pool; every later query fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                kind       TEXT NOT NULL,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure entities table exists")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities (kind, id)")
            .execute(&self.pool)
            .await
            .context("failed to ensure entities kind index exists")?;

        Ok(())
    }
}

#[async_trait]
impl EntityRepository for Storage {
    async fn insert_entity(&self, kind: EntityKind, body: &Value) -> Result<EntityId> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO entities (kind, body, created_at, updated_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(kind.as_str())
        .bind(body.to_string())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert {kind}"))?;
        Ok(EntityId(rec.get::<i64, _>(0)))
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<StoredEntity>> {
        let rows = sqlx::query(
            "SELECT id, kind, body, created_at, updated_at FROM entities WHERE kind = ? ORDER BY id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list {kind} entities"))?;
        rows.iter().map(stored_entity_from_row).collect()
    }

    async fn load_entity(&self, kind: EntityKind, id: EntityId) -> Result<Option<StoredEntity>> {
        let row = sqlx::query(
            "SELECT id, kind, body, created_at, updated_at FROM entities WHERE kind = ? AND id = ?",
        )
        .bind(kind.as_str())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load {kind} {id}"))?;
        row.as_ref().map(stored_entity_from_row).transpose()
    }

    async fn update_entity(&self, kind: EntityKind, id: EntityId, body: &Value) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE entities SET body = ?, updated_at = ? WHERE kind = ? AND id = ?",
        )
        .bind(body.to_string())
        .bind(Utc::now())
        .bind(kind.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update {kind} {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_entity(&self, kind: EntityKind, id: EntityId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE kind = ? AND id = ?")
            .bind(kind.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete {kind} {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn stored_entity_from_row(row: &SqliteRow) -> Result<StoredEntity> {
    let id = EntityId(row.try_get::<i64, _>("id")?);
    let kind: String = row.try_get("kind")?;
    let body: String = row.try_get("body")?;
    Ok(StoredEntity {
        id,
        kind: kind
            .parse()
            .with_context(|| format!("row {id} has an unknown kind"))?,
        body: serde_json::from_str(&body)
            .with_context(|| format!("row {id} holds a corrupt body"))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
