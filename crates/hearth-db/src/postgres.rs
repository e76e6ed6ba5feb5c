//! Postgres entity store

use anyhow::{Context, Result};
use async_trait::async_trait;
use hearth_core::models::{MediaAsset, ParentEntity};
use hearth_core::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::traits::EntityStore;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connect to Postgres and apply pending migrations.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    #[tracing::instrument(skip(self, fields), fields(db.table = "parent_entities"))]
    async fn create_parent(&self, fields: serde_json::Value) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar::<Postgres, Uuid>(
            "INSERT INTO parent_entities (fields) VALUES ($1) RETURNING id",
        )
        .bind(fields)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "parent_entities", db.record_id = %id))]
    async fn find_parent(&self, id: Uuid) -> Result<Option<ParentEntity>, AppError> {
        let row = sqlx::query_as::<Postgres, ParentEntity>(
            "SELECT id, fields, created_at FROM parent_entities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(
        skip(self, storage_paths),
        fields(db.table = "media_assets", parent_id = %parent_id, count = storage_paths.len())
    )]
    async fn bulk_insert_media(
        &self,
        parent_id: Uuid,
        bucket: &str,
        storage_paths: &[String],
    ) -> Result<Vec<MediaAsset>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut assets = Vec::with_capacity(storage_paths.len());

        for (position, path) in storage_paths.iter().enumerate() {
            let asset = sqlx::query_as::<Postgres, MediaAsset>(
                r#"
                INSERT INTO media_assets (parent_id, bucket, storage_path, position)
                VALUES ($1, $2, $3, $4)
                RETURNING id, parent_id, storage_path, bucket, created_at
                "#,
            )
            .bind(parent_id)
            .bind(bucket)
            .bind(path)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await?;
            assets.push(asset);
        }

        tx.commit().await?;
        Ok(assets)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", parent_id = %parent_id))]
    async fn find_media_by_parent(&self, parent_id: Uuid) -> Result<Vec<MediaAsset>, AppError> {
        let rows = sqlx::query_as::<Postgres, MediaAsset>(
            r#"
            SELECT id, parent_id, storage_path, bucket, created_at
            FROM media_assets
            WHERE parent_id = $1
            ORDER BY created_at, position
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.record_id = %id))]
    async fn find_media(&self, id: Uuid) -> Result<Option<MediaAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaAsset>(
            "SELECT id, parent_id, storage_path, bucket, created_at FROM media_assets WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.record_id = %id))]
    async fn delete_media(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", parent_id = %parent_id))]
    async fn delete_media_by_parent(&self, parent_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM media_assets WHERE parent_id = $1")
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "parent_entities", db.record_id = %id))]
    async fn delete_parent(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM parent_entities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
