use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};

use crate::model::{DatabaseDescriptor, DatabaseRecord};
use crate::store::traits::DatabaseStore;

/// Registry records kept as one JSONB document per (organization, database)
/// row, so every upsert is a single-statement atomic replace.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the registry table if it is missing
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registry_databases (
                organization_name TEXT NOT NULL,
                database_name TEXT NOT NULL,
                record JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (organization_name, database_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create registry_databases table")?;

        Ok(())
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<DatabaseRecord> {
    let Json(record): Json<DatabaseRecord> = row
        .try_get("record")
        .context("Failed to decode registry record")?;
    Ok(record)
}

#[async_trait::async_trait]
impl DatabaseStore for PostgresStore {
    async fn get_database(&self, descriptor: &DatabaseDescriptor) -> Result<Option<DatabaseRecord>> {
        let row = sqlx::query(
            "SELECT record FROM registry_databases WHERE organization_name = $1 AND database_name = $2",
        )
        .bind(&descriptor.organization_name)
        .bind(&descriptor.database_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch registry record")?;

        let Some(row) = row else {
            return Ok(None);
        };

        record_from_row(&row).map(Some)
    }

    async fn list_databases(&self, organization_name: Option<&str>) -> Result<Vec<DatabaseRecord>> {
        let rows = match organization_name {
            Some(org) => sqlx::query(
                "SELECT record FROM registry_databases WHERE organization_name = $1 ORDER BY organization_name, database_name",
            )
            .bind(org)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                "SELECT record FROM registry_databases ORDER BY organization_name, database_name",
            )
            .fetch_all(&self.pool)
            .await,
        }
        .context("Failed to list registry records")?;

        rows.iter().map(record_from_row).collect()
    }

    async fn upsert_database(&self, record: DatabaseRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO registry_databases (organization_name, database_name, record)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_name, database_name) DO UPDATE SET
                record = EXCLUDED.record,
                updated_at = NOW()
            "#,
        )
        .bind(&record.organization_name)
        .bind(&record.database_name)
        .bind(Json(&record))
        .execute(&self.pool)
        .await
        .context("Failed to upsert registry record")?;

        Ok(())
    }

    async fn delete_database(&self, descriptor: &DatabaseDescriptor) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM registry_databases WHERE organization_name = $1 AND database_name = $2",
        )
        .bind(&descriptor.organization_name)
        .bind(&descriptor.database_name)
        .execute(&self.pool)
        .await
        .context("Failed to delete registry record")?;

        Ok(result.rows_affected() > 0)
    }
}
