//! # Postgres Inventory Store
//!
//! [`InventoryStore`] over a `sqlx` Postgres pool. Each item commit runs in
//! its own transaction; dropping an uncommitted transaction rolls it back.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

use crate::config::DatabaseConfig;
use crate::errors::AppError;
use crate::model::{
    CanonicalUnit, Category, HistoryEvent, HistoryEventType, InventoryGroup, InventoryRecord,
    ShoppingListItem, StorageLocation,
};
use crate::observability;
use crate::store::{shopping_item_name, GroupAssignment, InventoryStore, ItemCommit};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory_groups (
            id BIGSERIAL PRIMARY KEY,
            display_name TEXT NOT NULL,
            icon TEXT NOT NULL,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_groups table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory_records (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            quantity BIGINT NOT NULL CHECK (quantity >= 0),
            unit VARCHAR(16) NOT NULL,
            category VARCHAR(32) NOT NULL,
            purchase_date DATE NOT NULL,
            expiration_date DATE,
            storage_location VARCHAR(16) NOT NULL,
            group_id BIGINT NOT NULL REFERENCES inventory_groups(id),
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_records table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory_history (
            id BIGSERIAL PRIMARY KEY,
            item_name TEXT NOT NULL,
            quantity BIGINT NOT NULL,
            unit VARCHAR(16) NOT NULL,
            category VARCHAR(32) NOT NULL,
            event_type VARCHAR(16) NOT NULL,
            occurred_at TIMESTAMPTZ NOT NULL,
            notes TEXT
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_history table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shopping_list_items (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            unit VARCHAR(16) NOT NULL,
            threshold BIGINT NOT NULL CHECK (threshold >= 0)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shopping_list_items table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS inventory_records_group_id_idx ON inventory_records(group_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create inventory_records group_id index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn corrupt_row(message: String) -> anyhow::Error {
    AppError::Database(message).into()
}

fn parse_unit(value: &str) -> Result<CanonicalUnit> {
    CanonicalUnit::parse(value)
        .ok_or_else(|| corrupt_row(format!("Unknown unit '{}' in database", value)))
}

fn parse_category(value: &str) -> Result<Category> {
    Category::parse(value)
        .ok_or_else(|| corrupt_row(format!("Unknown category '{}' in database", value)))
}

fn parse_quantity(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| corrupt_row(format!("Quantity {} out of range", value)))
}

fn record_from_row(row: &PgRow) -> Result<InventoryRecord> {
    let location: String = row.get("storage_location");
    Ok(InventoryRecord {
        id: row.get("id"),
        name: row.get("name"),
        quantity: parse_quantity(row.get("quantity"))?,
        unit: parse_unit(row.get("unit"))?,
        category: parse_category(row.get("category"))?,
        purchase_date: row.get::<NaiveDate, _>("purchase_date"),
        expiration_date: row.get::<Option<NaiveDate>, _>("expiration_date"),
        storage_location: StorageLocation::parse(&location)
            .ok_or_else(|| {
                corrupt_row(format!("Unknown storage location '{}' in database", location))
            })?,
        group_id: row.get("group_id"),
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryEvent> {
    let event_type: String = row.get("event_type");
    let event_type = match event_type.as_str() {
        "added" => HistoryEventType::Added,
        "consumed" => HistoryEventType::Consumed,
        "discarded" => HistoryEventType::Discarded,
        "adjusted" => HistoryEventType::Adjusted,
        other => return Err(corrupt_row(format!("Unknown history event type '{}'", other))),
    };
    Ok(HistoryEvent {
        item_name: row.get("item_name"),
        quantity: parse_quantity(row.get("quantity"))?,
        unit: parse_unit(row.get("unit"))?,
        category: parse_category(row.get("category"))?,
        event_type,
        timestamp: row.get::<DateTime<Utc>, _>("occurred_at"),
        notes: row.get("notes"),
    })
}

/// Postgres-backed [`InventoryStore`]
#[derive(Debug, Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    /// Wrap an existing pool. The schema must already exist.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the configured pool limits and create the schema
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("DATABASE_URL is not configured"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await
            .context("Failed to connect to database")?;

        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn list_groups(&self) -> Result<Vec<InventoryGroup>> {
        let rows = sqlx::query("SELECT id, display_name, icon FROM inventory_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list inventory groups")?;

        Ok(rows
            .iter()
            .map(|row| InventoryGroup {
                id: row.get(0),
                display_name: row.get(1),
                icon: row.get(2),
            })
            .collect())
    }

    async fn commit_item(&self, commit: ItemCommit) -> Result<InventoryRecord> {
        let span = observability::db_span("commit_item", "inventory_records");
        async move {
            let start_time = Instant::now();
            let mut tx = self
                .pool
                .begin()
                .await
                .context("Failed to begin item transaction")?;

            let group_id: i64 = match &commit.group {
                GroupAssignment::Existing(id) => {
                    sqlx::query("SELECT id FROM inventory_groups WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await
                        .context("Failed to look up inventory group")?
                        .ok_or_else(|| anyhow!("Inventory group {} does not exist", id))?
                        .get(0)
                }
                GroupAssignment::New { display_name, icon } => {
                    sqlx::query(
                        "INSERT INTO inventory_groups (display_name, icon) VALUES ($1, $2) RETURNING id",
                    )
                    .bind(display_name)
                    .bind(icon)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to insert inventory group")?
                    .get(0)
                }
            };

            let record = &commit.record;
            let row = sqlx::query(
                "INSERT INTO inventory_records
                    (name, quantity, unit, category, purchase_date, expiration_date, storage_location, group_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id, name, quantity, unit, category, purchase_date, expiration_date, storage_location, group_id",
            )
            .bind(&record.name)
            .bind(i64::from(record.quantity))
            .bind(record.unit.as_str())
            .bind(record.category.as_str())
            .bind(record.purchase_date)
            .bind(record.expiration_date)
            .bind(record.storage_location.as_str())
            .bind(group_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to insert inventory record")?;
            let inserted = record_from_row(&row)?;

            let history = &commit.history;
            sqlx::query(
                "INSERT INTO inventory_history
                    (item_name, quantity, unit, category, event_type, occurred_at, notes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&history.item_name)
            .bind(i64::from(history.quantity))
            .bind(history.unit.as_str())
            .bind(history.category.as_str())
            .bind(history.event_type.as_str())
            .bind(history.timestamp)
            .bind(&history.notes)
            .execute(&mut *tx)
            .await
            .context("Failed to append history event")?;

            tx.commit().await.context("Failed to commit item transaction")?;

            observability::record_db_metrics("commit_item", start_time.elapsed());
            debug!(record_id = inserted.id, group_id, "Committed item");
            Ok(inserted)
        }
        .instrument(span)
        .await
    }

    async fn list_records(&self) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, quantity, unit, category, purchase_date, expiration_date, storage_location, group_id
             FROM inventory_records ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list inventory records")?;

        rows.iter().map(record_from_row).collect()
    }

    async fn list_history(&self) -> Result<Vec<HistoryEvent>> {
        let rows = sqlx::query(
            "SELECT item_name, quantity, unit, category, event_type, occurred_at, notes
             FROM inventory_history ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list history events")?;

        rows.iter().map(history_from_row).collect()
    }

    async fn list_shopping_items(&self) -> Result<Vec<ShoppingListItem>> {
        let rows = sqlx::query("SELECT id, name, unit, threshold FROM shopping_list_items ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list shopping list items")?;

        rows.iter()
            .map(|row| {
                Ok(ShoppingListItem {
                    id: row.get("id"),
                    name: row.get("name"),
                    unit: parse_unit(row.get("unit"))?,
                    threshold: parse_quantity(row.get("threshold"))?,
                })
            })
            .collect()
    }

    async fn add_shopping_item(
        &self,
        name: &str,
        unit: CanonicalUnit,
        threshold: u32,
    ) -> Result<ShoppingListItem> {
        let name = shopping_item_name(name)?;
        let row = sqlx::query(
            "INSERT INTO shopping_list_items (name, unit, threshold) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(unit.as_str())
        .bind(i64::from(threshold))
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert shopping list item")?;

        Ok(ShoppingListItem {
            id: row.get(0),
            name: name.to_string(),
            unit,
            threshold,
        })
    }

    async fn remove_shopping_items(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM shopping_list_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .context("Failed to remove shopping list items")?;
        Ok(result.rows_affected() as usize)
    }
}
