use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use pantry_intake::db::*;
use pantry_intake::model::{
    CanonicalUnit, Category, HistoryEvent, HistoryEventType, StorageLocation,
};
use pantry_intake::store::{GroupAssignment, InventoryStore, ItemCommit, NewInventoryRecord};
use sqlx::PgPool;
use std::env;

/// Helper macro to skip tests when database is not available
macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match setup_test_db().await {
            Ok(pool) => $test_fn(PgInventoryStore::new(pool)).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

async fn setup_test_db() -> Result<PgPool> {
    // Skip tests if no DATABASE_URL is provided
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping database tests: DATABASE_URL not set");
            return Err(anyhow::anyhow!("Test database not configured"));
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to test database")?;

    // Clean up any existing test data
    for table in [
        "inventory_history",
        "inventory_records",
        "inventory_groups",
        "shopping_list_items",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {} CASCADE", table))
            .execute(&pool)
            .await?;
    }

    init_database_schema(&pool).await?;

    Ok(pool)
}

fn commit(name: &str, group: GroupAssignment) -> ItemCommit {
    ItemCommit {
        group,
        record: NewInventoryRecord {
            name: name.to_string(),
            quantity: 2000,
            unit: CanonicalUnit::Gram,
            category: Category::Meat,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            expiration_date: NaiveDate::from_ymd_opt(2024, 3, 4),
            storage_location: StorageLocation::Fridge,
        },
        history: HistoryEvent {
            item_name: name.to_string(),
            quantity: 2000,
            unit: CanonicalUnit::Gram,
            category: Category::Meat,
            event_type: HistoryEventType::Added,
            timestamp: Utc::now(),
            notes: Some("parsed via heuristic".to_string()),
        },
    }
}

#[tokio::test]
async fn test_commit_item_round_trip() -> Result<()> {
    skip_if_no_db!(test_commit_item_round_trip_impl)
}

async fn test_commit_item_round_trip_impl(store: PgInventoryStore) -> Result<()> {
    let record = store
        .commit_item(commit(
            "牛肉",
            GroupAssignment::New {
                display_name: "牛肉".to_string(),
                icon: Category::Meat.icon().to_string(),
            },
        ))
        .await?;
    assert_eq!(record.quantity, 2000);
    assert_eq!(record.unit, CanonicalUnit::Gram);
    assert_eq!(record.expiration_date, NaiveDate::from_ymd_opt(2024, 3, 4));

    let groups = store.list_groups().await?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, record.group_id);

    let second = store
        .commit_item(commit("beef", GroupAssignment::Existing(record.group_id)))
        .await?;
    assert_eq!(second.group_id, record.group_id);

    let records = store.list_records().await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], record);

    let history = store.list_history().await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].item_name, "beef");
    assert_eq!(history[1].event_type, HistoryEventType::Added);

    Ok(())
}

#[tokio::test]
async fn test_failed_commit_rolls_back() -> Result<()> {
    skip_if_no_db!(test_failed_commit_rolls_back_impl)
}

async fn test_failed_commit_rolls_back_impl(store: PgInventoryStore) -> Result<()> {
    assert!(store
        .commit_item(commit("ghost", GroupAssignment::Existing(9999)))
        .await
        .is_err());

    assert!(store.list_groups().await?.is_empty());
    assert!(store.list_records().await?.is_empty());
    assert!(store.list_history().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_shopping_list_operations() -> Result<()> {
    skip_if_no_db!(test_shopping_list_operations_impl)
}

async fn test_shopping_list_operations_impl(store: PgInventoryStore) -> Result<()> {
    let milk = store
        .add_shopping_item(" milk ", CanonicalUnit::Milliliter, 1000)
        .await?;
    assert_eq!(milk.name, "milk");
    store.add_shopping_item("eggs", CanonicalUnit::Item, 12).await?;

    assert!(store
        .add_shopping_item("  ", CanonicalUnit::Item, 1)
        .await
        .is_err());
    assert_eq!(store.remove_shopping_items(&[]).await?, 0);
    assert_eq!(store.remove_shopping_items(&[milk.id]).await?, 1);

    let remaining = store.list_shopping_items().await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "eggs");
    assert_eq!(remaining[0].threshold, 12);
    Ok(())
}
