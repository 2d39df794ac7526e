//! # Inventory Store
//!
//! The persistence collaborator. [`InventoryStore::commit_item`] is the
//! single write path of the pipeline: it creates the group (when needed),
//! inserts the record and appends the history event as one unit, so a failed
//! commit leaves no trace of the item.
//!
//! [`MemoryStore`] keeps everything in process and backs tests and runs
//! without `DATABASE_URL`; [`crate::db::PgInventoryStore`] is the Postgres
//! implementation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::model::{
    CanonicalUnit, Category, HistoryEvent, InventoryGroup, InventoryRecord, ShoppingListItem,
    StorageLocation,
};

/// Trimmed shopping-list name, rejecting blank input
pub fn shopping_item_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Shopping list item name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

/// Which group a committed record joins
#[derive(Debug, Clone, PartialEq)]
pub enum GroupAssignment {
    Existing(i64),
    New { display_name: String, icon: String },
}

/// Record fields before the store assigns ids
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventoryRecord {
    pub name: String,
    pub quantity: u32,
    pub unit: CanonicalUnit,
    pub category: Category,
    pub purchase_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub storage_location: StorageLocation,
}

/// Everything written for one merged item, committed atomically
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCommit {
    pub group: GroupAssignment,
    pub record: NewInventoryRecord,
    pub history: HistoryEvent,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// All groups in creation order
    async fn list_groups(&self) -> Result<Vec<InventoryGroup>>;

    /// Create the group if requested, insert the record and append the
    /// history event. Either all of it is persisted or none of it.
    async fn commit_item(&self, commit: ItemCommit) -> Result<InventoryRecord>;

    async fn list_records(&self) -> Result<Vec<InventoryRecord>>;

    async fn list_history(&self) -> Result<Vec<HistoryEvent>>;

    async fn list_shopping_items(&self) -> Result<Vec<ShoppingListItem>>;

    async fn add_shopping_item(
        &self,
        name: &str,
        unit: CanonicalUnit,
        threshold: u32,
    ) -> Result<ShoppingListItem>;

    /// Remove shopping-list entries, returning how many existed
    async fn remove_shopping_items(&self, ids: &[i64]) -> Result<usize>;
}

#[derive(Debug, Default)]
struct MemoryState {
    groups: Vec<InventoryGroup>,
    records: Vec<InventoryRecord>,
    history: Vec<HistoryEvent>,
    shopping: Vec<ShoppingListItem>,
    next_group_id: i64,
    next_record_id: i64,
    next_shopping_id: i64,
}

/// In-process store guarded by a read-write lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<InventoryGroup>> {
        Ok(self.state.read().groups.clone())
    }

    async fn commit_item(&self, commit: ItemCommit) -> Result<InventoryRecord> {
        let mut state = self.state.write();

        // validate before mutating anything
        let group_id = match &commit.group {
            GroupAssignment::Existing(id) => {
                if !state.groups.iter().any(|g| g.id == *id) {
                    bail!("Inventory group {} does not exist", id);
                }
                *id
            }
            GroupAssignment::New { display_name, .. } => {
                if display_name.trim().is_empty() {
                    bail!("Inventory group name cannot be empty");
                }
                state.next_group_id + 1
            }
        };
        if commit.record.name.trim().is_empty() {
            bail!("Inventory record name cannot be empty");
        }

        if let GroupAssignment::New { display_name, icon } = commit.group {
            state.next_group_id = group_id;
            state.groups.push(InventoryGroup {
                id: group_id,
                display_name,
                icon,
            });
        }

        state.next_record_id += 1;
        let NewInventoryRecord {
            name,
            quantity,
            unit,
            category,
            purchase_date,
            expiration_date,
            storage_location,
        } = commit.record;
        let record = InventoryRecord {
            id: state.next_record_id,
            name,
            quantity,
            unit,
            category,
            purchase_date,
            expiration_date,
            storage_location,
            group_id,
        };
        state.records.push(record.clone());
        state.history.push(commit.history);

        debug!(record_id = record.id, group_id, "Committed item to memory store");
        Ok(record)
    }

    async fn list_records(&self) -> Result<Vec<InventoryRecord>> {
        Ok(self.state.read().records.clone())
    }

    async fn list_history(&self) -> Result<Vec<HistoryEvent>> {
        Ok(self.state.read().history.clone())
    }

    async fn list_shopping_items(&self) -> Result<Vec<ShoppingListItem>> {
        Ok(self.state.read().shopping.clone())
    }

    async fn add_shopping_item(
        &self,
        name: &str,
        unit: CanonicalUnit,
        threshold: u32,
    ) -> Result<ShoppingListItem> {
        let name = shopping_item_name(name)?;
        let mut state = self.state.write();
        state.next_shopping_id += 1;
        let item = ShoppingListItem {
            id: state.next_shopping_id,
            name: name.to_string(),
            unit,
            threshold,
        };
        state.shopping.push(item.clone());
        Ok(item)
    }

    async fn remove_shopping_items(&self, ids: &[i64]) -> Result<usize> {
        let mut state = self.state.write();
        let before = state.shopping.len();
        state.shopping.retain(|item| !ids.contains(&item.id));
        Ok(before - state.shopping.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryEventType;
    use chrono::Utc;

    fn commit(name: &str, group: GroupAssignment) -> ItemCommit {
        ItemCommit {
            group,
            record: NewInventoryRecord {
                name: name.to_string(),
                quantity: 1000,
                unit: CanonicalUnit::Milliliter,
                category: Category::Dairy,
                purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                expiration_date: NaiveDate::from_ymd_opt(2024, 3, 8),
                storage_location: StorageLocation::Fridge,
            },
            history: HistoryEvent {
                item_name: name.to_string(),
                quantity: 1000,
                unit: CanonicalUnit::Milliliter,
                category: Category::Dairy,
                event_type: HistoryEventType::Added,
                timestamp: Utc::now(),
                notes: None,
            },
        }
    }

    #[tokio::test]
    async fn test_commit_creates_group_record_and_history() {
        let store = MemoryStore::new();
        let record = store
            .commit_item(commit(
                "milk",
                GroupAssignment::New {
                    display_name: "milk".to_string(),
                    icon: "🥛".to_string(),
                },
            ))
            .await
            .unwrap();

        let groups = store.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(record.group_id, groups[0].id);

        let second = store
            .commit_item(commit("Whole Milk", GroupAssignment::Existing(groups[0].id)))
            .await
            .unwrap();
        assert_eq!(second.group_id, record.group_id);
        assert_ne!(second.id, record.id);
        assert_eq!(store.list_history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing_behind() {
        let store = MemoryStore::new();
        assert!(store
            .commit_item(commit("milk", GroupAssignment::Existing(42)))
            .await
            .is_err());
        assert!(store
            .commit_item(commit(
                "  ",
                GroupAssignment::New {
                    display_name: "ghost".to_string(),
                    icon: "📦".to_string(),
                },
            ))
            .await
            .is_err());

        assert!(store.list_groups().await.unwrap().is_empty());
        assert!(store.list_records().await.unwrap().is_empty());
        assert!(store.list_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shopping_list_add_and_remove() {
        let store = MemoryStore::new();
        let milk = store
            .add_shopping_item("milk", CanonicalUnit::Milliliter, 1000)
            .await
            .unwrap();
        store
            .add_shopping_item("eggs", CanonicalUnit::Item, 6)
            .await
            .unwrap();
        assert_eq!(store.remove_shopping_items(&[milk.id, 999]).await.unwrap(), 1);
        let remaining = store.list_shopping_items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "eggs");
    }

    #[tokio::test]
    async fn test_blank_shopping_item_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = store
            .add_shopping_item("   ", CanonicalUnit::Item, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Validation(_))
        ));
        assert!(store.list_shopping_items().await.unwrap().is_empty());
    }
}
