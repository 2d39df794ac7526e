//! # Inventory Merge Engine
//!
//! Turns one normalized item into a persisted [`InventoryRecord`]:
//!
//! 1. storage location from the [`StorageAdvisor`]
//! 2. shelf life in days, `expiration = purchase + days`
//! 3. first existing group (creation order) whose display name groups with the item, or a new group
//! 4. record insert and
//! 5. one `added` history event, committed together with 3 and 4
//!
//! Every successful merge creates a new physical record. Grouping only decides
//! where the record is displayed; it never suppresses an entry.

use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::errors::{error_logging, PipelineError};
use crate::matcher::IngredientMatcher;
use crate::model::{HistoryEvent, HistoryEventType, InventoryRecord, NormalizedItem};
use crate::observability;
use crate::storage_advisor::StorageAdvisor;
use crate::store::{GroupAssignment, InventoryStore, ItemCommit, NewInventoryRecord};

pub struct InventoryMergeEngine {
    advisor: Arc<dyn StorageAdvisor>,
    store: Arc<dyn InventoryStore>,
    matcher: IngredientMatcher,
}

impl InventoryMergeEngine {
    pub fn new(
        advisor: Arc<dyn StorageAdvisor>,
        store: Arc<dyn InventoryStore>,
        matcher: IngredientMatcher,
    ) -> Self {
        Self {
            advisor,
            store,
            matcher,
        }
    }

    pub fn matcher(&self) -> &IngredientMatcher {
        &self.matcher
    }

    /// Merge one item purchased on `purchase_date`
    ///
    /// A failure leaves nothing of this item in the store and is reported as
    /// [`PipelineError::Persistence`].
    pub async fn merge(
        &self,
        item: &NormalizedItem,
        purchase_date: NaiveDate,
    ) -> Result<InventoryRecord, PipelineError> {
        let span = tracing::info_span!(
            "merge_item",
            item_name = %item.name,
            category = item.category.as_str(),
            component = "merge"
        );

        let result = self.merge_inner(item, purchase_date).instrument(span).await;
        observability::record_merge_metrics(result.is_ok());
        if let Err(err) = &result {
            error_logging::log_merge_error(err, &item.name, item.quantity, item.unit.as_str());
        }
        result
    }

    async fn merge_inner(
        &self,
        item: &NormalizedItem,
        purchase_date: NaiveDate,
    ) -> Result<InventoryRecord, PipelineError> {
        let location = self
            .advisor
            .recommend_location(&item.name, item.category)
            .await;
        let days = self
            .advisor
            .shelf_life_days(&item.name, item.category, location)
            .await;
        let expiration_date = purchase_date.checked_add_days(Days::new(u64::from(days)));
        debug!(location = location.as_str(), days, "Storage advice resolved");

        let groups = self
            .store
            .list_groups()
            .await
            .map_err(|e| PipelineError::Persistence(format!("{:#}", e)))?;

        let group = match groups
            .iter()
            .find(|group| self.matcher.should_group(&group.display_name, &item.name))
        {
            Some(existing) => {
                debug!(group_id = existing.id, group = %existing.display_name, "Joining existing group");
                GroupAssignment::Existing(existing.id)
            }
            None => GroupAssignment::New {
                display_name: item.name.clone(),
                icon: item.category.icon().to_string(),
            },
        };

        let commit = ItemCommit {
            group,
            record: NewInventoryRecord {
                name: item.name.clone(),
                quantity: item.quantity,
                unit: item.unit,
                category: item.category,
                purchase_date,
                expiration_date,
                storage_location: location,
            },
            history: HistoryEvent {
                item_name: item.name.clone(),
                quantity: item.quantity,
                unit: item.unit,
                category: item.category,
                event_type: HistoryEventType::Added,
                timestamp: Utc::now(),
                notes: Some(format!("parsed via {}", item.parse_method.as_str())),
            },
        };

        let record = self
            .store
            .commit_item(commit)
            .await
            .map_err(|e| PipelineError::Persistence(format!("{:#}", e)))?;

        info!(
            record_id = record.id,
            group_id = record.group_id,
            quantity = record.quantity,
            unit = record.unit.as_str(),
            "Merged item into inventory"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::GroupingRules;
    use crate::model::{CanonicalUnit, Category, ParseMethod, StorageLocation};
    use crate::storage_advisor::RuleBasedStorageAdvisor;
    use crate::store::MemoryStore;

    fn engine(store: Arc<MemoryStore>) -> InventoryMergeEngine {
        InventoryMergeEngine::new(
            Arc::new(RuleBasedStorageAdvisor::new()),
            store,
            IngredientMatcher::new(GroupingRules::default()),
        )
    }

    fn item(name: &str, quantity: u32, unit: CanonicalUnit, category: Category) -> NormalizedItem {
        NormalizedItem {
            name: name.to_string(),
            quantity,
            unit,
            category,
            parse_method: ParseMethod::Heuristic,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_merge_sets_location_and_expiration() {
        let store = Arc::new(MemoryStore::new());
        let record = engine(store.clone())
            .merge(&item("牛奶", 3000, CanonicalUnit::Milliliter, Category::Dairy), date())
            .await
            .unwrap();

        assert_eq!(record.storage_location, StorageLocation::Fridge);
        assert_eq!(record.expiration_date, NaiveDate::from_ymd_opt(2024, 3, 8));

        let groups = store.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].display_name, "牛奶");
        assert_eq!(groups[0].icon, Category::Dairy.icon());

        let history = store.list_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, HistoryEventType::Added);
        assert_eq!(history[0].quantity, 3000);
    }

    #[tokio::test]
    async fn test_matching_names_share_a_group_but_not_a_record() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        let first = engine
            .merge(&item("milk", 1000, CanonicalUnit::Milliliter, Category::Dairy), date())
            .await
            .unwrap();
        let second = engine
            .merge(&item("Whole Milk", 3785, CanonicalUnit::Milliliter, Category::Dairy), date())
            .await
            .unwrap();
        let other = engine
            .merge(&item("Bananas", 6, CanonicalUnit::Item, Category::Fruit), date())
            .await
            .unwrap();

        assert_eq!(first.group_id, second.group_id);
        assert_ne!(first.id, second.id);
        assert_ne!(first.group_id, other.group_id);
        assert_eq!(store.list_records().await.unwrap().len(), 3);
        assert_eq!(store.list_groups().await.unwrap().len(), 2);
    }
}
