//! # Shopping List Reconciliation
//!
//! A shopping-list entry stays on the list until the stock that counts
//! against it reaches its threshold. Stock for an entry is the sum of the
//! quantities of all records whose name groups with the entry name and whose
//! unit is the entry's unit.

use anyhow::Result;
use tracing::{debug, info};

use crate::matcher::IngredientMatcher;
use crate::model::{InventoryRecord, ShoppingListItem};
use crate::store::InventoryStore;

/// Total stock counting against one shopping-list entry
pub fn stock_for(
    matcher: &IngredientMatcher,
    item: &ShoppingListItem,
    records: &[InventoryRecord],
) -> u64 {
    records
        .iter()
        .filter(|record| record.unit == item.unit)
        .filter(|record| matcher.should_group(&record.name, &item.name))
        .map(|record| u64::from(record.quantity))
        .sum()
}

/// Remove every shopping-list entry whose stock reached its threshold.
/// Returns the removed entries in list order.
pub async fn reconcile_shopping_list(
    store: &dyn InventoryStore,
    matcher: &IngredientMatcher,
) -> Result<Vec<ShoppingListItem>> {
    let items = store.list_shopping_items().await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let records = store.list_records().await?;

    let restocked: Vec<ShoppingListItem> = items
        .into_iter()
        .filter(|item| {
            let stock = stock_for(matcher, item, &records);
            debug!(item = %item.name, stock, threshold = item.threshold, "Shopping list stock");
            stock >= u64::from(item.threshold)
        })
        .collect();

    if !restocked.is_empty() {
        let ids: Vec<i64> = restocked.iter().map(|item| item.id).collect();
        let removed = store.remove_shopping_items(&ids).await?;
        info!(removed, "Removed restocked items from shopping list");
    }

    Ok(restocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::GroupingRules;
    use crate::model::{CanonicalUnit, Category, StorageLocation};
    use chrono::NaiveDate;

    fn record(name: &str, quantity: u32, unit: CanonicalUnit) -> InventoryRecord {
        InventoryRecord {
            id: 1,
            name: name.to_string(),
            quantity,
            unit,
            category: Category::Dairy,
            purchase_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            expiration_date: None,
            storage_location: StorageLocation::Fridge,
            group_id: 1,
        }
    }

    #[test]
    fn test_stock_sums_grouped_names_with_same_unit() {
        let matcher = IngredientMatcher::new(GroupingRules::default());
        let wanted = ShoppingListItem {
            id: 7,
            name: "milk".to_string(),
            unit: CanonicalUnit::Milliliter,
            threshold: 2000,
        };
        let records = vec![
            record("Whole Milk", 1000, CanonicalUnit::Milliliter),
            record("牛奶", 500, CanonicalUnit::Milliliter),
            record("milk", 3, CanonicalUnit::Item),
            record("Bananas", 900, CanonicalUnit::Milliliter),
        ];
        assert_eq!(stock_for(&matcher, &wanted, &records), 1500);
    }
}
