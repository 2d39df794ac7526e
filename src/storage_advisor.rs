//! # Storage Advice
//!
//! Storage-location recommendation and shelf-life estimation. The merge
//! engine only sees the [`StorageAdvisor`] trait; [`RuleBasedStorageAdvisor`]
//! is the built-in table-driven implementation.

use async_trait::async_trait;

use crate::model::{Category, StorageLocation};

/// Where an item should be kept and for how long
#[async_trait]
pub trait StorageAdvisor: Send + Sync {
    async fn recommend_location(&self, name: &str, category: Category) -> StorageLocation;

    async fn shelf_life_days(&self, name: &str, category: Category, location: StorageLocation) -> u32;
}

/// Name fragments that override the category default location
const LOCATION_OVERRIDES: &[(&str, StorageLocation)] = &[
    ("ice cream", StorageLocation::Freezer),
    ("冰淇淋", StorageLocation::Freezer),
    ("冻", StorageLocation::Freezer),
    ("frozen", StorageLocation::Freezer),
    ("tomato", StorageLocation::Pantry),
    ("番茄", StorageLocation::Pantry),
    ("potato", StorageLocation::Pantry),
    ("土豆", StorageLocation::Pantry),
    ("onion", StorageLocation::Pantry),
    ("洋葱", StorageLocation::Pantry),
    ("garlic", StorageLocation::Pantry),
    ("蒜", StorageLocation::Pantry),
    ("uht", StorageLocation::Pantry),
    ("berr", StorageLocation::Fridge),
    ("莓", StorageLocation::Fridge),
    ("grape", StorageLocation::Fridge),
    ("葡萄", StorageLocation::Fridge),
];

/// Name fragments with their own shelf life, in days, for any location
const SHELF_LIFE_OVERRIDES: &[(&str, u32)] = &[
    ("ground", 2),
    ("mince", 2),
    ("馅", 2),
    ("berr", 4),
    ("莓", 4),
    ("banana", 5),
    ("香蕉", 5),
    ("lettuce", 5),
    ("生菜", 5),
    ("hard cheese", 60),
    ("parmesan", 90),
    ("honey", 730),
    ("蜂蜜", 730),
];

/// Table-driven advisor keyed by category and location
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedStorageAdvisor;

impl RuleBasedStorageAdvisor {
    pub fn new() -> Self {
        Self
    }

    fn default_location(category: Category) -> StorageLocation {
        match category {
            Category::Meat
            | Category::Seafood
            | Category::Dairy
            | Category::Eggs
            | Category::Vegetables => StorageLocation::Fridge,
            Category::Frozen => StorageLocation::Freezer,
            Category::Fruit
            | Category::Bakery
            | Category::Grains
            | Category::Condiments
            | Category::Snacks
            | Category::Beverages
            | Category::Other => StorageLocation::Pantry,
        }
    }

    fn base_days(category: Category, location: StorageLocation) -> u32 {
        use StorageLocation::{Freezer, Fridge, Pantry};
        match (category, location) {
            (Category::Meat | Category::Seafood, Fridge) => 3,
            (Category::Meat | Category::Seafood, Freezer) => 90,
            (Category::Meat | Category::Seafood, Pantry) => 1,
            (Category::Dairy, Fridge) => 7,
            (Category::Dairy, Freezer) => 60,
            (Category::Dairy, Pantry) => 1,
            (Category::Eggs, Fridge) => 21,
            (Category::Eggs, Freezer) => 180,
            (Category::Eggs, Pantry) => 7,
            (Category::Vegetables, Fridge) => 7,
            (Category::Vegetables, Freezer) => 240,
            (Category::Vegetables, Pantry) => 14,
            (Category::Fruit, Fridge) => 10,
            (Category::Fruit, Freezer) => 240,
            (Category::Fruit, Pantry) => 5,
            (Category::Bakery, Fridge) => 7,
            (Category::Bakery, Freezer) => 90,
            (Category::Bakery, Pantry) => 4,
            (Category::Frozen, Freezer) => 180,
            (Category::Frozen, _) => 1,
            (Category::Grains, _) => 365,
            (Category::Condiments, _) => 180,
            (Category::Snacks, _) => 90,
            (Category::Beverages, Fridge) => 14,
            (Category::Beverages, _) => 180,
            (Category::Other, _) => 30,
        }
    }
}

#[async_trait]
impl StorageAdvisor for RuleBasedStorageAdvisor {
    async fn recommend_location(&self, name: &str, category: Category) -> StorageLocation {
        let lowered = name.to_lowercase();
        LOCATION_OVERRIDES
            .iter()
            .find(|(fragment, _)| lowered.contains(fragment))
            .map(|(_, location)| *location)
            .unwrap_or_else(|| Self::default_location(category))
    }

    async fn shelf_life_days(&self, name: &str, category: Category, location: StorageLocation) -> u32 {
        let lowered = name.to_lowercase();
        // freezing always extends the table value
        if location != StorageLocation::Freezer {
            if let Some((_, days)) = SHELF_LIFE_OVERRIDES
                .iter()
                .find(|(fragment, _)| lowered.contains(fragment))
            {
                return *days;
            }
        }
        Self::base_days(category, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_category_defaults() {
        let advisor = RuleBasedStorageAdvisor::new();
        assert_eq!(advisor.recommend_location("牛肉", Category::Meat).await, StorageLocation::Fridge);
        assert_eq!(advisor.recommend_location("peas", Category::Frozen).await, StorageLocation::Freezer);
        assert_eq!(advisor.recommend_location("rice", Category::Grains).await, StorageLocation::Pantry);
    }

    #[tokio::test]
    async fn test_name_overrides() {
        let advisor = RuleBasedStorageAdvisor::new();
        assert_eq!(
            advisor.recommend_location("Vanilla Ice Cream", Category::Dairy).await,
            StorageLocation::Freezer
        );
        assert_eq!(
            advisor.recommend_location("Roma tomatoes", Category::Vegetables).await,
            StorageLocation::Pantry
        );
        assert_eq!(
            advisor.recommend_location("Strawberries", Category::Fruit).await,
            StorageLocation::Fridge
        );
    }

    #[tokio::test]
    async fn test_shelf_life_table() {
        let advisor = RuleBasedStorageAdvisor::new();
        assert_eq!(advisor.shelf_life_days("牛奶", Category::Dairy, StorageLocation::Fridge).await, 7);
        assert_eq!(advisor.shelf_life_days("beef", Category::Meat, StorageLocation::Freezer).await, 90);
        assert_eq!(advisor.shelf_life_days("ground beef", Category::Meat, StorageLocation::Fridge).await, 2);
        assert_eq!(advisor.shelf_life_days("ground beef", Category::Meat, StorageLocation::Freezer).await, 90);
        assert_eq!(advisor.shelf_life_days("gadget", Category::Other, StorageLocation::Pantry).await, 30);
    }
}
