//! # Domain Model
//!
//! Types that flow through the intake pipeline, from the raw text of one user
//! action to the persisted inventory record. Categories, units and storage
//! locations are closed enums; string forms exist only at the storage and
//! display boundaries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a raw input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Scan,
    Speech,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Scan => "scan",
            SourceKind::Speech => "speech",
        }
    }
}

/// One unit of user input: an opaque text block handed to the text
/// extraction collaborator (OCR text, a transcript, or a reference the
/// extractor knows how to read).
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub content: String,
    pub locale: Option<String>,
    pub source: SourceKind,
}

impl RawInput {
    pub fn scan(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            locale: None,
            source: SourceKind::Scan,
        }
    }

    pub fn speech(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            locale: None,
            source: SourceKind::Speech,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// Which parsing strategy produced an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMethod {
    Ai,
    Heuristic,
}

impl ParseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMethod::Ai => "ai",
            ParseMethod::Heuristic => "heuristic",
        }
    }
}

/// An item as read from raw text, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub quantity_text: Option<String>,
    pub category_hint: Option<String>,
    pub parse_method: ParseMethod,
}

/// The only units persisted after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalUnit {
    Gram,
    Milliliter,
    Item,
}

impl CanonicalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalUnit::Gram => "gram",
            CanonicalUnit::Milliliter => "milliliter",
            CanonicalUnit::Item => "item",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "gram" => Some(CanonicalUnit::Gram),
            "milliliter" => Some(CanonicalUnit::Milliliter),
            "item" => Some(CanonicalUnit::Item),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed grocery category set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Vegetables,
    Fruit,
    Meat,
    Seafood,
    Dairy,
    Eggs,
    Bakery,
    Grains,
    Condiments,
    Snacks,
    Beverages,
    Frozen,
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Vegetables,
        Category::Fruit,
        Category::Meat,
        Category::Seafood,
        Category::Dairy,
        Category::Eggs,
        Category::Bakery,
        Category::Grains,
        Category::Condiments,
        Category::Snacks,
        Category::Beverages,
        Category::Frozen,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vegetables => "vegetables",
            Category::Fruit => "fruit",
            Category::Meat => "meat",
            Category::Seafood => "seafood",
            Category::Dairy => "dairy",
            Category::Eggs => "eggs",
            Category::Bakery => "bakery",
            Category::Grains => "grains",
            Category::Condiments => "condiments",
            Category::Snacks => "snacks",
            Category::Beverages => "beverages",
            Category::Frozen => "frozen",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Icon shown for an inventory group created from an item of this category
    pub fn icon(&self) -> &'static str {
        match self {
            Category::Vegetables => "🥬",
            Category::Fruit => "🍎",
            Category::Meat => "🥩",
            Category::Seafood => "🐟",
            Category::Dairy => "🥛",
            Category::Eggs => "🥚",
            Category::Bakery => "🍞",
            Category::Grains => "🌾",
            Category::Condiments => "🧂",
            Category::Snacks => "🍪",
            Category::Beverages => "🧃",
            Category::Frozen => "🧊",
            Category::Other => "📦",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item after quantity normalization and classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub name: String,
    pub quantity: u32,
    pub unit: CanonicalUnit,
    pub category: Category,
    pub parse_method: ParseMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    Fridge,
    Freezer,
    Pantry,
}

impl StorageLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Fridge => "fridge",
            StorageLocation::Freezer => "freezer",
            StorageLocation::Pantry => "pantry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fridge" => Some(StorageLocation::Fridge),
            "freezer" => Some(StorageLocation::Freezer),
            "pantry" => Some(StorageLocation::Pantry),
            _ => None,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted physical stock entry
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit: CanonicalUnit,
    pub category: Category,
    pub purchase_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub storage_location: StorageLocation,
    pub group_id: i64,
}

/// Display aggregate of records that denote the same ingredient
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryGroup {
    pub id: i64,
    pub display_name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    Added,
    Consumed,
    Discarded,
    Adjusted,
}

impl HistoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::Added => "added",
            HistoryEventType::Consumed => "consumed",
            HistoryEventType::Discarded => "discarded",
            HistoryEventType::Adjusted => "adjusted",
        }
    }
}

/// Append-only history entry emitted once per merged item
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    pub item_name: String,
    pub quantity: u32,
    pub unit: CanonicalUnit,
    pub category: Category,
    pub event_type: HistoryEventType,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A shopping-list entry that stays on the list until stock reaches `threshold`
#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingListItem {
    pub id: i64,
    pub name: String,
    pub unit: CanonicalUnit,
    pub threshold: u32,
}
