//! # Pantry Intake
//!
//! Turns unstructured text from a scanned receipt or a transcribed voice note
//! into normalized, categorized household-inventory records, grouped with
//! existing stock and checked against shopping-list thresholds.
//!
//! The pipeline, leaves first:
//! [`quantity`] and [`category`] normalize one item, [`matcher`] decides
//! grouping, [`structured_parser`] reads items out of raw text (AI first,
//! [`text_processing`] as fallback), [`merge`] persists one item and
//! [`batch`] drives a list of inputs through all of it.

pub mod ai_client;
pub mod ai_errors;
pub mod batch;
pub mod category;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod localization;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod observability;
pub mod observability_config;
pub mod quantity;
pub mod shopping;
pub mod storage_advisor;
pub mod store;
pub mod structured_parser;
pub mod text_processing;

// Re-export types for easier access
pub use batch::{BatchOrchestrator, BatchResult, BatchStatus, BatchSummary, SummaryTier};
pub use errors::{AppError, AppResult, PipelineError};
pub use model::{CanonicalUnit, Category, NormalizedItem, ParseMethod, ParsedItem, RawInput};
