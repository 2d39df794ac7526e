//! # Batch Orchestration
//!
//! Drives a list of raw inputs through the pipeline, strictly one after the
//! other:
//!
//! ```text
//! Idle -> Processing(1) -> ... -> Processing(N) -> Completed
//!              |                       |
//!              +-- quota exceeded -----+--> StoppedByQuota
//!              +-- cancelled ----------+--> Cancelled
//! ```
//!
//! For every input: extract text, parse it, then normalize and merge each
//! parsed item. Inputs are never dispatched concurrently since the AI quota is
//! shared and must be observed between inputs. There is no batch-wide
//! transaction: records committed before a halt stay committed.

use chrono::{NaiveDate, Utc};
use fluent_bundle::FluentValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::category::CategoryClassifier;
use crate::errors::{error_logging, PipelineError};
use crate::extraction::TextExtractor;
use crate::localization::LocalizationManager;
use crate::merge::InventoryMergeEngine;
use crate::model::{NormalizedItem, ParseMethod, ParsedItem, RawInput, ShoppingListItem};
use crate::observability;
use crate::quantity::QuantityNormalizer;
use crate::shopping;
use crate::store::InventoryStore;
use crate::structured_parser::{ParseOutcome, StructuredItemParser};

/// Terminal state of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every input was attempted
    Completed,
    /// The AI quota ran out; later inputs were not attempted
    StoppedByQuota,
    /// The caller abandoned the run; later inputs were not attempted
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Completed => "completed",
            BatchStatus::StoppedByQuota => "stopped_by_quota",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

/// Aggregated outcome of one batch run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Items that were merged, in input order
    pub items: Vec<NormalizedItem>,
    /// Inputs whose text was extracted and parsed
    pub success_count: usize,
    /// Inputs that failed plus items whose merge failed
    pub failure_count: usize,
    /// Merged items produced by the AI strategy
    pub ai_count: usize,
    /// Merged items produced by the heuristic strategy
    pub heuristic_count: usize,
    pub status: BatchStatus,
    /// Shopping-list entries removed because stock reached their threshold
    pub restocked: Vec<ShoppingListItem>,
}

impl BatchResult {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            success_count: 0,
            failure_count: 0,
            ai_count: 0,
            heuristic_count: 0,
            status: BatchStatus::Completed,
            restocked: Vec::new(),
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_result(self)
    }
}

/// The four user-facing outcomes of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTier {
    /// No input could be processed
    AllFailed,
    /// Some inputs were read but none contained an item
    NothingFound,
    /// Items were added, but something failed, was skipped, or both strategies were used
    Partial,
    /// Every input was processed by one strategy without failures
    FullSuccess,
}

impl SummaryTier {
    fn message_key(&self) -> &'static str {
        match self {
            SummaryTier::AllFailed => "summary-all-failed",
            SummaryTier::NothingFound => "summary-nothing-found",
            SummaryTier::Partial => "summary-partial",
            SummaryTier::FullSuccess => "summary-success",
        }
    }
}

/// Counters needed to render one summary message
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub tier: SummaryTier,
    pub item_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub ai_count: usize,
    pub heuristic_count: usize,
    pub stopped_by_quota: bool,
    pub cancelled: bool,
    pub restocked_names: Vec<String>,
}

impl BatchSummary {
    pub fn from_result(result: &BatchResult) -> Self {
        let stopped_by_quota = result.status == BatchStatus::StoppedByQuota;
        let cancelled = result.status == BatchStatus::Cancelled;
        let mixed_methods = result.ai_count > 0 && result.heuristic_count > 0;

        let tier = if result.success_count == 0 && (result.failure_count > 0 || stopped_by_quota) {
            SummaryTier::AllFailed
        } else if result.items.is_empty() {
            SummaryTier::NothingFound
        } else if result.failure_count > 0 || mixed_methods || stopped_by_quota || cancelled {
            SummaryTier::Partial
        } else {
            SummaryTier::FullSuccess
        };

        Self {
            tier,
            item_count: result.items.len(),
            success_count: result.success_count,
            failure_count: result.failure_count,
            ai_count: result.ai_count,
            heuristic_count: result.heuristic_count,
            stopped_by_quota,
            cancelled,
            restocked_names: result.restocked.iter().map(|item| item.name.clone()).collect(),
        }
    }

    /// Whether the run was cancelled before any input was attempted
    pub fn cancelled_before_start(&self) -> bool {
        self.cancelled && self.success_count == 0 && self.failure_count == 0
    }

    /// Render the summary as one user-facing message, one line per note.
    /// A run cancelled before its first input only gets the cancelled note.
    pub fn render(&self, localization: &LocalizationManager, language: &str) -> String {
        let mut lines = Vec::new();
        if !self.cancelled_before_start() {
            lines.push(localization.get_message_with_counts(
                self.tier.message_key(),
                language,
                &[
                    ("items", self.item_count),
                    ("successes", self.success_count),
                    ("failures", self.failure_count),
                    ("ai", self.ai_count),
                    ("heuristic", self.heuristic_count),
                ],
            ));
        }

        if self.stopped_by_quota {
            lines.push(localization.get_message_in_language("summary-quota-note", language, None));
        }
        if self.cancelled {
            lines.push(localization.get_message_in_language("summary-cancelled-note", language, None));
        }
        if !self.restocked_names.is_empty() {
            let names = self.restocked_names.join(", ");
            let args: HashMap<&str, FluentValue<'_>> =
                HashMap::from([("names", FluentValue::from(names.as_str()))]);
            lines.push(localization.get_message_in_language("summary-restocked", language, Some(&args)));
        }

        lines.join("\n")
    }
}

/// Owns one instance of every pipeline component
pub struct BatchOrchestrator {
    extractor: Arc<dyn TextExtractor>,
    parser: StructuredItemParser,
    normalizer: QuantityNormalizer,
    classifier: CategoryClassifier,
    merge_engine: InventoryMergeEngine,
    store: Arc<dyn InventoryStore>,
    purchase_date: Option<NaiveDate>,
}

impl BatchOrchestrator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        parser: StructuredItemParser,
        merge_engine: InventoryMergeEngine,
        store: Arc<dyn InventoryStore>,
    ) -> Self {
        Self {
            extractor,
            parser,
            normalizer: QuantityNormalizer::new(),
            classifier: CategoryClassifier::new(),
            merge_engine,
            store,
            purchase_date: None,
        }
    }

    /// Use a fixed purchase date instead of today's (UTC) date
    pub fn with_purchase_date(mut self, date: NaiveDate) -> Self {
        self.purchase_date = Some(date);
        self
    }

    /// Classify the name, then normalize the quantity with that category
    pub fn normalize_item(&self, parsed: &ParsedItem) -> NormalizedItem {
        let category = self
            .classifier
            .classify(&parsed.name, parsed.category_hint.as_deref());
        let (quantity, unit) = self
            .normalizer
            .normalize(parsed.quantity_text.as_deref().unwrap_or(""), Some(category));

        NormalizedItem {
            name: parsed.name.trim().to_string(),
            quantity,
            unit,
            category,
            parse_method: parsed.parse_method,
        }
    }

    pub async fn run(&self, inputs: &[RawInput]) -> BatchResult {
        self.run_with_cancellation(inputs, CancellationToken::new())
            .await
    }

    /// Process inputs in order until done, out of quota, or cancelled
    pub async fn run_with_cancellation(
        &self,
        inputs: &[RawInput],
        cancel: CancellationToken,
    ) -> BatchResult {
        let span = observability::batch_span(inputs.len());
        self.run_inner(inputs, cancel).instrument(span).await
    }

    async fn run_inner(&self, inputs: &[RawInput], cancel: CancellationToken) -> BatchResult {
        let start_time = Instant::now();
        let purchase_date = self
            .purchase_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let mut result = BatchResult::new();

        info!(inputs = inputs.len(), %purchase_date, "Starting batch");

        for (index, input) in inputs.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(processed = index, remaining = inputs.len() - index, "Batch cancelled");
                result.status = BatchStatus::Cancelled;
                break;
            }

            let span = observability::input_span(index, input.source.as_str());
            let outcome = self.parse_input(input).instrument(span.clone()).await;

            match outcome {
                Ok(outcome) => {
                    observability::record_batch_input("success");
                    result.success_count += 1;
                    self.merge_outcome(outcome, purchase_date, &mut result)
                        .instrument(span)
                        .await;
                }
                Err(err) if err.is_fatal() => {
                    observability::record_batch_input("quota_exceeded");
                    warn!(
                        input_index = index,
                        skipped = inputs.len() - index - 1,
                        "AI quota exceeded, stopping batch"
                    );
                    result.status = BatchStatus::StoppedByQuota;
                    break;
                }
                Err(err) => {
                    observability::record_batch_input("failure");
                    error_logging::log_input_error(&err, err.kind(), index, input.source.as_str());
                    result.failure_count += 1;
                }
            }
        }

        if !result.items.is_empty() {
            match shopping::reconcile_shopping_list(self.store.as_ref(), self.merge_engine.matcher()).await {
                Ok(restocked) => result.restocked = restocked,
                Err(e) => warn!(error = %format!("{:#}", e), "Shopping list reconciliation failed"),
            }
        }

        observability::record_batch_run(result.status.as_str(), start_time.elapsed());
        info!(
            status = result.status.as_str(),
            items = result.items.len(),
            successes = result.success_count,
            failures = result.failure_count,
            ai = result.ai_count,
            heuristic = result.heuristic_count,
            "Batch finished"
        );
        result
    }

    async fn parse_input(&self, input: &RawInput) -> Result<ParseOutcome, PipelineError> {
        let text = self.extractor.extract(input).await?;
        debug!(chars = text.chars().count(), "Extracted input text");
        self.parser.parse(&text, input.locale.as_deref()).await
    }

    async fn merge_outcome(
        &self,
        outcome: ParseOutcome,
        purchase_date: NaiveDate,
        result: &mut BatchResult,
    ) {
        for parsed in &outcome.items {
            let item = self.normalize_item(parsed);
            match self.merge_engine.merge(&item, purchase_date).await {
                Ok(_) => {
                    match item.parse_method {
                        ParseMethod::Ai => result.ai_count += 1,
                        ParseMethod::Heuristic => result.heuristic_count += 1,
                    }
                    result.items.push(item);
                }
                // already logged by the merge engine
                Err(_) => result.failure_count += 1,
            }
        }
    }
}
