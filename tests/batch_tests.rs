//! Batch orchestration tests: quota stop, per-input and per-item failures,
//! cancellation, summary tiers and shopping-list reconciliation.


use pantry_intake::ai_errors::AiError;
use pantry_intake::batch::{BatchStatus, SummaryTier};
use pantry_intake::localization::LocalizationManager;
use pantry_intake::model::{CanonicalUnit, Category, ParseMethod, RawInput};
use pantry_intake::store::{InventoryStore, MemoryStore};
use std::sync::Arc;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

fn receipts(count: usize) -> Vec<RawInput> {
    (1..=count)
        .map(|i| RawInput::scan(format!("receipt {} text", i)))
        .collect()
}

#[tokio::test]
async fn test_quota_on_second_input_stops_batch() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(marked_reply(&[("牛肉", "2kg", "meat"), ("牛奶", "3 L", "dairy")])),
        Err(AiError::QuotaExceeded("insufficient_quota".to_string())),
        Ok(marked_reply(&[("bread", "1", "bakery")])),
    ]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor.clone(), generator.clone(), store.clone());

    let result = orchestrator.run(&receipts(3)).await;

    assert_eq!(result.status, BatchStatus::StoppedByQuota);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.ai_count, 2);
    assert_eq!(result.heuristic_count, 0);

    // input 3 was never attempted
    assert_eq!(extractor.extracted(), 2);
    assert_eq!(generator.calls(), 2);
    assert!(result.items.iter().all(|item| item.name != "bread"));

    // items from input 1 stay committed
    let records = store.list_records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].quantity, records[0].unit), (2000, CanonicalUnit::Gram));
    assert_eq!(records[0].category, Category::Meat);
    assert_eq!((records[1].quantity, records[1].unit), (3000, CanonicalUnit::Milliliter));
    assert_eq!(records[1].category, Category::Dairy);

    let summary = result.summary();
    assert_eq!(summary.tier, SummaryTier::Partial);
    assert!(summary.stopped_by_quota);
}

#[tokio::test]
async fn test_quota_on_first_input_means_all_failed() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![Err(AiError::QuotaExceeded(
        "daily".to_string(),
    ))]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor.clone(), generator, store.clone());

    let result = orchestrator.run(&receipts(2)).await;

    assert_eq!(result.status, BatchStatus::StoppedByQuota);
    assert_eq!(result.success_count, 0);
    assert_eq!(extractor.extracted(), 1);
    assert!(store.list_records().await.unwrap().is_empty());
    assert_eq!(result.summary().tier, SummaryTier::AllFailed);
}

#[tokio::test]
async fn test_unreadable_input_is_skipped() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(marked_reply(&[("eggs", "12", "eggs")])),
        Ok(marked_reply(&[("rice", "1kg", "grains")])),
    ]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor.clone(), generator, store);

    let inputs = vec![
        RawInput::scan("receipt one"),
        RawInput::scan("UNREADABLE photo"),
        RawInput::scan("receipt three"),
    ];
    let result = orchestrator.run(&inputs).await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(extractor.extracted(), 3);
    let names: Vec<&str> = result.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["eggs", "rice"]);
    assert_eq!(result.summary().tier, SummaryTier::Partial);
}

#[tokio::test]
async fn test_persistence_failure_only_drops_that_item() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(marked_reply(&[
        ("milk", "1 L", "dairy"),
        ("poison", "1", "other"),
        ("bread", "1", "bakery"),
    ]))]));
    let store = Arc::new(FailingStore::new("poison"));
    let orchestrator = orchestrator(extractor, generator, store.clone());

    let result = orchestrator.run(&receipts(1)).await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.items.len(), 2);

    let records = store.list_records().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name != "poison"));
    assert_eq!(store.list_history().await.unwrap().len(), 2);
    // the failed item did not leave a group behind
    assert_eq!(store.list_groups().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_reply_counts_as_heuristic() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
        "<ITEMS><ITEM><NAME>牛肉</NAME></ITEM>".to_string(),
    )]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor, generator, store);

    let inputs = vec![RawInput::scan("FRESH MART\n2kg 牛肉\n3 L 牛奶\nTOTAL 45.00")];
    let result = orchestrator.run(&inputs).await;

    assert_eq!(result.success_count, 1);
    assert_eq!(result.ai_count, 0);
    assert_eq!(result.heuristic_count, 2);
    assert!(result
        .items
        .iter()
        .all(|item| item.parse_method == ParseMethod::Heuristic));
    assert_eq!(result.items[0].quantity, 2000);
    assert_eq!(result.items[1].unit, CanonicalUnit::Milliliter);
    assert_eq!(result.summary().tier, SummaryTier::FullSuccess);
}

#[tokio::test]
async fn test_mixed_methods_are_partial() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(marked_reply(&[("milk", "1 L", "dairy")])),
        Err(AiError::Transport("connection reset".to_string())),
    ]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor, generator, store);

    let inputs = vec![RawInput::scan("anything"), RawInput::scan("Sourdough loaf")];
    let result = orchestrator.run(&inputs).await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!((result.ai_count, result.heuristic_count), (1, 1));
    assert_eq!(result.summary().tier, SummaryTier::Partial);
}

#[tokio::test]
async fn test_header_only_text_is_nothing_found() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor, generator, store);

    let inputs = vec![RawInput::scan(
        "FRESH MART #042\n123 Main St\nTel 555-0101\n2024-03-01 14:22\nTHANK YOU",
    )];
    let result = orchestrator.run(&inputs).await;

    assert_eq!(result.status, BatchStatus::Completed);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert!(result.items.is_empty());
    assert_eq!(result.summary().tier, SummaryTier::NothingFound);
}

#[tokio::test]
async fn test_cancelled_batch_attempts_no_inputs() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(extractor.clone(), generator, store);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = orchestrator
        .run_with_cancellation(&receipts(3), cancel)
        .await;

    assert_eq!(result.status, BatchStatus::Cancelled);
    assert_eq!(extractor.extracted(), 0);
    assert_eq!(result.success_count, 0);
    let summary = result.summary();
    assert!(summary.cancelled);

    let localization = LocalizationManager::new().unwrap();
    let text = summary.render(&localization, "en");
    assert_eq!(text.lines().count(), 1, "{text}");
    assert!(!text.contains("0 inputs"), "{text}");
}

#[tokio::test]
async fn test_restocked_items_leave_the_shopping_list() {
    let extractor = Arc::new(CountingExtractor::default());
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(marked_reply(&[
        ("Whole Milk", "1 gal", "dairy"),
        ("eggs", "6", "eggs"),
    ]))]));
    let store = Arc::new(MemoryStore::new());
    store
        .add_shopping_item("milk", CanonicalUnit::Milliliter, 2000)
        .await
        .unwrap();
    store
        .add_shopping_item("eggs", CanonicalUnit::Item, 12)
        .await
        .unwrap();
    let orchestrator = orchestrator(extractor, generator, store.clone());

    let result = orchestrator.run(&receipts(1)).await;

    let restocked: Vec<&str> = result.restocked.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(restocked, vec!["milk"]);
    let remaining = store.list_shopping_items().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "eggs");
}
