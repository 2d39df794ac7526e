//! Parsing and normalization tests across the public API: heuristic line
//! parsing, the AI/fallback strategy switch, quantity normalization,
//! classification and grouping.


use pantry_intake::ai_errors::AiError;
use pantry_intake::category::CategoryClassifier;
use pantry_intake::errors::PipelineError;
use pantry_intake::matcher::{GroupingRules, IngredientMatcher};
use pantry_intake::model::{CanonicalUnit, Category, ParseMethod};
use pantry_intake::quantity::QuantityNormalizer;
use pantry_intake::structured_parser::StructuredItemParser;
use pantry_intake::text_processing::{HeuristicParser, ParserConfig};
use std::sync::Arc;
use test_helpers::{marked_reply, ScriptedGenerator};

fn parser_with(replies: Vec<Result<String, AiError>>) -> (StructuredItemParser, Arc<ScriptedGenerator>) {
    let generator = Arc::new(ScriptedGenerator::new(replies));
    (
        StructuredItemParser::new(generator.clone(), ParserConfig::default()),
        generator,
    )
}

#[test]
fn test_receipt_scenarios() {
    let normalizer = QuantityNormalizer::new();
    let classifier = CategoryClassifier::new();

    assert_eq!(normalizer.normalize("2kg 牛肉", None), (2000, CanonicalUnit::Gram));
    assert_eq!(classifier.classify("牛肉", None), Category::Meat);

    assert_eq!(normalizer.normalize("3 L 牛奶", None), (3000, CanonicalUnit::Milliliter));
    assert_eq!(classifier.classify("牛奶", None), Category::Dairy);
}

#[test]
fn test_normalize_is_deterministic_and_bounded() {
    let normalizer = QuantityNormalizer::new();
    for text in ["", "abc", "1.5 lbs", "½ cup", "两斤", "-3 kg", "999999999999 kg", "2 tbsp", "12"] {
        let first = normalizer.normalize(text, None);
        assert_eq!(first, normalizer.normalize(text, None), "{text}");
        assert!(
            matches!(first.1, CanonicalUnit::Gram | CanonicalUnit::Milliliter | CanonicalUnit::Item),
            "{text}"
        );
    }
}

#[test]
fn test_classify_is_total() {
    let classifier = CategoryClassifier::new();
    assert_eq!(classifier.classify("", None), Category::Other);
    assert_eq!(classifier.classify("flux capacitor", None), Category::Other);
    assert_eq!(classifier.classify("chocolate milk", None), Category::Dairy);
}

#[test]
fn test_item_keywords_outrank_reply_category() {
    let classifier = CategoryClassifier::new();
    assert_eq!(classifier.classify("牛奶", Some("beverages")), Category::Dairy);
    assert_eq!(classifier.classify("beef", Some("dairy")), Category::Meat);
    assert_eq!(classifier.classify("house blend", Some("beverages")), Category::Beverages);
}

#[test]
fn test_compound_cjk_numerals() {
    let normalizer = QuantityNormalizer::new();
    assert_eq!(normalizer.normalize("十二个", None), (12, CanonicalUnit::Item));
    assert_eq!(normalizer.normalize("二十斤", None), (10000, CanonicalUnit::Gram));
}

#[test]
fn test_should_group_examples() {
    let matcher = IngredientMatcher::new(GroupingRules::default());
    assert!(matcher.should_group("Whole Milk", "milk"));
    assert_eq!(
        matcher.should_group("Whole Milk", "milk"),
        matcher.should_group("milk", "Whole Milk")
    );
    assert!(matcher.should_group("scallion", "green onion"));
    assert!(!matcher.should_group("milk", "beef"));
}

#[test]
fn test_header_only_text_yields_no_items() {
    let parser = HeuristicParser::new(ParserConfig::default());
    let text = "WELCOME TO FRESH MART\n88 Harbour Road\nTel: 555-0101\n2024-03-01 09:12\nCashier: 04\n";
    assert!(parser.parse(text).is_empty());
}

#[test]
fn test_max_lines_limits_input() {
    let parser = HeuristicParser::new(ParserConfig {
        max_lines: 2,
        ..ParserConfig::default()
    });
    let items = parser.parse("Apples\nBananas\nCherries\nDates");
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn test_well_formed_reply_is_tagged_ai() {
    let (parser, _) = parser_with(vec![Ok(marked_reply(&[
        ("牛肉", "2kg", "meat"),
        ("牛奶", "3 L", "dairy"),
    ]))]);

    let outcome = parser.parse("收据文本", Some("zh-CN")).await.unwrap();

    assert_eq!(outcome.method, ParseMethod::Ai);
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.items.iter().all(|i| i.parse_method == ParseMethod::Ai));
}

#[tokio::test]
async fn test_missing_closing_marker_falls_back() {
    let (parser, _) = parser_with(vec![Ok(
        "<ITEMS><ITEM><NAME>牛肉</NAME><QUANTITY>2kg</QUANTITY></ITEM>".to_string(),
    )]);

    let outcome = parser
        .parse("2kg 牛肉\nWhole Milk 1L 2.49", None)
        .await
        .unwrap();

    assert_eq!(outcome.method, ParseMethod::Heuristic);
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome
        .items
        .iter()
        .all(|i| i.parse_method == ParseMethod::Heuristic));
}

#[tokio::test]
async fn test_other_ai_errors_fall_back() {
    for error in [
        AiError::RateLimited("slow down".to_string()),
        AiError::Api { status: 500, message: "oops".to_string() },
        AiError::Unavailable("breaker open".to_string()),
        AiError::InvalidResponse("not json".to_string()),
    ] {
        let (parser, _) = parser_with(vec![Err(error)]);
        let outcome = parser.parse("Sourdough loaf", None).await.unwrap();
        assert_eq!(outcome.method, ParseMethod::Heuristic);
        assert_eq!(outcome.items[0].name, "Sourdough loaf");
    }
}

#[tokio::test]
async fn test_quota_does_not_fall_back() {
    let (parser, _) = parser_with(vec![Err(AiError::QuotaExceeded("daily".to_string()))]);

    let result = parser.parse("2kg 牛肉", None).await;

    assert!(matches!(result, Err(PipelineError::QuotaExceeded(_))));
}

#[tokio::test]
async fn test_empty_text_skips_the_ai() {
    let (parser, generator) = parser_with(vec![]);

    let outcome = parser.parse("  \n ", None).await.unwrap();

    assert!(outcome.items.is_empty());
    assert_eq!(generator.calls(), 0);
}
