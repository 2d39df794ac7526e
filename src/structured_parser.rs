//! # Structured Item Parser
//!
//! Turns raw text into an ordered list of [`ParsedItem`]s. The AI strategy is
//! tried first; the heuristic line parser takes over whenever the AI is
//! unavailable or its reply breaks the marker contract.
//!
//! ## Reply contract
//!
//! ```text
//! <ITEMS>
//!   <ITEM><NAME>牛肉</NAME><QUANTITY>2kg</QUANTITY><CATEGORY>meat</CATEGORY></ITEM>
//!   <ITEM><NAME>milk</NAME><QUANTITY>3 L</QUANTITY><CATEGORY>dairy</CATEGORY></ITEM>
//! </ITEMS>
//! ```
//!
//! Text outside the outer pair is ignored. A missing `<ITEMS>` or `</ITEMS>`
//! makes the whole reply malformed. Missing `<QUANTITY>`/`<CATEGORY>` tags
//! read as empty; items with an empty `<NAME>` are dropped.
//!
//! ## Error policy
//!
//! | AI outcome                         | Result                              |
//! |------------------------------------|-------------------------------------|
//! | well-formed reply                  | items tagged `ai`                   |
//! | malformed reply / any other error  | heuristic fallback, tagged `heuristic` |
//! | quota exceeded                     | `Err(PipelineError::QuotaExceeded)`, no fallback |

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::ai_client::TextGenerator;
use crate::ai_errors::AiError;
use crate::errors::PipelineError;
use crate::model::{ParseMethod, ParsedItem};
use crate::observability;
use crate::text_processing::{HeuristicParser, ParserConfig};

/// Instruction sent with every AI request
pub const EXTRACTION_INSTRUCTION: &str = "You extract grocery items from receipt text or a spoken shopping note. \
Ignore store names, addresses, dates, prices, totals, taxes and payment lines. \
Answer with exactly one block starting with <ITEMS> and ending with </ITEMS>. \
Inside it, write one <ITEM> block per grocery item containing <NAME>item name</NAME>, \
<QUANTITY>amount with unit as written, or empty</QUANTITY> and \
<CATEGORY>one of: vegetables, fruit, meat, seafood, dairy, eggs, bakery, grains, condiments, snacks, beverages, frozen, other</CATEGORY>. \
Keep item names in the language of the input. If there are no items, answer <ITEMS></ITEMS>.";

lazy_static! {
    static ref OUTER_BLOCK: Regex =
        Regex::new(r"(?is)<ITEMS>(.*?)</ITEMS>").expect("Outer marker pattern should be valid");
    static ref ITEM_BLOCK: Regex =
        Regex::new(r"(?is)<ITEM>(.*?)</ITEM>").expect("Item marker pattern should be valid");
    static ref NAME_TAG: Regex =
        Regex::new(r"(?is)<NAME>(.*?)</NAME>").expect("Name tag pattern should be valid");
    static ref QUANTITY_TAG: Regex =
        Regex::new(r"(?is)<QUANTITY>(.*?)</QUANTITY>").expect("Quantity tag pattern should be valid");
    static ref CATEGORY_TAG: Regex =
        Regex::new(r"(?is)<CATEGORY>(.*?)</CATEGORY>").expect("Category tag pattern should be valid");
}

/// Items produced for one input plus the strategy that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub items: Vec<ParsedItem>,
    pub method: ParseMethod,
}

/// Read the items out of a reply that follows the marker contract
///
/// ```rust
/// use pantry_intake::structured_parser::parse_marked_reply;
///
/// let reply = "Sure!\n<ITEMS><ITEM><NAME>牛奶</NAME><QUANTITY>3 L</QUANTITY></ITEM></ITEMS>";
/// let items = parse_marked_reply(reply).unwrap();
/// assert_eq!(items[0].name, "牛奶");
/// assert_eq!(items[0].category_hint, None);
///
/// assert!(parse_marked_reply("<ITEMS><ITEM><NAME>milk</NAME></ITEM>").is_err());
/// ```
pub fn parse_marked_reply(reply: &str) -> Result<Vec<ParsedItem>, PipelineError> {
    let body = OUTER_BLOCK
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| {
            PipelineError::MalformedResponse("reply lacks the <ITEMS>...</ITEMS> pair".to_string())
        })?
        .as_str();

    let items = ITEM_BLOCK
        .captures_iter(body)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            let name = tag_text(&NAME_TAG, block);
            if name.is_empty() {
                return None;
            }
            let quantity = tag_text(&QUANTITY_TAG, block);
            let category = tag_text(&CATEGORY_TAG, block);
            Some(ParsedItem {
                name,
                quantity_text: (!quantity.is_empty()).then_some(quantity),
                category_hint: (!category.is_empty()).then_some(category),
                parse_method: ParseMethod::Ai,
            })
        })
        .collect();

    Ok(items)
}

fn tag_text(pattern: &Regex, block: &str) -> String {
    pattern
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Two-strategy parser: AI first, heuristic fallback
pub struct StructuredItemParser {
    generator: Arc<dyn TextGenerator>,
    fallback: HeuristicParser,
}

impl StructuredItemParser {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ParserConfig) -> Self {
        Self {
            generator,
            fallback: HeuristicParser::new(config),
        }
    }

    /// Parse one input's text
    ///
    /// Empty text yields an empty outcome without contacting the AI.
    /// Only a quota signal is returned as an error.
    pub async fn parse(
        &self,
        raw_text: &str,
        locale_hint: Option<&str>,
    ) -> Result<ParseOutcome, PipelineError> {
        let start_time = Instant::now();

        if raw_text.trim().is_empty() {
            debug!("Empty text, nothing to parse");
            return Ok(ParseOutcome {
                items: Vec::new(),
                method: ParseMethod::Heuristic,
            });
        }

        let user_message = match locale_hint {
            Some(locale) => format!("Locale: {}\n\n{}", locale, raw_text),
            None => raw_text.to_string(),
        };

        let outcome = match self
            .generator
            .generate(EXTRACTION_INSTRUCTION, &user_message)
            .await
        {
            Ok(reply) => match parse_marked_reply(&reply) {
                Ok(items) => {
                    info!(items = items.len(), "Parsed items with AI");
                    ParseOutcome {
                        items,
                        method: ParseMethod::Ai,
                    }
                }
                Err(err) => {
                    warn!(error = %err, "AI reply unusable, using heuristic parser");
                    self.heuristic(raw_text)
                }
            },
            Err(AiError::QuotaExceeded(message)) => {
                warn!("AI quota exhausted, not falling back");
                return Err(PipelineError::QuotaExceeded(message));
            }
            Err(err) => {
                debug!(error = %err, "AI unavailable, using heuristic parser");
                self.heuristic(raw_text)
            }
        };

        observability::record_parse_metrics(
            outcome.method,
            start_time.elapsed(),
            outcome.items.len(),
        );
        Ok(outcome)
    }

    fn heuristic(&self, raw_text: &str) -> ParseOutcome {
        ParseOutcome {
            items: self.fallback.parse(raw_text),
            method: ParseMethod::Heuristic,
        }
    }
}
