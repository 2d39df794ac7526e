//! # Text Processing Module
//!
//! Deterministic, offline parsing of receipt and transcript text into
//! [`ParsedItem`]s. This is the fallback strategy of the structured parser
//! and never touches the network.
//!
//! ## Features
//!
//! - Noise filtering for receipt headers, totals, prices, dates and store metadata
//! - Leading quantities ("2kg 牛肉", "3 L milk", "两瓶可乐")
//! - Trailing quantities ("Butter 250g 3.49", "鸡蛋10个", "Eggs x12")
//! - Unit alternation built from the quantity unit table, so both modules agree
//!   on which tokens are units
//! - Category hint for every item via the category classifier

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, trace};

use crate::category::CategoryClassifier;
use crate::errors::{AppError, AppResult};
use crate::model::{CanonicalUnit, ParseMethod, ParsedItem};
use crate::quantity::UNIT_TABLE;

/// Configuration options for the heuristic parser
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Lines beyond this count are ignored
    pub max_lines: usize,
    /// Item names are truncated to this many characters
    pub max_name_length: usize,
    /// Additional words that mark a line as noise (lower case)
    pub extra_noise_keywords: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_lines: 200,
            max_name_length: 80,
            extra_noise_keywords: Vec::new(),
        }
    }
}

impl ParserConfig {
    /// Validate parser configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        if self.max_lines == 0 {
            return Err(AppError::Config("max_lines must be greater than 0".to_string()));
        }
        if self.max_name_length == 0 {
            return Err(AppError::Config(
                "max_name_length must be greater than 0".to_string(),
            ));
        }
        if self.extra_noise_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(AppError::Config(
                "extra_noise_keywords cannot contain empty entries".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whole-word markers of receipt metadata (Latin scripts)
const NOISE_WORDS: &[&str] = &[
    "total", "subtotal", "sub", "tax", "vat", "tva", "cash", "change", "card", "visa",
    "mastercard", "receipt", "invoice", "tel", "phone", "fax", "www", "http", "https", "com",
    "thank", "thanks", "merci", "cashier", "store", "date", "time", "balance", "discount",
    "savings", "points", "member", "welcome", "bienvenue", "qty", "amount", "price", "payment",
    "paid", "due", "tendered", "ticket", "caisse", "rendu", "mart", "market", "supermarket",
    "magasin", "st", "street", "ave", "avenue", "rd", "road", "rue", "blvd",
];

/// Substring markers of receipt metadata (CJK)
const NOISE_FRAGMENTS: &[&str] = &[
    "合计", "总计", "小计", "应收", "实收", "找零", "现金", "支付", "微信", "支付宝", "收银",
    "电话", "日期", "时间", "谢谢", "欢迎", "发票", "地址", "单号", "会员", "优惠", "折扣",
    "数量", "单价", "金额", "品名", "门店", "超市", "商场", "税", "收据", "流水",
];

/// Build the quantity+unit regex pieces from the shared unit table
///
/// Latin spellings are escaped and sorted longest first so "kg" is tried
/// before "g"; CJK spellings get their own alternation because they need no
/// word boundary.
fn build_unit_alternations() -> (String, String) {
    let mut latin: Vec<&str> = UNIT_TABLE
        .iter()
        .map(|(spelling, _, _)| *spelling)
        .filter(|spelling| spelling.is_ascii())
        .collect();
    latin.push("fl oz");
    let mut cjk: Vec<&str> = UNIT_TABLE
        .iter()
        .map(|(spelling, _, _)| *spelling)
        .filter(|spelling| !spelling.is_ascii())
        .collect();

    let by_length = |a: &&str, b: &&str| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b));
    latin.sort_by(by_length);
    cjk.sort_by(by_length);

    let escape = |units: Vec<&str>| {
        units
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|")
    };
    (escape(latin), escape(cjk))
}

const NUMBER: &str = r"\d+\s+\d+/\d+|\d+/\d+|\d+(?:[.,]\d+)?|[½¼¾⅓⅔]";
const CJK_NUMERAL: &str = r"(?:[零一二两三四五六七八九十百]+|半)";

lazy_static! {
    static ref UNIT_ALTERNATIONS: (String, String) = build_unit_alternations();

    static ref LEADING_QUANTITY: Regex = {
        let (latin, cjk) = &*UNIT_ALTERNATIONS;
        Regex::new(&format!(
            r"(?i)^(?P<qty>(?:{NUMBER})\s*(?:(?:{latin})\.?(?:\s+|$)|(?:{cjk}))?|{CJK_NUMERAL}(?:{cjk})半?)\s*(?P<name>.*)$"
        ))
        .expect("Leading quantity pattern should be valid")
    };

    static ref TRAILING_QUANTITY: Regex = {
        let (latin, cjk) = &*UNIT_ALTERNATIONS;
        Regex::new(&format!(
            r"(?i)^(?P<name>.*?\S)\s*(?P<qty>(?:{NUMBER})\s*(?:(?:{latin})\.?|(?:{cjk}))?|{CJK_NUMERAL}(?:{cjk})半?)$"
        ))
        .expect("Trailing quantity pattern should be valid")
    };

    // "Eggs x12": the multiplier needs whitespace before it so "Max 2" keeps its x
    static ref TRAILING_MULTIPLIER: Regex =
        Regex::new(r"(?i)^(?P<name>.*?\S)\s+(?P<qty>[x×*]\s*\d+)$")
            .expect("Trailing multiplier pattern should be valid");

    // A trailing upper-case code is a tax class ("2.49 A"), unless it spells a
    // weight or volume unit ("1.75L", "1.25 KG")
    static ref TRAILING_PRICE: Regex = Regex::new(
        r"\s*(?:[$€£¥￥]\s*)?-?\d+[.,]\d{2}\s*(?:[$€£¥￥元]|(?P<code>[A-Z]{1,3}))?\s*$"
    )
    .expect("Trailing price pattern should be valid");

    static ref LEADING_CODE: Regex =
        Regex::new(r"^\d{6,}\s+").expect("Leading code pattern should be valid");

    static ref DATE_OR_TIME: Regex = Regex::new(
        r"\b\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}\b|\b\d{1,2}:\d{2}(?::\d{2})?\b"
    )
    .expect("Date pattern should be valid");
}

/// Heuristic line parser used when the AI strategy is unavailable
#[derive(Debug, Clone)]
pub struct HeuristicParser {
    config: ParserConfig,
    classifier: CategoryClassifier,
    extra_noise: HashSet<String>,
}

impl HeuristicParser {
    pub fn new(config: ParserConfig) -> Self {
        let extra_noise = config
            .extra_noise_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect();
        Self {
            config,
            classifier: CategoryClassifier::new(),
            extra_noise,
        }
    }

    /// Parse raw text into items tagged [`ParseMethod::Heuristic`]
    ///
    /// ```rust
    /// use pantry_intake::text_processing::{HeuristicParser, ParserConfig};
    ///
    /// let parser = HeuristicParser::new(ParserConfig::default());
    /// let items = parser.parse("FRESH MART\n2kg 牛肉\nTOTAL 45.00");
    /// assert_eq!(items.len(), 1);
    /// assert_eq!(items[0].name, "牛肉");
    /// assert_eq!(items[0].quantity_text.as_deref(), Some("2kg"));
    /// ```
    pub fn parse(&self, text: &str) -> Vec<ParsedItem> {
        let mut items = Vec::new();
        let mut noise_lines = 0usize;

        for (line_number, raw_line) in text.lines().take(self.config.max_lines).enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if self.is_noise_line(line) {
                trace!(line_number, line = %line, "Skipping noise line");
                noise_lines += 1;
                continue;
            }

            match self.split_line(line) {
                Some((name, quantity_text)) => {
                    let category = self.classifier.classify(&name, None);
                    debug!(
                        line_number,
                        name = %name,
                        quantity = ?quantity_text,
                        category = %category,
                        "Heuristic item"
                    );
                    items.push(ParsedItem {
                        name,
                        quantity_text,
                        category_hint: Some(category.as_str().to_string()),
                        parse_method: ParseMethod::Heuristic,
                    });
                }
                None => {
                    noise_lines += 1;
                }
            }
        }

        info!(
            items = items.len(),
            skipped_lines = noise_lines,
            "Heuristic parse finished"
        );
        items
    }

    /// Whether a line carries no item: prices, totals, headers, dates, contacts
    pub fn is_noise_line(&self, line: &str) -> bool {
        let line = line.trim();
        if line.chars().count() < 2 {
            return true;
        }
        if !line.chars().any(char::is_alphabetic) {
            return true;
        }
        if DATE_OR_TIME.is_match(line) {
            return true;
        }

        let lowered = line.to_lowercase();
        if NOISE_FRAGMENTS.iter().any(|fragment| lowered.contains(fragment)) {
            return true;
        }
        if self
            .extra_noise
            .iter()
            .any(|keyword| !keyword.is_ascii() && lowered.contains(keyword.as_str()))
        {
            return true;
        }

        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| NOISE_WORDS.contains(&word) || self.extra_noise.contains(word))
    }

    /// Split a line into (name, quantity text)
    ///
    /// Returns `None` when nothing name-like remains after removing prices,
    /// codes and the quantity.
    pub fn split_line(&self, line: &str) -> Option<(String, Option<String>)> {
        let without_price = strip_trailing_price(line);
        let cleaned = LEADING_CODE.replace(without_price.trim(), "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }

        let (name, quantity) = if let Some(caps) = LEADING_QUANTITY.captures(cleaned) {
            let name = caps.name("name").map(|m| m.as_str()).unwrap_or("");
            if !has_letters(name) {
                // a bare quantity is not an item
                return None;
            }
            let qty = caps.name("qty").map(|m| m.as_str().trim().to_string());
            (name.to_string(), qty)
        } else if let Some(caps) = TRAILING_MULTIPLIER
            .captures(cleaned)
            .or_else(|| TRAILING_QUANTITY.captures(cleaned))
        {
            let name = caps.name("name").map(|m| m.as_str()).unwrap_or("");
            let qty = caps.name("qty").map(|m| m.as_str().trim().to_string());
            if has_letters(name) {
                (name.to_string(), qty)
            } else {
                (cleaned.to_string(), None)
            }
        } else {
            (cleaned.to_string(), None)
        };

        let name = self.clean_name(&name);
        if !has_letters(&name) {
            return None;
        }
        Some((name, quantity))
    }

    fn clean_name(&self, name: &str) -> String {
        let trimmed = name.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '-' | ':' | '*' | '#' | '.' | ',' | '|' | '@')
        });
        let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(self.config.max_name_length).collect()
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

/// Drop a trailing price, keeping measured quantities that look like one
fn strip_trailing_price(line: &str) -> &str {
    let Some(caps) = TRAILING_PRICE.captures(line) else {
        return line;
    };
    let is_measure = caps.name("code").is_some_and(|code| {
        let code = code.as_str().to_lowercase();
        UNIT_TABLE
            .iter()
            .any(|(spelling, unit, _)| *spelling == code && *unit != CanonicalUnit::Item)
    });
    match caps.get(0) {
        Some(price) if !is_measure => &line[..price.start()],
        _ => line,
    }
}

fn has_letters(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}
