//! # Quantity Normalization
//!
//! Converts free-text quantities such as `"2kg"`, `"3 L"`, `"1 1/2 cups"` or
//! `"两瓶"` into a non-negative integer in one of the three canonical units.
//!
//! All unit knowledge lives in [`UNIT_TABLE`]: one row per spelling, mapping
//! it to a canonical unit and a multiplier. Latin abbreviations and CJK glyphs
//! share the same table.

use crate::model::{CanonicalUnit, Category};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::trace;

/// Declarative conversion table: spelling -> (canonical unit, multiplier)
pub const UNIT_TABLE: &[(&str, CanonicalUnit, f64)] = &[
    // weight
    ("g", CanonicalUnit::Gram, 1.0),
    ("gr", CanonicalUnit::Gram, 1.0),
    ("gram", CanonicalUnit::Gram, 1.0),
    ("grams", CanonicalUnit::Gram, 1.0),
    ("克", CanonicalUnit::Gram, 1.0),
    ("kg", CanonicalUnit::Gram, 1000.0),
    ("kgs", CanonicalUnit::Gram, 1000.0),
    ("kilo", CanonicalUnit::Gram, 1000.0),
    ("kilos", CanonicalUnit::Gram, 1000.0),
    ("kilogram", CanonicalUnit::Gram, 1000.0),
    ("kilograms", CanonicalUnit::Gram, 1000.0),
    ("公斤", CanonicalUnit::Gram, 1000.0),
    ("千克", CanonicalUnit::Gram, 1000.0),
    ("斤", CanonicalUnit::Gram, 500.0),
    ("lb", CanonicalUnit::Gram, 453.592),
    ("lbs", CanonicalUnit::Gram, 453.592),
    ("pound", CanonicalUnit::Gram, 453.592),
    ("pounds", CanonicalUnit::Gram, 453.592),
    ("磅", CanonicalUnit::Gram, 453.592),
    ("oz", CanonicalUnit::Gram, 28.3495),
    ("ounce", CanonicalUnit::Gram, 28.3495),
    ("ounces", CanonicalUnit::Gram, 28.3495),
    ("盎司", CanonicalUnit::Gram, 28.3495),
    // volume
    ("ml", CanonicalUnit::Milliliter, 1.0),
    ("milliliter", CanonicalUnit::Milliliter, 1.0),
    ("milliliters", CanonicalUnit::Milliliter, 1.0),
    ("millilitre", CanonicalUnit::Milliliter, 1.0),
    ("millilitres", CanonicalUnit::Milliliter, 1.0),
    ("毫升", CanonicalUnit::Milliliter, 1.0),
    ("l", CanonicalUnit::Milliliter, 1000.0),
    ("liter", CanonicalUnit::Milliliter, 1000.0),
    ("liters", CanonicalUnit::Milliliter, 1000.0),
    ("litre", CanonicalUnit::Milliliter, 1000.0),
    ("litres", CanonicalUnit::Milliliter, 1000.0),
    ("升", CanonicalUnit::Milliliter, 1000.0),
    ("公升", CanonicalUnit::Milliliter, 1000.0),
    ("gal", CanonicalUnit::Milliliter, 3785.0),
    ("gallon", CanonicalUnit::Milliliter, 3785.0),
    ("gallons", CanonicalUnit::Milliliter, 3785.0),
    ("加仑", CanonicalUnit::Milliliter, 3785.0),
    ("cup", CanonicalUnit::Milliliter, 240.0),
    ("cups", CanonicalUnit::Milliliter, 240.0),
    ("杯", CanonicalUnit::Milliliter, 240.0),
    ("tbsp", CanonicalUnit::Milliliter, 15.0),
    ("tablespoon", CanonicalUnit::Milliliter, 15.0),
    ("tablespoons", CanonicalUnit::Milliliter, 15.0),
    ("汤匙", CanonicalUnit::Milliliter, 15.0),
    ("大勺", CanonicalUnit::Milliliter, 15.0),
    ("tsp", CanonicalUnit::Milliliter, 5.0),
    ("teaspoon", CanonicalUnit::Milliliter, 5.0),
    ("teaspoons", CanonicalUnit::Milliliter, 5.0),
    ("茶匙", CanonicalUnit::Milliliter, 5.0),
    ("小勺", CanonicalUnit::Milliliter, 5.0),
    ("floz", CanonicalUnit::Milliliter, FLUID_OUNCE_ML),
    // counts
    ("x", CanonicalUnit::Item, 1.0),
    ("ea", CanonicalUnit::Item, 1.0),
    ("pc", CanonicalUnit::Item, 1.0),
    ("pcs", CanonicalUnit::Item, 1.0),
    ("piece", CanonicalUnit::Item, 1.0),
    ("pieces", CanonicalUnit::Item, 1.0),
    ("pack", CanonicalUnit::Item, 1.0),
    ("packs", CanonicalUnit::Item, 1.0),
    ("dozen", CanonicalUnit::Item, 12.0),
    ("打", CanonicalUnit::Item, 12.0),
    ("个", CanonicalUnit::Item, 1.0),
    ("瓶", CanonicalUnit::Item, 1.0),
    ("包", CanonicalUnit::Item, 1.0),
    ("盒", CanonicalUnit::Item, 1.0),
    ("袋", CanonicalUnit::Item, 1.0),
    ("罐", CanonicalUnit::Item, 1.0),
    ("只", CanonicalUnit::Item, 1.0),
    ("根", CanonicalUnit::Item, 1.0),
    ("颗", CanonicalUnit::Item, 1.0),
    ("把", CanonicalUnit::Item, 1.0),
    ("条", CanonicalUnit::Item, 1.0),
    ("块", CanonicalUnit::Item, 1.0),
    ("支", CanonicalUnit::Item, 1.0),
];

const FLUID_OUNCE_ML: f64 = 29.5735;

lazy_static! {
    static ref UNIT_LOOKUP: HashMap<&'static str, (CanonicalUnit, f64)> = UNIT_TABLE
        .iter()
        .map(|(spelling, unit, factor)| (*spelling, (*unit, *factor)))
        .collect();

    /// CJK spellings, longest first so that "公斤" wins over "斤"
    static ref CJK_UNITS: Vec<&'static str> = {
        let mut units: Vec<&'static str> = UNIT_TABLE
            .iter()
            .map(|(spelling, _, _)| *spelling)
            .filter(|spelling| !spelling.is_ascii())
            .collect();
        units.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        units
    };

    // Leftmost numeric token. CJK numerals only count when a unit glyph follows,
    // otherwise names like 三文鱼 would read as quantities. A trailing 半
    // after the unit adds one half ("两斤半").
    static ref NUMBER_PATTERN: Regex = Regex::new(
        r"(?P<whole>\d+)\s+(?P<frac_num>\d+)/(?P<frac_den>\d+)|(?P<num>\d+)\s*/\s*(?P<den>\d+)|(?P<decimal>\d+(?:[.,]\d+)?)|(?P<vulgar>[½¼¾⅓⅔])|(?P<cjk>[零一二两三四五六七八九十百]+|半)(?P<cjk_unit>公斤|千克|毫升|公升|加仑|盎司|汤匙|茶匙|大勺|小勺|斤|克|升|磅|杯|打|个|瓶|包|盒|袋|罐|只|根|颗|把|条|块|支)(?P<cjk_half>半)?"
    )
    .expect("Quantity number pattern should be valid");

    static ref LATIN_UNIT: Regex =
        Regex::new(r"^(?P<word>[A-Za-z]+)\.?(?:\s+(?P<second>[A-Za-z]+))?")
            .expect("Latin unit pattern should be valid");
}

/// Free-text quantity -> (integer, canonical unit)
///
/// Stateless and deterministic. Unreadable input degrades to `(1, Item)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityNormalizer;

impl QuantityNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a quantity string.
    ///
    /// The leftmost numeric token is the value (1 when absent); the token
    /// right after it is looked up in [`UNIT_TABLE`]. Unknown or missing
    /// units keep the value and fall back to [`CanonicalUnit::Item`].
    ///
    /// `category_hint` only matters for a bare `oz`: for beverages it is read
    /// as a fluid ounce (millilitres), for everything else as a weight ounce.
    ///
    /// ```rust
    /// use pantry_intake::model::CanonicalUnit;
    /// use pantry_intake::quantity::QuantityNormalizer;
    ///
    /// let normalizer = QuantityNormalizer::new();
    /// assert_eq!(normalizer.normalize("2kg 牛肉", None), (2000, CanonicalUnit::Gram));
    /// assert_eq!(normalizer.normalize("3 L 牛奶", None), (3000, CanonicalUnit::Milliliter));
    /// assert_eq!(normalizer.normalize("", None), (1, CanonicalUnit::Item));
    /// ```
    pub fn normalize(&self, quantity_text: &str, category_hint: Option<Category>) -> (u32, CanonicalUnit) {
        let text = quantity_text.trim();
        if text.is_empty() {
            return (1, CanonicalUnit::Item);
        }

        let (value, unit, factor) = match NUMBER_PATTERN.captures(text) {
            Some(caps) => {
                let Some(full) = caps.get(0) else {
                    return (1, CanonicalUnit::Item);
                };
                if let (Some(cjk), Some(cjk_unit)) = (caps.name("cjk"), caps.name("cjk_unit")) {
                    let half = if caps.name("cjk_half").is_some() { 0.5 } else { 0.0 };
                    let value = cjk_numeral_value(cjk.as_str()).unwrap_or(1.0) + half;
                    let (unit, factor) = UNIT_LOOKUP
                        .get(cjk_unit.as_str())
                        .copied()
                        .unwrap_or((CanonicalUnit::Item, 1.0));
                    (value, unit, factor)
                } else {
                    let value = numeric_value(&caps).unwrap_or(1.0);
                    let (unit, factor) = self.lookup_unit(&text[full.end()..], category_hint);
                    (value, unit, factor)
                }
            }
            None => {
                let (unit, factor) = self.lookup_unit(text, category_hint);
                (1.0, unit, factor)
            }
        };

        let scaled = value * factor;
        if !scaled.is_finite() || scaled < 0.0 {
            return (1, CanonicalUnit::Item);
        }

        let rounded = round_half_up(scaled);
        trace!(
            quantity_text = %quantity_text,
            value = %value,
            unit = %unit,
            result = %rounded,
            "Normalized quantity"
        );
        (rounded, unit)
    }

    /// Look up the unit token at the start of `rest`
    fn lookup_unit(&self, rest: &str, category_hint: Option<Category>) -> (CanonicalUnit, f64) {
        let rest = rest.trim_start();

        if let Some(caps) = LATIN_UNIT.captures(rest) {
            let word = caps
                .name("word")
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let second = caps.name("second").map(|m| m.as_str().to_lowercase());

            if word == "fl" && second.as_deref() == Some("oz") {
                return (CanonicalUnit::Milliliter, FLUID_OUNCE_ML);
            }
            if word == "oz" && category_hint == Some(Category::Beverages) {
                return (CanonicalUnit::Milliliter, FLUID_OUNCE_ML);
            }
            if let Some(entry) = UNIT_LOOKUP.get(word.as_str()) {
                return *entry;
            }
            return (CanonicalUnit::Item, 1.0);
        }

        for spelling in CJK_UNITS.iter() {
            if rest.starts_with(spelling) {
                if let Some(entry) = UNIT_LOOKUP.get(spelling) {
                    return *entry;
                }
            }
        }

        (CanonicalUnit::Item, 1.0)
    }
}

/// Round to the nearest integer, halves away from zero (inputs are non-negative)
fn round_half_up(value: f64) -> u32 {
    // `as` saturates at u32::MAX
    (value + 0.5).floor() as u32
}

fn numeric_value(caps: &regex::Captures<'_>) -> Option<f64> {
    if let (Some(whole), Some(num), Some(den)) = (
        caps.name("whole"),
        caps.name("frac_num"),
        caps.name("frac_den"),
    ) {
        let whole: f64 = whole.as_str().parse().ok()?;
        return Some(whole + fraction(num.as_str(), den.as_str())?);
    }
    if let (Some(num), Some(den)) = (caps.name("num"), caps.name("den")) {
        return fraction(num.as_str(), den.as_str());
    }
    if let Some(decimal) = caps.name("decimal") {
        return parse_decimal(decimal.as_str());
    }
    if let Some(vulgar) = caps.name("vulgar") {
        return match vulgar.as_str() {
            "½" => Some(0.5),
            "¼" => Some(0.25),
            "¾" => Some(0.75),
            "⅓" => Some(1.0 / 3.0),
            "⅔" => Some(2.0 / 3.0),
            _ => None,
        };
    }
    None
}

fn fraction(num: &str, den: &str) -> Option<f64> {
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

/// "1,5" is a decimal comma, "1,000" a thousands separator
fn parse_decimal(token: &str) -> Option<f64> {
    match token.split_once(',') {
        Some((int_part, frac_part)) if frac_part.len() == 3 => {
            format!("{}{}", int_part, frac_part).parse().ok()
        }
        Some((int_part, frac_part)) => format!("{}.{}", int_part, frac_part).parse().ok(),
        None => token.parse().ok(),
    }
}

/// Read a run of CJK numerals: "十二" = 12, "二十" = 20, "一百零五" = 105
fn cjk_numeral_value(numeral: &str) -> Option<f64> {
    if numeral == "半" {
        return Some(0.5);
    }

    let mut total = 0u32;
    let mut digit: Option<u32> = None;
    for glyph in numeral.chars() {
        match glyph {
            '零' => digit = None,
            '一' => digit = Some(1),
            '二' | '两' => digit = Some(2),
            '三' => digit = Some(3),
            '四' => digit = Some(4),
            '五' => digit = Some(5),
            '六' => digit = Some(6),
            '七' => digit = Some(7),
            '八' => digit = Some(8),
            '九' => digit = Some(9),
            '十' => total = total.saturating_add(digit.take().unwrap_or(1) * 10),
            '百' => total = total.saturating_add(digit.take().unwrap_or(1) * 100),
            _ => return None,
        }
    }
    total = total.saturating_add(digit.unwrap_or(0));

    if total == 0 {
        None
    } else {
        Some(f64::from(total))
    }
}
