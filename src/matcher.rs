//! # Ingredient Matching
//!
//! Decides whether two item names denote the same grocery concept. Used to
//! place new inventory records into display groups and to sum stock against
//! shopping-list thresholds.
//!
//! ## Algorithm
//!
//! ```text
//! normalize(a), normalize(b):
//!   lower-case, punctuation -> space, collapse whitespace
//!   drop modifier words ("whole", "organic", "500g", ...) and CJK modifier prefixes
//! equal                                  -> true
//! same synonym set                       -> true
//! one contains the other (word-aligned)  -> true, if the shorter side is long enough
//! otherwise                              -> false
//! ```
//!
//! Every step compares the two sides the same way, so the relation is
//! symmetric. It is not transitive: "milk" ~ "chocolate milk" and
//! "chocolate milk" ~ "chocolate" does not make "milk" ~ "chocolate".
//!
//! The synonym sets and modifier words come from [`GroupingRules`], loaded
//! from JSON so the policy can change without a rebuild.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};

lazy_static! {
    static ref SIZE_TOKEN: Regex = Regex::new(r"^\d+(?:[.,]\d+)?(?:[a-z]+)?$")
        .expect("Size token pattern should be valid");
}

/// Configurable grouping policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingRules {
    /// Sets of names that always group together
    pub synonyms: Vec<Vec<String>>,
    /// Descriptive words removed before comparing (brand, size, grade)
    pub modifiers: Vec<String>,
    /// Modifier prefixes stripped from CJK names ("有机", "新鲜", ...)
    #[serde(default)]
    pub cjk_prefixes: Vec<String>,
    /// Minimum character length of the shorter name for containment matching
    pub min_containment_chars: usize,
}

impl Default for GroupingRules {
    fn default() -> Self {
        let sets: &[&[&str]] = &[
            &["scallion", "green onion", "spring onion", "葱", "小葱", "香葱"],
            &["cilantro", "coriander", "香菜"],
            &["eggplant", "aubergine", "茄子"],
            &["zucchini", "courgette", "西葫芦"],
            &["tomato", "tomatoes", "番茄", "西红柿"],
            &["potato", "potatoes", "土豆", "马铃薯"],
            &["egg", "eggs", "鸡蛋"],
            &["milk", "牛奶"],
            &["beef", "牛肉"],
            &["pork", "猪肉"],
            &["chicken", "鸡肉"],
            &["shrimp", "prawn", "prawns", "虾"],
            &["bell pepper", "capsicum", "彩椒", "甜椒"],
            &["ground beef", "minced beef", "beef mince", "牛肉馅"],
        ];
        let modifiers = [
            "whole", "organic", "fresh", "large", "small", "medium", "extra", "premium",
            "free", "range", "low", "fat", "skim", "skimmed", "lite", "light", "natural",
            "value", "pack", "bag", "bottle", "box", "family", "size", "brand", "the", "of",
            "bio", "frais", "entier",
        ];
        let cjk_prefixes = ["有机", "新鲜", "进口", "特级", "精选", "散装", "冷鲜", "纯"];

        Self {
            synonyms: sets
                .iter()
                .map(|set| set.iter().map(|s| s.to_string()).collect())
                .collect(),
            modifiers: modifiers.iter().map(|s| s.to_string()).collect(),
            cjk_prefixes: cjk_prefixes.iter().map(|s| s.to_string()).collect(),
            min_containment_chars: 2,
        }
    }
}

impl GroupingRules {
    /// Validate grouping rules
    pub fn validate(&self) -> AppResult<()> {
        if self.min_containment_chars == 0 {
            return Err(AppError::Config(
                "min_containment_chars must be greater than 0".to_string(),
            ));
        }
        for (i, set) in self.synonyms.iter().enumerate() {
            if set.len() < 2 {
                return Err(AppError::Config(format!(
                    "synonyms[{}] must contain at least two names",
                    i
                )));
            }
            if set.iter().any(|name| name.trim().is_empty()) {
                return Err(AppError::Config(format!(
                    "synonyms[{}] contains an empty name",
                    i
                )));
            }
        }
        if self.modifiers.iter().any(|m| m.trim().is_empty()) {
            return Err(AppError::Config("modifiers cannot contain empty words".to_string()));
        }
        Ok(())
    }
}

/// Load grouping rules from JSON
///
/// Looks at `GROUPING_RULES_PATH` first, then the usual config locations,
/// and falls back to [`GroupingRules::default`].
pub fn load_grouping_rules() -> GroupingRules {
    if let Ok(config_path) = std::env::var("GROUPING_RULES_PATH") {
        info!("Loading grouping rules from environment variable: {}", config_path);
        match load_grouping_rules_from(&config_path) {
            Ok(rules) => return rules,
            Err(e) => warn!(
                "Failed to load grouping rules from '{}': {}. Falling back to default paths.",
                config_path, e
            ),
        }
    }

    let possible_paths = [
        "/app/config/grouping_rules.json",
        "config/grouping_rules.json",
        "../config/grouping_rules.json",
    ];

    for config_path in &possible_paths {
        match load_grouping_rules_from(config_path) {
            Ok(rules) => {
                info!("Loaded grouping rules from fallback path: {}", config_path);
                return rules;
            }
            Err(e) => debug!("Grouping rules not usable at '{}': {}", config_path, e),
        }
    }

    info!("No grouping rules file found, using built-in rules");
    GroupingRules::default()
}

/// Read and validate a grouping rules file
pub fn load_grouping_rules_from(path: &str) -> AppResult<GroupingRules> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read '{}': {}", path, e)))?;
    let rules: GroupingRules = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("cannot parse '{}': {}", path, e)))?;
    rules.validate()?;
    Ok(rules)
}

/// Symmetric same-ingredient test driven by [`GroupingRules`]
#[derive(Debug, Clone)]
pub struct IngredientMatcher {
    rules: GroupingRules,
    /// normalized synonym -> synonym set index
    synonym_index: HashMap<String, usize>,
}

impl IngredientMatcher {
    pub fn new(rules: GroupingRules) -> Self {
        let mut matcher = Self {
            rules,
            synonym_index: HashMap::new(),
        };
        let mut index = HashMap::new();
        for (set_id, set) in matcher.rules.synonyms.iter().enumerate() {
            for name in set {
                let key = matcher.normalize(name);
                if !key.is_empty() {
                    // first set wins when a name appears twice
                    index.entry(key).or_insert(set_id);
                }
            }
        }
        matcher.synonym_index = index;
        matcher
    }

    /// Whether two names should be aggregated under one group.
    /// `should_group(a, b) == should_group(b, a)` for all inputs.
    pub fn should_group(&self, name_a: &str, name_b: &str) -> bool {
        let a = self.normalize(name_a);
        let b = self.normalize(name_b);

        if a.is_empty() || b.is_empty() {
            return false;
        }
        if a == b {
            return true;
        }

        if let (Some(set_a), Some(set_b)) = (self.synonym_index.get(&a), self.synonym_index.get(&b)) {
            if set_a == set_b {
                return true;
            }
        }

        let (shorter, longer) = if a.chars().count() <= b.chars().count() {
            (&a, &b)
        } else {
            (&b, &a)
        };
        if shorter.chars().count() < self.rules.min_containment_chars {
            return false;
        }
        contains_aligned(longer, shorter)
    }

    /// Canonical comparison form of a name
    pub fn normalize(&self, name: &str) -> String {
        let lowered: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        let words: Vec<String> = lowered
            .split_whitespace()
            .filter(|word| !self.rules.modifiers.iter().any(|m| m == word))
            .filter(|word| !SIZE_TOKEN.is_match(word))
            .map(|word| self.strip_cjk_prefixes(word))
            .filter(|word| !word.is_empty())
            .collect();

        words.join(" ")
    }

    fn strip_cjk_prefixes(&self, word: &str) -> String {
        let mut current = word;
        loop {
            let stripped = self
                .rules
                .cjk_prefixes
                .iter()
                .find(|prefix| current.starts_with(prefix.as_str()) && current.len() > prefix.len())
                .map(|prefix| &current[prefix.len()..]);
            match stripped {
                Some(rest) => current = rest,
                None => return current.to_string(),
            }
        }
    }
}

impl Default for IngredientMatcher {
    fn default() -> Self {
        Self::new(GroupingRules::default())
    }
}

/// `needle` occurs in `haystack` on word boundaries. CJK text has no spaces,
/// so a side with CJK characters only needs plain containment.
fn contains_aligned(haystack: &str, needle: &str) -> bool {
    if needle.chars().any(is_cjk) || haystack.chars().any(is_cjk) {
        return haystack.contains(needle);
    }
    let padded_haystack = format!(" {} ", haystack);
    let padded_needle = format!(" {} ", needle);
    padded_haystack.contains(&padded_needle)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> IngredientMatcher {
        IngredientMatcher::default()
    }

    #[test]
    fn test_whole_milk_groups_with_milk() {
        let m = matcher();
        assert!(m.should_group("Whole Milk", "milk"));
        assert_eq!(m.should_group("Whole Milk", "milk"), m.should_group("milk", "Whole Milk"));
    }

    #[test]
    fn test_normalization() {
        let m = matcher();
        assert_eq!(m.normalize("  Organic  Baby-Spinach, 500g "), "baby spinach");
        assert_eq!(m.normalize("有机牛奶"), "牛奶");
        assert_eq!(m.normalize("纯"), "纯");
    }

    #[test]
    fn test_synonyms() {
        let m = matcher();
        assert!(m.should_group("scallion", "Green Onion"));
        assert!(m.should_group("番茄", "西红柿"));
        assert!(m.should_group("Aubergine", "eggplant"));
        assert!(m.should_group("eggs", "鸡蛋"));
    }

    #[test]
    fn test_containment_is_word_aligned() {
        let m = matcher();
        assert!(m.should_group("chicken breast", "chicken"));
        assert!(!m.should_group("popcorn", "corn"));
        assert!(m.should_group("新鲜牛肉片", "牛肉"));
        assert!(!m.should_group("apple", "pear"));
    }

    #[test]
    fn test_empty_names_never_group() {
        let m = matcher();
        assert!(!m.should_group("", ""));
        assert!(!m.should_group("Whole", "milk"));
        assert!(!m.should_group("!!!", "milk"));
    }

    #[test]
    fn test_symmetry_over_sample_pairs() {
        let m = matcher();
        let names = [
            "Whole Milk", "milk", "chocolate milk", "chocolate", "牛奶", "有机牛奶", "eggs",
            "鸡蛋", "corn", "popcorn", "", "a", "green onion", "葱", "大葱", "牛肉", "ground beef",
        ];
        for a in names {
            for b in names {
                assert_eq!(m.should_group(a, b), m.should_group(b, a), "asymmetric: {a:?} / {b:?}");
            }
        }
    }

    #[test]
    fn test_not_transitive() {
        let m = matcher();
        assert!(m.should_group("milk", "chocolate milk"));
        assert!(m.should_group("chocolate milk", "chocolate"));
        assert!(!m.should_group("milk", "chocolate"));
    }

    #[test]
    fn test_rules_validation() {
        assert!(GroupingRules::default().validate().is_ok());

        let mut rules = GroupingRules::default();
        rules.min_containment_chars = 0;
        assert!(rules.validate().is_err());

        let mut rules = GroupingRules::default();
        rules.synonyms.push(vec!["lonely".to_string()]);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_load_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let rules = GroupingRules {
            synonyms: vec![vec!["soda".to_string(), "pop".to_string()]],
            modifiers: vec!["diet".to_string()],
            cjk_prefixes: vec![],
            min_containment_chars: 3,
        };
        fs::write(&path, serde_json::to_string(&rules).unwrap()).unwrap();

        let loaded = load_grouping_rules_from(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, rules);

        let m = IngredientMatcher::new(loaded);
        assert!(m.should_group("Diet Soda", "pop"));
        assert!(!m.should_group("tea", "te"));
    }

    #[test]
    fn test_load_rules_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_grouping_rules_from(path.to_str().unwrap()).is_err());
        assert!(load_grouping_rules_from("/definitely/not/here.json").is_err());
    }
}
