//! Text normalization applied to queries and candidate sources before comparison.
//! Normalization is idempotent: `normalize(normalize(s)) == normalize(s)`.
//! Number masking is separate: it only feeds fuzzy scoring, never the exact check.

use std::borrow::Cow;

use regex::Regex;

use crate::config::MatchConfig;

/// Host-provided normalization contract.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Trims, collapses whitespace runs and optionally case-folds.
pub struct DefaultNormalizer {
    whitespace: Regex,
    case_fold: bool,
}

impl DefaultNormalizer {
    pub fn new(case_fold: bool) -> Self {
        Self {
            whitespace: Regex::new(r"\s+").unwrap(),
            case_fold,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(!config.case_sensitive)
    }
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TextNormalizer for DefaultNormalizer {
    fn normalize(&self, text: &str) -> String {
        let collapsed = self.whitespace.replace_all(text.trim(), " ");
        if self.case_fold {
            collapsed.to_lowercase()
        } else {
            collapsed.into_owned()
        }
    }
}

/// Stand-in for any number when number masking is on.
pub const NUMBER_MASK: &str = "#";

/// Replaces numbers with [`NUMBER_MASK`] so "Deal 10 damage" and
/// "Deal 12.5 damage" score as the same sentence.
pub struct NumberMask {
    numbers: Regex,
}

impl NumberMask {
    pub fn new() -> Self {
        Self {
            // Integers and decimals with either separator.
            numbers: Regex::new(r"\d+(?:[.,]\d+)*").unwrap(),
        }
    }

    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.numbers.replace_all(text, NUMBER_MASK)
    }

    /// Same numbers in the same order.
    pub fn same_numbers(&self, a: &str, b: &str) -> bool {
        self.numbers
            .find_iter(a)
            .map(|m| m.as_str())
            .eq(self.numbers.find_iter(b).map(|m| m.as_str()))
    }
}

impl Default for NumberMask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_collapses_whitespace() {
        let n = DefaultNormalizer::default();
        assert_eq!(n.normalize("  Attack\t the \n enemy  "), "attack the enemy");
        assert_eq!(n.normalize("   "), "");
    }

    #[test]
    fn test_case_fold_can_be_disabled() {
        let n = DefaultNormalizer::new(false);
        assert_eq!(n.normalize(" Open  Door "), "Open Door");
    }

    #[test]
    fn test_normalize_keeps_numbers() {
        let n = DefaultNormalizer::default();
        assert_ne!(n.normalize("Deal 10 damage"), n.normalize("Deal 12 damage"));
    }

    #[test]
    fn test_number_masking() {
        let mask = NumberMask::new();
        assert_eq!(mask.apply("deal 10 damage"), mask.apply("deal 12.5 damage"));
        assert_eq!(mask.apply("level 3 of 10"), "level # of #");
        assert!(mask.same_numbers("level 3 of 10", "stage 3 of 10"));
        assert!(!mask.same_numbers("level 3 of 10", "level 10 of 3"));
        assert!(!mask.same_numbers("level 3", "level 3 of 3"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "",
            "  Mixed   CASE\ttext ",
            "ÉCOLE  Über",
            "Deal 1,000 damage to 3 targets",
            "İstanbul",
            "\u{2003}em\u{2003}space\u{2003}",
        ];
        for n in [DefaultNormalizer::new(true), DefaultNormalizer::new(false)] {
            for s in samples {
                let once = n.normalize(s);
                assert_eq!(n.normalize(&once), once, "{s:?}");
            }
        }
    }
}
