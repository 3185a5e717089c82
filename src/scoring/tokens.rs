//! Token overlap: edit distance over word tokens or character n-grams.

use crate::config::{MatchConfig, TokenMode};

use super::distance::{levenshtein_slice, similarity_from_distance};

/// Split into words, trimming punctuation from the edges of each word.
pub fn word_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Overlapping character n-grams. A non-empty string shorter than `n` is one gram.
pub fn char_ngrams(text: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let n = n.max(1);
    if chars.len() < n {
        return vec![chars.into_iter().collect()];
    }
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

pub struct TokenScorer {
    mode: TokenMode,
    ngram_size: usize,
    case_sensitive: bool,
}

impl TokenScorer {
    pub fn new(mode: TokenMode, ngram_size: usize, case_sensitive: bool) -> Self {
        Self {
            mode,
            ngram_size,
            case_sensitive,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.token_mode, config.ngram_size, config.case_sensitive)
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let (a, b) = if self.case_sensitive {
            (a.to_owned(), b.to_owned())
        } else {
            (a.to_lowercase(), b.to_lowercase())
        };

        match self.mode {
            TokenMode::Words => sequence_similarity(&word_tokens(&a), &word_tokens(&b)),
            TokenMode::NGrams => sequence_similarity(
                &char_ngrams(&a, self.ngram_size),
                &char_ngrams(&b, self.ngram_size),
            ),
        }
    }
}

fn sequence_similarity<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    similarity_from_distance(levenshtein_slice(a, b), a.len(), b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_tokens_strip_edge_punctuation() {
        assert_eq!(word_tokens("  Hello, world!  "), vec!["Hello", "world"]);
        assert_eq!(word_tokens("l'ennemi -- fin"), vec!["l'ennemi", "fin"]);
        assert!(word_tokens(" ... ").is_empty());
    }

    #[test]
    fn test_char_ngrams() {
        assert_eq!(char_ngrams("abcd", 2), vec!["ab", "bc", "cd"]);
        assert_eq!(char_ngrams("a", 2), vec!["a"]);
        assert!(char_ngrams("", 2).is_empty());
        assert_eq!(char_ngrams("héé", 3), vec!["héé"]);
    }

    #[test]
    fn test_word_similarity() {
        let scorer = TokenScorer::new(TokenMode::Words, 2, false);
        assert_eq!(scorer.similarity("Open the door", "open the door"), 1.0);
        let sim = scorer.similarity("open the red door", "open the blue door");
        assert!((sim - 0.75).abs() < 1e-9);
        assert_eq!(scorer.similarity("", ""), 1.0);
        assert_eq!(scorer.similarity("door", ""), 0.0);
    }

    #[test]
    fn test_bigram_similarity() {
        let scorer = TokenScorer::new(TokenMode::NGrams, 2, false);
        let sim = scorer.similarity("attack the enemy", "attack the enemies");
        assert!((sim - 14.0 / 17.0).abs() < 1e-9, "{sim}");
        assert_eq!(scorer.similarity("abc", "ABC"), 1.0);
    }

    #[test]
    fn test_token_similarity_is_symmetric() {
        for mode in [TokenMode::Words, TokenMode::NGrams] {
            let scorer = TokenScorer::new(mode, 2, false);
            let (a, b) = ("Save your progress", "Saving progress now");
            assert_eq!(scorer.similarity(a, b), scorer.similarity(b, a));
        }
    }
}
