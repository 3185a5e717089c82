//! Character-level edit distance and the similarity derived from it.
//!
//! The default variant is Levenshtein computed with two rolling rows sized to the
//! shorter input, since it runs once per (query, candidate) pair on a full corpus
//! scan. The transposition-aware variant (optimal string alignment) needs the full
//! matrix to look two rows back and is opt-in.
//!
//! Results can be memoized in a bounded LRU keyed by a blake3 digest of the
//! order-independent pair.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::MatchConfig;

/// Levenshtein distance over any comparable sequence, O(min(n, m)) memory.
pub fn levenshtein_slice<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];

    for (i, x) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in short.iter().enumerate() {
            let cost = usize::from(x != y);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}

/// Optimal string alignment distance: Levenshtein plus adjacent swaps at cost 1.
pub fn transposition_slice<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut d = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        d[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[i - 1][j] + 1)
                .min(d[i][j - 1] + 1)
                .min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[i - 2][j - 2] + 1);
            }
            d[i][j] = best;
        }
    }
    d[n][m]
}

/// `1 - distance / max(len)`, with both-empty treated as identical.
pub fn similarity_from_distance(distance: usize, len_a: usize, len_b: usize) -> f64 {
    let longest = len_a.max(len_b);
    if longest == 0 {
        return 1.0;
    }
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    (1.0 - distance as f64 / longest as f64).clamp(0.0, 1.0)
}

/// Case-sensitive character Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein_slice(&a, &b)
}

/// Case-sensitive character distance counting adjacent swaps as one edit.
pub fn transposition_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    transposition_slice(&a, &b)
}

/// Configured distance calculator shared by the composite scorer.
pub struct DistanceEngine {
    case_sensitive: bool,
    transpositions: bool,
    memo: Option<Mutex<LruCache<[u8; 32], usize>>>,
}

impl DistanceEngine {
    pub fn new(case_sensitive: bool, transpositions: bool, memo_capacity: usize) -> Self {
        Self {
            case_sensitive,
            transpositions,
            memo: NonZeroUsize::new(memo_capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(
            config.case_sensitive,
            config.use_transpositions,
            config.distance_memo_capacity,
        )
    }

    /// Edit distance under this engine's case and transposition settings.
    pub fn distance(&self, a: &str, b: &str) -> usize {
        let a = self.chars(a);
        let b = self.chars(b);
        self.distance_chars(&a, &b)
    }

    /// Similarity in [0, 1] under this engine's settings.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let a = self.chars(a);
        let b = self.chars(b);
        let distance = self.distance_chars(&a, &b);
        similarity_from_distance(distance, a.len(), b.len())
    }

    pub fn memo_len(&self) -> usize {
        self.memo.as_ref().map_or(0, |memo| memo.lock().len())
    }

    pub fn clear_memo(&self) {
        if let Some(memo) = &self.memo {
            memo.lock().clear();
        }
    }

    fn chars(&self, s: &str) -> Vec<char> {
        if self.case_sensitive {
            s.chars().collect()
        } else {
            s.chars().flat_map(char::to_lowercase).collect()
        }
    }

    fn distance_chars(&self, a: &[char], b: &[char]) -> usize {
        let Some(memo) = &self.memo else {
            return self.compute(a, b);
        };

        let key = self.memo_key(a, b);
        if let Some(&hit) = memo.lock().get(&key) {
            return hit;
        }
        // Computed outside the lock.
        let distance = self.compute(a, b);
        memo.lock().put(key, distance);
        distance
    }

    fn compute(&self, a: &[char], b: &[char]) -> usize {
        if self.transpositions {
            transposition_slice(a, b)
        } else {
            levenshtein_slice(a, b)
        }
    }

    /// Both distance variants are symmetric, so (a, b) and (b, a) share a slot.
    fn memo_key(&self, a: &[char], b: &[char]) -> [u8; 32] {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[u8::from(self.transpositions)]);
        hasher.update(first.iter().collect::<String>().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(second.iter().collect::<String>().as_bytes());
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DistanceEngine {
        DistanceEngine::new(false, false, 0)
    }

    #[test]
    fn test_classic_distances() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", ""), 0);
    }

    #[test]
    fn test_similarity_special_cases() {
        let e = engine();
        assert_eq!(e.similarity("", ""), 1.0);
        assert_eq!(e.similarity("abc", ""), 0.0);
        assert_eq!(e.similarity("", "abc"), 0.0);
        assert_eq!(e.similarity("same", "same"), 1.0);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let e = engine();
        for s in ["", "a", "Attack the enemy", "ünïcödé ✓", "  spaced  "] {
            assert_eq!(e.similarity(s, s), 1.0, "{s:?}");
        }
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let e = engine();
        let pairs = [
            ("kitten", "sitting"),
            ("Save game", "Load game"),
            ("a", "abcdef"),
            ("ça va", "ca va"),
        ];
        for (a, b) in pairs {
            assert_eq!(e.similarity(a, b), e.similarity(b, a));
            assert_eq!(e.distance(a, b), e.distance(b, a));
        }
    }

    #[test]
    fn test_similarity_monotone_in_distance() {
        let e = engine();
        let base = "abcdefghij";
        let variants = ["abcdefghij", "Xbcdefghij", "XXcdefghij", "XXXdefghij", "XXXXefghij"];
        let scores: Vec<f64> = variants.iter().map(|v| e.similarity(base, v)).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1], "{scores:?}");
        }
        assert!((scores[2] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        assert_eq!(engine().distance("HELLO", "hello"), 0);
        let strict = DistanceEngine::new(true, false, 0);
        assert_eq!(strict.distance("HELLO", "hello"), 5);
    }

    #[test]
    fn test_transposition_variant() {
        assert_eq!(levenshtein("abcd", "abdc"), 2);
        assert_eq!(transposition_distance("abcd", "abdc"), 1);
        assert_eq!(transposition_distance("ca", "abc"), 3);

        let swaps = DistanceEngine::new(false, true, 0);
        assert_eq!(swaps.distance("teh", "the"), 1);
        assert_eq!(engine().distance("teh", "the"), 2);
    }

    #[test]
    fn test_rolling_rows_match_full_matrix_without_swaps() {
        let words = ["", "a", "ab", "sunday", "saturday", "rosettacode", "raisethysword"];
        for a in words {
            for b in words {
                let ac: Vec<char> = a.chars().collect();
                let bc: Vec<char> = b.chars().collect();
                assert!(transposition_slice(&ac, &bc) <= levenshtein_slice(&ac, &bc));
            }
        }
        assert_eq!(levenshtein("rosettacode", "raisethysword"), 8);
    }

    #[test]
    fn test_memo_shares_symmetric_pairs() {
        let e = DistanceEngine::new(false, false, 8);
        assert_eq!(e.distance("kitten", "sitting"), 3);
        assert_eq!(e.distance("sitting", "kitten"), 3);
        assert_eq!(e.memo_len(), 1);
        e.clear_memo();
        assert_eq!(e.memo_len(), 0);
    }

    #[test]
    fn test_memo_is_bounded() {
        let e = DistanceEngine::new(false, false, 2);
        e.distance("a", "b");
        e.distance("c", "d");
        e.distance("e", "f");
        assert_eq!(e.memo_len(), 2);
    }
}
