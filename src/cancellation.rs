//! Stale-lookup guard: a generation counter plus a CancellationToken.
//! An interactive caller begins a new generation on every keystroke; a lookup
//! whose generation has been overtaken discards its results on arrival instead
//! of aborting mid-scan.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Issues lookup generations. Each `begin` cancels the previous lookup.
pub struct LookupGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl Default for LookupGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel the in-flight lookup, advance the generation, return a guard for the new one.
    pub fn begin(&self) -> GenerationGuard {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: gen,
            token: child,
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel the in-flight lookup without starting a new one.
    pub fn cancel_all(&self) {
        self.current_token.read().cancel();
    }
}

/// Checked by a lookup before it hands results back.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// Returns true if no newer lookup has begun.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true if results may still be delivered.
    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }

    /// Generation that overtook this one (or this one, if merely cancelled).
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generation_supersedes_previous() {
        let gens = LookupGeneration::new();
        let first = gens.begin();
        assert!(first.should_continue());
        assert_eq!(first.my_generation(), 1);

        let second = gens.begin();
        assert!(!first.is_current());
        assert!(first.is_cancelled());
        assert!(!first.should_continue());
        assert!(second.should_continue());
        assert_eq!(first.latest_generation(), 2);
    }

    #[test]
    fn test_cancel_all_keeps_generation() {
        let gens = LookupGeneration::new();
        let guard = gens.begin();
        gens.cancel_all();
        assert!(guard.is_current());
        assert!(!guard.should_continue());
        assert_eq!(gens.current_generation(), 1);
    }
}
