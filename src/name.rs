//! Identifiers for named (recursive or shared) sub-schemas

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fresh names start above this value so hand-written identifiers stay disjoint from minted ones.
const FIRST_FRESH: u64 = 1 << 32;

static NEXT_FRESH: AtomicU64 = AtomicU64::new(FIRST_FRESH);

/// Opaque identifier naming a shared sub-schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(u64);

impl Name {
    /// Sentinel for "incompatible" or "unset"; never returned by [`Name::fresh`].
    pub const INCOMPATIBLE: Name = Name(u64::MAX);

    /// Wrap a raw identifier
    pub const fn new(id: u64) -> Self {
        Name(id)
    }

    /// Mint a process-unique identifier
    pub fn fresh() -> Self {
        Name(NEXT_FRESH.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(self) -> u64 {
        self.0
    }

    pub fn is_incompatible(self) -> bool {
        self == Self::INCOMPATIBLE
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_incompatible() {
            write!(f, "#incompatible")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fresh_names_are_unique() {
        let names: HashSet<Name> = (0..1000).map(|_| Name::fresh()).collect();
        assert_eq!(names.len(), 1000);
        assert!(!names.contains(&Name::INCOMPATIBLE));
    }

    #[test]
    fn test_fresh_names_skip_hand_written_range() {
        assert!(Name::fresh().id() >= FIRST_FRESH);
        assert_eq!(Name::new(7).to_string(), "#7");
    }

    #[test]
    fn test_fresh_names_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| Name::fresh()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(all.insert(name));
            }
        }
    }
}
