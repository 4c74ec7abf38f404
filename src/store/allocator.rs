//! Monotonic identifier allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues unique, strictly increasing identifiers starting at 1.
///
/// Safe to call from any number of threads. Values are never reissued:
/// running out of the `u64` space is treated as a broken precondition and
/// panics instead of wrapping.
#[derive(Debug, Default)]
pub struct IdAllocator {
    /// Last value handed out (0 before the first call).
    last: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        assert!(first >= 1, "identifiers start at 1");
        Self {
            last: AtomicU64::new(first - 1),
        }
    }

    /// Issue the next identifier.
    pub fn next(&self) -> u64 {
        match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| last.checked_add(1))
        {
            Ok(prev) => prev + 1,
            Err(_) => panic!("identifier space exhausted"),
        }
    }

    /// Most recently issued identifier, or 0 if none has been issued.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.last_issued(), 0);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
        assert_eq!(ids.last_issued(), 2);
    }

    #[test]
    fn test_concurrent_ids_are_unique_and_increasing_per_thread() {
        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let issued = handle.join().unwrap();
            assert!(issued.windows(2).all(|w| w[0] < w[1]));
            for id in issued {
                assert!(seen.insert(id), "id {} issued twice", id);
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(ids.last_issued(), 8000);
    }

    #[test]
    #[should_panic(expected = "identifier space exhausted")]
    fn test_exhaustion_panics() {
        let ids = IdAllocator::starting_at(u64::MAX);
        assert_eq!(ids.next(), u64::MAX);
        ids.next();
    }
}
