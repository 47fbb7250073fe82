//! Substitution key allocation.
//!
//! Keys are drawn in ranges: one value from a shared cryptographic source
//! seeds `range_width` consecutive keys, so the shared source is touched
//! rarely and allocators on different threads never contend. Each builder
//! owns its allocator and passes it explicitly to
//! [`add_child_element`](crate::model::Node::add_child_element).

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::marker::ElementKey;

/// Number of keys handed out per draw from the random source.
pub const RANGE_WIDTH: u64 = 16384;

/// Consecutive collisions tolerated before allocation gives up.
pub const MAX_ATTEMPTS: u32 = 16;

/// A thread-safe source of unpredictable 64-bit values.
pub trait RandomSource: Send + Sync {
    fn next_u64(&self) -> u64;
}

/// Random values from the operating system CSPRNG.
///
/// A v4 UUID carries 122 random bits; the version nibble sits in the high
/// word and the variant bits in the low word, so folding the two words
/// together yields 64 uniformly random bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn next_u64(&self) -> u64 {
        let (high, low) = Uuid::new_v4().as_u64_pair();
        high ^ low
    }
}

/// Configuration for key allocation.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    /// Keys per random draw (at least 1, default 16384).
    pub range_width: u64,
    /// Consecutive collisions before [`Error::AllocatorExhausted`] (default 16).
    pub max_attempts: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            range_width: RANGE_WIDTH,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl AllocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range_width(mut self, range_width: u64) -> Self {
        self.range_width = range_width.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Generator of opaque substitution keys.
///
/// Give each builder (thread, task) its own allocator. Keys are only unique
/// within the registry they are checked against; two nodes may well hold the
/// same key.
pub struct IdAllocator {
    next: u64,
    end: u64,
    config: AllocatorConfig,
    source: Arc<dyn RandomSource>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("remaining", &self.remaining())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdAllocator {
    /// Create an allocator drawing from the OS random source.
    pub fn new() -> Self {
        Self::with_source(Arc::new(OsRandom))
    }

    pub fn with_source(source: Arc<dyn RandomSource>) -> Self {
        Self {
            next: 0,
            end: 0,
            config: AllocatorConfig::default(),
            source,
        }
    }

    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Keys left in the current range before the next random draw.
    pub fn remaining(&self) -> u64 {
        self.end - self.next
    }

    /// Forget the current range; the next key comes from a fresh draw.
    pub fn discard_range(&mut self) {
        self.next = 0;
        self.end = 0;
    }

    /// Produce the next key without checking for collisions.
    pub fn next_key(&mut self) -> ElementKey {
        if self.next < self.end {
            let key = self.next;
            self.next += 1;
            return ElementKey(key);
        }
        let width = self.config.range_width.max(1);
        let mut drawn = self.source.next_u64();
        if drawn > u64::MAX - width {
            drawn -= width;
        }
        log::trace!("reseeded key range at {drawn:016x}");
        self.next = drawn + 1;
        self.end = drawn + width;
        ElementKey(drawn)
    }

    /// Produce a key for which `is_taken` is false.
    ///
    /// Each collision discards the current range and redraws. After
    /// `max_attempts` collisions in a row the allocator gives up.
    pub fn allocate(&mut self, is_taken: impl Fn(ElementKey) -> bool) -> Result<ElementKey> {
        let attempts = self.config.max_attempts.max(1);
        for _ in 0..attempts {
            let key = self.next_key();
            if !is_taken(key) {
                return Ok(key);
            }
            log::debug!("element key collision on {key}, discarding range");
            self.discard_range();
        }
        Err(Error::AllocatorExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    /// Returns `start`, `start + step`, `start + 2 * step`, ...
    struct Stepping {
        value: AtomicU64,
        step: u64,
    }

    impl Stepping {
        fn new(start: u64, step: u64) -> Arc<Self> {
            Arc::new(Self {
                value: AtomicU64::new(start),
                step,
            })
        }
    }

    impl RandomSource for Stepping {
        fn next_u64(&self) -> u64 {
            self.value.fetch_add(self.step, Ordering::SeqCst)
        }
    }

    #[test]
    fn test_keys_are_consecutive_within_range() {
        let mut alloc = IdAllocator::with_source(Stepping::new(1000, 1 << 32));
        assert_eq!(alloc.next_key(), ElementKey(1000));
        assert_eq!(alloc.next_key(), ElementKey(1001));
        assert_eq!(alloc.next_key(), ElementKey(1002));
        assert_eq!(alloc.remaining(), RANGE_WIDTH - 3);
    }

    #[test]
    fn test_reseeds_after_range_exhausted() {
        let mut alloc = IdAllocator::with_source(Stepping::new(0, 1_000_000))
            .with_config(AllocatorConfig::new().with_range_width(2));
        assert_eq!(alloc.next_key(), ElementKey(0));
        assert_eq!(alloc.next_key(), ElementKey(1));
        assert_eq!(alloc.next_key(), ElementKey(1_000_000));
    }

    #[test]
    fn test_draw_near_max_shifts_down() {
        let mut alloc = IdAllocator::with_source(Stepping::new(u64::MAX - 5, 0));
        let first = alloc.next_key();
        assert_eq!(first, ElementKey(u64::MAX - 5 - RANGE_WIDTH));
        // The whole range fits below u64::MAX
        for _ in 1..RANGE_WIDTH {
            alloc.next_key();
        }
        assert_eq!(alloc.remaining(), 0);
    }

    #[test]
    fn test_collision_discards_range() {
        let mut alloc = IdAllocator::with_source(Stepping::new(10, 100));
        let key = alloc.allocate(|k| k == ElementKey(10)).unwrap();
        assert_eq!(key, ElementKey(110));
        assert_eq!(alloc.remaining(), RANGE_WIDTH - 1);
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = IdAllocator::with_source(Stepping::new(42, 0))
            .with_config(AllocatorConfig::new().with_max_attempts(4));
        let err = alloc.allocate(|k| k == ElementKey(42)).unwrap_err();
        assert!(matches!(err, Error::AllocatorExhausted { attempts: 4 }));
    }

    #[test]
    fn test_os_random_keys_distinct() {
        let mut alloc = IdAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let key = alloc.allocate(|k| seen.contains(&k)).unwrap();
            assert!(seen.insert(key));
        }
    }
}
