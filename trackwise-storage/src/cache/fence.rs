//! Invalidation epochs.
//!
//! Writers advance the epoch of a scope before evicting its keys. Loaders
//! read the epoch before hitting the store and compare after writing the
//! cache; a changed epoch means the loaded value may predate the write.
//!
//! Scopes hash onto a fixed set of stripes, so memory does not grow with the
//! number of entities ever written. Two scopes sharing a stripe only cause
//! extra fencing: a population is skipped, never a stale value kept.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_STRIPES: usize = 1024;

#[derive(Debug)]
pub struct EpochFence {
    stripes: Box<[AtomicU64]>,
}

impl Default for EpochFence {
    fn default() -> Self {
        Self::with_stripes(DEFAULT_STRIPES)
    }
}

impl EpochFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stripes(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripe(&self, scope: &str) -> &AtomicU64 {
        let mut hasher = DefaultHasher::new();
        scope.hash(&mut hasher);
        let index = (hasher.finish() % self.stripes.len() as u64) as usize;
        &self.stripes[index]
    }

    pub fn current(&self, scope: &str) -> u64 {
        self.stripe(scope).load(Ordering::SeqCst)
    }

    pub fn advance(&self, scope: &str) -> u64 {
        self.stripe(scope).fetch_add(1, Ordering::SeqCst) + 1
    }
}
