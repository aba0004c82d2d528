//! # Pool Diagnostics
//!
//! Named counters for every pool the application owns, gathered on demand.

use std::collections::BTreeMap;

/// Counters of one object pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectPoolStats {
    /// Objects held when everything is released.
    pub capacity: usize,
    /// Objects ready to hand out.
    pub available: usize,
    /// Objects currently handed out.
    pub in_use: usize,
    /// Most objects ever handed out at once.
    pub high_water: usize,
    /// Total acquisitions.
    pub total_acquires: u64,
    /// Acquisitions that built a fresh object.
    pub overflows: u64,
}

/// Counters of one frame-scoped stack pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StackPoolStats {
    /// Slots in the ring.
    pub slots: usize,
    /// Slots handed out since the last frame reset.
    pub used_this_frame: usize,
    /// Most slots ever used in one frame.
    pub high_water: usize,
    /// Times the cursor wrapped within a frame.
    pub wraps: u64,
}

/// Counters of any pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolStats {
    /// An object pool.
    Object(ObjectPoolStats),
    /// A frame-scoped stack pool.
    Stack(StackPoolStats),
}

impl PoolStats {
    /// Checks whether the pool ran past its budget at least once.
    #[must_use]
    pub const fn has_overflowed(&self) -> bool {
        match self {
            Self::Object(stats) => stats.overflows > 0,
            Self::Stack(stats) => stats.wraps > 0,
        }
    }
}

/// Implemented by every pool that can report counters.
pub trait PoolDiagnostics {
    /// Name the pool is reported under.
    fn pool_name(&self) -> &str;

    /// Current counters.
    fn pool_stats(&self) -> PoolStats;
}

/// Collects pool counters by name.
///
/// Owned by the application; nothing here is global.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    entries: BTreeMap<String, PoolStats>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the current counters of `pool`, replacing older ones.
    pub fn record(&mut self, pool: &dyn PoolDiagnostics) {
        self.entries
            .insert(pool.pool_name().to_string(), pool.pool_stats());
    }

    /// Counters recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PoolStats> {
        self.entries.get(name)
    }

    /// Every entry, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoolStats)> {
        self.entries.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    /// Number of recorded pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks for no recorded pools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of pools that have overflowed or wrapped.
    pub fn overflowed(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, stats)| stats.has_overflowed())
            .map(|(name, _)| name)
    }
}
