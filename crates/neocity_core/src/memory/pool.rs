//! # Object Pool
//!
//! Pre-warmed pool for objects that are frequently acquired and released.

use super::registry::{ObjectPoolStats, PoolDiagnostics, PoolStats};
use crate::config::PoolConfig;

/// A pool of pre-built objects.
///
/// `acquire` hands out an owned object from the stack of warm instances.
/// When the stack is empty the pool builds a fresh one and counts an
/// overflow: correctness is kept, the zero-allocation contract is not, and
/// the count tells you to raise the pool size.
///
/// # Thread Safety
///
/// Not synchronized. Keep each pool on the thread that owns it.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ObjectPool::new("particles", 1000, Particle::default, |p| p.life = 0.0);
///
/// let particle = pool.acquire();
/// // ... use it ...
/// pool.release(particle);
/// ```
pub struct ObjectPool<T> {
    name: String,
    free: Vec<T>,
    capacity: usize,
    factory: Box<dyn FnMut() -> T>,
    resetter: Box<dyn FnMut(&mut T)>,
    in_use: usize,
    high_water: usize,
    total_acquires: u64,
    overflows: u64,
    warnings_emitted: u32,
    warning_limit: u32,
}

impl<T> ObjectPool<T> {
    /// Default number of overflow warnings logged per pool.
    pub const DEFAULT_WARNING_LIMIT: u32 = 5;

    /// Creates a pool and pre-builds `capacity` objects with `factory`.
    ///
    /// `resetter` scrubs an object when it is released.
    #[must_use]
    pub fn new<F, R>(name: impl Into<String>, capacity: usize, mut factory: F, resetter: R) -> Self
    where
        F: FnMut() -> T + 'static,
        R: FnMut(&mut T) + 'static,
    {
        let mut free = Vec::with_capacity(capacity);
        free.extend((0..capacity).map(|_| factory()));

        Self {
            name: name.into(),
            free,
            capacity,
            factory: Box::new(factory),
            resetter: Box::new(resetter),
            in_use: 0,
            high_water: 0,
            total_acquires: 0,
            overflows: 0,
            warnings_emitted: 0,
            warning_limit: Self::DEFAULT_WARNING_LIMIT,
        }
    }

    /// Sets how many overflow warnings are logged before going quiet.
    #[must_use]
    pub fn with_warning_limit(mut self, limit: u32) -> Self {
        self.warning_limit = limit;
        self
    }

    /// Applies the configured overflow warning limit.
    #[must_use]
    pub fn with_config(self, config: &PoolConfig) -> Self {
        self.with_warning_limit(config.overflow_warning_limit)
    }

    /// Overflow warnings logged so far, at most the warning limit.
    #[inline]
    #[must_use]
    pub const fn warnings_emitted(&self) -> u32 {
        self.warnings_emitted
    }

    /// Pool name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of objects the pool holds when everything is released.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Objects ready to hand out.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Objects currently handed out.
    #[inline]
    #[must_use]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    /// Acquisitions that had to build a fresh object.
    #[inline]
    #[must_use]
    pub const fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Takes an object. O(1) while the pool has warm objects.
    pub fn acquire(&mut self) -> T {
        self.total_acquires += 1;
        self.in_use += 1;
        self.high_water = self.high_water.max(self.in_use);

        if let Some(object) = self.free.pop() {
            return object;
        }

        self.overflows += 1;
        if self.warnings_emitted < self.warning_limit {
            self.warnings_emitted += 1;
            tracing::warn!(
                pool = self.name.as_str(),
                capacity = self.capacity,
                overflows = self.overflows,
                "object pool exhausted, allocating fresh instance"
            );
        }
        (self.factory)()
    }

    /// Scrubs an object and returns it to the pool.
    ///
    /// If the pool is already full the object is dropped.
    pub fn release(&mut self, mut object: T) {
        self.in_use = self.in_use.saturating_sub(1);
        if self.free.len() >= self.capacity {
            return;
        }
        (self.resetter)(&mut object);
        self.free.push(object);
    }

    /// Snapshot of the tuning counters.
    #[must_use]
    pub fn stats(&self) -> ObjectPoolStats {
        ObjectPoolStats {
            capacity: self.capacity,
            available: self.free.len(),
            in_use: self.in_use,
            high_water: self.high_water,
            total_acquires: self.total_acquires,
            overflows: self.overflows,
        }
    }
}

impl<T> PoolDiagnostics for ObjectPool<T> {
    fn pool_name(&self) -> &str {
        &self.name
    }

    fn pool_stats(&self) -> PoolStats {
        PoolStats::Object(self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_pool(capacity: usize) -> ObjectPool<Vec<u32>> {
        ObjectPool::new("buffers", capacity, || Vec::with_capacity(4), Vec::clear)
    }

    #[test]
    fn test_prewarmed() {
        let pool = vec_pool(4);
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_acquire_release_resets() {
        let mut pool = vec_pool(2);

        let mut buffer = pool.acquire();
        buffer.push(7);
        assert_eq!(pool.in_use(), 1);
        pool.release(buffer);

        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert_eq!(pool.stats().total_acquires, 2);
    }

    #[test]
    fn test_overflow_counts_exactly_one() {
        let mut pool = vec_pool(3);
        let held: Vec<_> = (0..3).map(|_| pool.acquire()).collect();
        assert_eq!(pool.overflows(), 0);

        let extra = pool.acquire();
        assert_eq!(pool.overflows(), 1);
        assert_eq!(pool.stats().high_water, 4);

        for buffer in held {
            pool.release(buffer);
        }
        // Pool is full again; the extra object is dropped
        pool.release(extra);
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_overflow_warnings_follow_config() {
        let config = PoolConfig {
            overflow_warning_limit: 2,
            ..PoolConfig::default()
        };
        let mut pool = vec_pool(0).with_config(&config);
        let held: Vec<_> = (0..5).map(|_| pool.acquire()).collect();

        assert_eq!(held.len(), 5);
        assert_eq!(pool.overflows(), 5);
        assert_eq!(pool.warnings_emitted(), 2);
    }

    #[test]
    fn test_double_release_does_not_grow() {
        let mut pool = vec_pool(1);
        let a = pool.acquire();
        pool.release(a);
        pool.release(Vec::new());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut pool = vec_pool(2);
        let a = pool.acquire();
        let stats = pool.stats();
        assert_eq!(
            stats,
            ObjectPoolStats {
                capacity: 2,
                available: 1,
                in_use: 1,
                high_water: 1,
                total_acquires: 1,
                overflows: 0,
            }
        );
        pool.release(a);
    }
}
