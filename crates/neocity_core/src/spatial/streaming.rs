//! # Chunk Streaming
//!
//! Tracks a detail tier per world chunk from the observer's position:
//!
//! ```text
//!   Unloaded ──► Low ──► Medium ──► High
//!       ◄──────     ◄───────    ◄──────
//! ```
//!
//! A chunk seen for the first time gets its tier straight from distance.
//! After that it moves at most one tier per update, and only once it is
//! `band` past the boundary, leaving a `2 * band` dead zone around every
//! threshold.

use std::collections::HashMap;

use crate::config::StreamingConfig;

/// Detail tier of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkTier {
    /// Not tracked.
    #[default]
    Unloaded,
    /// Minimal or impostor detail.
    Low,
    /// Reduced detail.
    Medium,
    /// Full simulation detail.
    High,
}

impl ChunkTier {
    const fn higher(self) -> Option<Self> {
        match self {
            Self::Unloaded => Some(Self::Low),
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => None,
        }
    }

    const fn lower(self) -> Self {
        match self {
            Self::Unloaded | Self::Low => Self::Unloaded,
            Self::Medium => Self::Low,
            Self::High => Self::Medium,
        }
    }
}

/// Integer grid coordinate of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkKey {
    /// X coordinate, in chunks.
    pub x: i32,
    /// Z coordinate, in chunks.
    pub z: i32,
}

impl ChunkKey {
    /// Creates a chunk key.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// A transition reported by [`StreamingGrid::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk started being tracked.
    Load {
        /// Chunk.
        key: ChunkKey,
        /// Initial tier.
        tier: ChunkTier,
    },
    /// A tracked chunk moved one tier.
    PriorityChange {
        /// Chunk.
        key: ChunkKey,
        /// Tier before.
        from: ChunkTier,
        /// Tier after.
        to: ChunkTier,
    },
    /// A chunk stopped being tracked.
    Unload {
        /// Chunk.
        key: ChunkKey,
    },
}

/// Receives streaming transitions. What a tier means is up to the listener.
pub trait StreamListener {
    /// A chunk was loaded at `tier`.
    fn on_load(&mut self, _key: ChunkKey, _tier: ChunkTier) {}

    /// A chunk moved from `from` to `to`.
    fn on_priority_change(&mut self, _key: ChunkKey, _from: ChunkTier, _to: ChunkTier) {}

    /// A chunk was unloaded.
    fn on_unload(&mut self, _key: ChunkKey) {}
}

impl StreamListener for () {}

impl StreamListener for Vec<StreamEvent> {
    fn on_load(&mut self, key: ChunkKey, tier: ChunkTier) {
        self.push(StreamEvent::Load { key, tier });
    }

    fn on_priority_change(&mut self, key: ChunkKey, from: ChunkTier, to: ChunkTier) {
        self.push(StreamEvent::PriorityChange { key, from, to });
    }

    fn on_unload(&mut self, key: ChunkKey) {
        self.push(StreamEvent::Unload { key });
    }
}

#[derive(Clone, Copy, Debug)]
struct ChunkState {
    tier: ChunkTier,
    /// Update in which the chunk was last inside the evaluated range.
    seen: u64,
}

/// Per-chunk tier tracker with hysteresis.
pub struct StreamingGrid {
    config: StreamingConfig,
    chunks: HashMap<ChunkKey, ChunkState>,
    generation: u64,
    /// Reused list of chunks leaving range.
    leaving: Vec<ChunkKey>,
}

impl StreamingGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            chunks: HashMap::new(),
            generation: 0,
            leaving: Vec::new(),
        }
    }

    /// The thresholds in use.
    #[must_use]
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Outer edge of the boundary of `tier`.
    fn threshold(&self, tier: ChunkTier) -> f32 {
        match tier {
            ChunkTier::High => self.config.high_distance,
            ChunkTier::Medium => self.config.medium_distance,
            ChunkTier::Low | ChunkTier::Unloaded => self.config.low_distance,
        }
    }

    /// Tier by distance alone.
    #[must_use]
    pub fn tier_for_distance(&self, distance: f32) -> ChunkTier {
        if distance <= self.config.high_distance {
            ChunkTier::High
        } else if distance <= self.config.medium_distance {
            ChunkTier::Medium
        } else if distance <= self.config.low_distance {
            ChunkTier::Low
        } else {
            ChunkTier::Unloaded
        }
    }

    /// Next tier of a tracked chunk at `distance`, moving at most one step.
    fn next_tier(&self, current: ChunkTier, distance: f32) -> ChunkTier {
        let band = self.config.band;
        if let Some(up) = current.higher() {
            if distance < self.threshold(up) - band {
                return up;
            }
        }
        if distance > self.threshold(current) + band {
            return current.lower();
        }
        current
    }

    /// World-space center of a chunk.
    #[must_use]
    pub fn chunk_center(&self, key: ChunkKey) -> (f32, f32) {
        let size = self.config.chunk_size;
        #[allow(clippy::cast_precision_loss)]
        let center = ((key.x as f32 + 0.5) * size, (key.z as f32 + 0.5) * size);
        center
    }

    #[allow(clippy::cast_possible_truncation)]
    fn chunk_coord(&self, v: f32) -> i32 {
        (v / self.config.chunk_size).floor() as i32
    }

    /// Re-evaluates every chunk around the observer and reports transitions
    /// to `listener`.
    ///
    /// Chunks within `low_distance + band` are evaluated. Tracked chunks
    /// outside that square are unloaded.
    pub fn update<L: StreamListener + ?Sized>(
        &mut self,
        observer_x: f32,
        observer_z: f32,
        listener: &mut L,
    ) {
        self.generation += 1;
        let generation = self.generation;
        let reach = self.config.low_distance + self.config.band;
        let (min_x, max_x) = (
            self.chunk_coord(observer_x - reach),
            self.chunk_coord(observer_x + reach),
        );
        let (min_z, max_z) = (
            self.chunk_coord(observer_z - reach),
            self.chunk_coord(observer_z + reach),
        );

        let mut changes = 0_u32;
        for x in min_x..=max_x {
            for z in min_z..=max_z {
                let key = ChunkKey::new(x, z);
                let (center_x, center_z) = self.chunk_center(key);
                let distance = (center_x - observer_x).hypot(center_z - observer_z);

                match self.chunks.get(&key).map(|state| state.tier) {
                    None => {
                        let tier = self.tier_for_distance(distance);
                        if tier != ChunkTier::Unloaded {
                            self.chunks.insert(key, ChunkState { tier, seen: generation });
                            listener.on_load(key, tier);
                            changes += 1;
                        }
                    }
                    Some(current) => {
                        let next = self.next_tier(current, distance);
                        if next == ChunkTier::Unloaded {
                            self.chunks.remove(&key);
                            listener.on_unload(key);
                            changes += 1;
                            continue;
                        }
                        if next != current {
                            listener.on_priority_change(key, current, next);
                            changes += 1;
                        }
                        self.chunks.insert(key, ChunkState { tier: next, seen: generation });
                    }
                }
            }
        }

        self.leaving.clear();
        self.leaving.extend(
            self.chunks
                .iter()
                .filter(|(_, state)| state.seen != generation)
                .map(|(key, _)| *key),
        );
        self.leaving.sort_unstable();
        for key in &self.leaving {
            self.chunks.remove(key);
            listener.on_unload(*key);
            changes += 1;
        }

        if changes > 0 {
            tracing::debug!(
                observer_x,
                observer_z,
                changes,
                tracked = self.chunks.len(),
                "chunk tiers updated"
            );
        }
    }

    /// Current tier of a chunk.
    #[must_use]
    pub fn tier(&self, key: ChunkKey) -> ChunkTier {
        self.chunks
            .get(&key)
            .map_or(ChunkTier::Unloaded, |state| state.tier)
    }

    /// Number of tracked chunks.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of tracked chunks at `tier`.
    #[must_use]
    pub fn count_at(&self, tier: ChunkTier) -> usize {
        self.chunks.values().filter(|state| state.tier == tier).count()
    }

    /// Tracked chunks and their tiers, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkKey, ChunkTier)> + '_ {
        self.chunks.iter().map(|(key, state)| (*key, state.tier))
    }

    /// Unloads every chunk, reporting each to `listener`.
    pub fn clear<L: StreamListener + ?Sized>(&mut self, listener: &mut L) {
        self.leaving.clear();
        self.leaving.extend(self.chunks.keys().copied());
        self.leaving.sort_unstable();
        for key in &self.leaving {
            listener.on_unload(*key);
        }
        self.chunks.clear();
    }
}
