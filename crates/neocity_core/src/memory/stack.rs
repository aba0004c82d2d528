//! # Frame Stack Pools
//!
//! Ring buffers of fixed-width `f32` slots for per-frame math temporaries.
//! Slots are handed out by bumping a cursor and reclaimed all at once when
//! the frame ends.

use super::registry::{PoolDiagnostics, PoolStats, StackPoolStats};
use crate::config::PoolConfig;

/// Handle to one temporary slot.
///
/// A handle is only valid in the frame it was acquired in. After
/// [`TempStackPool::reset_frame`] lookups through it return `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempSlot {
    index: u32,
    frame: u64,
}

impl TempSlot {
    /// Slot position in the ring.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// A frame-scoped ring of `slots` temporaries, each `width` floats wide.
///
/// The backing buffer is allocated once. Acquiring past the end of the ring
/// wraps the cursor and reuses the oldest slot of the frame, logging a
/// warning: slots acquired earlier in the same frame may then be
/// overwritten.
///
/// # Thread Safety
///
/// Not synchronized. Use one set of pools per thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut temps = TempStackPool::vec3("scratch", 1024);
///
/// let slot = temps.acquire();
/// temps.slot_mut(slot).unwrap().copy_from_slice(&[1.0, 2.0, 3.0]);
///
/// temps.reset_frame();
/// ```
pub struct TempStackPool {
    name: String,
    buffer: Box<[f32]>,
    width: usize,
    slots: usize,
    cursor: usize,
    frame: u64,
    used_this_frame: usize,
    high_water: usize,
    wraps: u64,
    warnings_emitted: u32,
    warning_limit: u32,
}

impl TempStackPool {
    /// Floats per vector slot.
    pub const VEC3_WIDTH: usize = 3;
    /// Floats per quaternion slot.
    pub const QUAT_WIDTH: usize = 4;
    /// Floats per 4x4 matrix slot.
    pub const MAT4_WIDTH: usize = 16;
    /// Default number of wrap warnings logged per pool.
    pub const DEFAULT_WARNING_LIMIT: u32 = 5;

    /// Creates a ring of `slots` slots, each `width` floats wide.
    ///
    /// # Panics
    ///
    /// Panics if `slots` or `width` is zero, or `slots` exceeds `u32::MAX`.
    #[must_use]
    pub fn new(name: impl Into<String>, width: usize, slots: usize) -> Self {
        assert!(width > 0, "Slot width must be greater than zero");
        assert!(slots > 0, "Pool must have at least one slot");
        assert!(u32::try_from(slots).is_ok(), "Slot count must fit in u32");

        Self {
            name: name.into(),
            buffer: vec![0.0; width * slots].into_boxed_slice(),
            width,
            slots,
            cursor: 0,
            frame: 0,
            used_this_frame: 0,
            high_water: 0,
            wraps: 0,
            warnings_emitted: 0,
            warning_limit: Self::DEFAULT_WARNING_LIMIT,
        }
    }

    /// Sets how many wrap warnings are logged before going quiet.
    #[must_use]
    pub fn with_warning_limit(mut self, limit: u32) -> Self {
        self.warning_limit = limit;
        self
    }

    /// Ring of 3-float vectors.
    #[must_use]
    pub fn vec3(name: impl Into<String>, slots: usize) -> Self {
        Self::new(name, Self::VEC3_WIDTH, slots)
    }

    /// Ring of 4-float quaternions.
    #[must_use]
    pub fn quat(name: impl Into<String>, slots: usize) -> Self {
        Self::new(name, Self::QUAT_WIDTH, slots)
    }

    /// Ring of 16-float matrices.
    #[must_use]
    pub fn mat4(name: impl Into<String>, slots: usize) -> Self {
        Self::new(name, Self::MAT4_WIDTH, slots)
    }

    /// Floats per slot.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Slots in the ring.
    #[inline]
    #[must_use]
    pub const fn slots(&self) -> usize {
        self.slots
    }

    /// Slots handed out since the last reset.
    #[inline]
    #[must_use]
    pub const fn used_this_frame(&self) -> usize {
        self.used_this_frame
    }

    /// Wrap warnings logged so far, at most the warning limit.
    #[inline]
    #[must_use]
    pub const fn warnings_emitted(&self) -> u32 {
        self.warnings_emitted
    }

    /// Current frame epoch.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Hands out the next slot. O(1), never allocates.
    pub fn acquire(&mut self) -> TempSlot {
        if self.cursor == self.slots {
            self.cursor = 0;
            self.wraps += 1;
            if self.warnings_emitted < self.warning_limit {
                self.warnings_emitted += 1;
                tracing::warn!(
                    pool = self.name.as_str(),
                    slots = self.slots,
                    wraps = self.wraps,
                    "frame stack pool wrapped, earlier slots of this frame will be reused"
                );
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = self.cursor as u32;
        self.cursor += 1;
        self.used_this_frame += 1;
        self.high_water = self.high_water.max(self.used_this_frame);

        TempSlot {
            index,
            frame: self.frame,
        }
    }

    /// Contents of a slot acquired this frame.
    #[must_use]
    pub fn slot(&self, handle: TempSlot) -> Option<&[f32]> {
        if handle.frame != self.frame {
            return None;
        }
        let start = handle.index() * self.width;
        self.buffer.get(start..start + self.width)
    }

    /// Mutable contents of a slot acquired this frame.
    pub fn slot_mut(&mut self, handle: TempSlot) -> Option<&mut [f32]> {
        if handle.frame != self.frame {
            return None;
        }
        let start = handle.index() * self.width;
        self.buffer.get_mut(start..start + self.width)
    }

    /// Reclaims every slot and starts a new frame epoch.
    ///
    /// Zero-cost: the buffer is not touched.
    #[inline]
    pub fn reset_frame(&mut self) {
        self.cursor = 0;
        self.used_this_frame = 0;
        self.frame = self.frame.wrapping_add(1);
    }

    /// Snapshot of the tuning counters.
    #[must_use]
    pub fn stats(&self) -> StackPoolStats {
        StackPoolStats {
            slots: self.slots,
            used_this_frame: self.used_this_frame,
            high_water: self.high_water,
            wraps: self.wraps,
        }
    }
}

impl PoolDiagnostics for TempStackPool {
    fn pool_name(&self) -> &str {
        &self.name
    }

    fn pool_stats(&self) -> PoolStats {
        PoolStats::Stack(self.stats())
    }
}

/// The three per-frame temporary pools the simulation loop resets each
/// frame.
pub struct FramePools {
    /// Vector temporaries.
    pub vec3: TempStackPool,
    /// Quaternion temporaries.
    pub quat: TempStackPool,
    /// Matrix temporaries.
    pub mat4: TempStackPool,
}

impl FramePools {
    /// Sizes the pools from configuration.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        let limit = config.overflow_warning_limit;
        Self {
            vec3: TempStackPool::vec3("frame_vec3", config.vec3_slots)
                .with_warning_limit(limit),
            quat: TempStackPool::quat("frame_quat", config.quat_slots)
                .with_warning_limit(limit),
            mat4: TempStackPool::mat4("frame_mat4", config.mat4_slots)
                .with_warning_limit(limit),
        }
    }

    /// Reclaims every slot of every pool.
    pub fn reset_frame(&mut self) {
        self.vec3.reset_frame();
        self.quat.reset_frame();
        self.mat4.reset_frame();
    }
}

impl Default for FramePools {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}
