//! # Core Configuration
//!
//! All sizing and tuning values for the simulation core. Loaded once at
//! startup from TOML; every section has defaults so a partial file is valid.
//!
//! ```toml
//! [world]
//! capacity = 65536
//!
//! [timestep]
//! step_hz = 60
//! max_frame_delta = 0.25
//!
//! [streaming]
//! chunk_size = 64.0
//! high_distance = 96.0
//! medium_distance = 192.0
//! low_distance = 384.0
//! band = 16.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Top-level configuration for the simulation core.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Entity universe sizing.
    pub world: WorldConfig,
    /// Fixed-timestep loop tuning.
    pub timestep: TimestepConfig,
    /// Pool budgets.
    pub pools: PoolConfig,
    /// Spatial hash grid.
    pub spatial: SpatialConfig,
    /// Chunk streaming thresholds.
    pub streaming: StreamingConfig,
    /// Worker supervision.
    pub worker: WorkerConfig,
}

impl CoreConfig {
    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] for malformed TOML and
    /// [`CoreError::InvalidConfig`] when values are inconsistent.
    pub fn from_toml_str(source: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigIo`] if the file cannot be read, otherwise
    /// the same errors as [`CoreConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks cross-field invariants of every section.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] describing the first violation.
    pub fn validate(&self) -> CoreResult<()> {
        self.world.validate()?;
        self.timestep.validate()?;
        self.pools.validate()?;
        self.spatial.validate()?;
        self.streaming.validate()?;
        self.worker.validate()?;
        Ok(())
    }
}

/// Strictly positive and not NaN.
fn is_positive(value: f32) -> bool {
    value > 0.0
}

/// Entity universe configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Maximum number of entities. Must be a power of two.
    pub capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { capacity: 65_536 }
    }
}

impl WorldConfig {
    fn validate(&self) -> CoreResult<()> {
        if !self.capacity.is_power_of_two() {
            return Err(CoreError::InvalidConfig(format!(
                "world.capacity must be a power of two, got {}",
                self.capacity
            )));
        }
        if self.capacity > u32::MAX as usize {
            return Err(CoreError::InvalidConfig(
                "world.capacity cannot exceed u32::MAX".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed-timestep loop configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestepConfig {
    /// Simulation rate in steps per second.
    pub step_hz: u32,
    /// Largest frame delta accepted per tick, in seconds.
    pub max_frame_delta: f32,
}

impl Default for TimestepConfig {
    fn default() -> Self {
        Self {
            step_hz: 60,
            max_frame_delta: 0.25,
        }
    }
}

impl TimestepConfig {
    /// Length of one fixed step in seconds.
    #[inline]
    #[must_use]
    pub fn step_seconds(&self) -> f32 {
        1.0 / self.step_hz as f32
    }

    fn validate(&self) -> CoreResult<()> {
        if self.step_hz == 0 {
            return Err(CoreError::InvalidConfig(
                "timestep.step_hz must be positive".to_string(),
            ));
        }
        if !is_positive(self.max_frame_delta) {
            return Err(CoreError::InvalidConfig(
                "timestep.max_frame_delta must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pool budget configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Frame-scoped vec3 slots.
    pub vec3_slots: usize,
    /// Frame-scoped quaternion slots.
    pub quat_slots: usize,
    /// Frame-scoped 4x4 matrix slots.
    pub mat4_slots: usize,
    /// Overflow (object pool) or wrap (stack pool) warnings a pool emits
    /// before going quiet.
    pub overflow_warning_limit: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            vec3_slots: 1024,
            quat_slots: 512,
            mat4_slots: 128,
            overflow_warning_limit: 5,
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.vec3_slots == 0 || self.quat_slots == 0 || self.mat4_slots == 0 {
            return Err(CoreError::InvalidConfig(
                "pools: every stack pool needs at least one slot".to_string(),
            ));
        }
        Ok(())
    }
}

/// Spatial hash grid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Edge length of one square cell in world units.
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self { cell_size: 16.0 }
    }
}

impl SpatialConfig {
    fn validate(&self) -> CoreResult<()> {
        if !is_positive(self.cell_size) {
            return Err(CoreError::InvalidConfig(
                "spatial.cell_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chunk streaming configuration.
///
/// Distances are measured from chunk center to observer on the (x, z) plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Edge length of one chunk in world units.
    pub chunk_size: f32,
    /// Chunks closer than this are High detail.
    pub high_distance: f32,
    /// Chunks closer than this are Medium detail.
    pub medium_distance: f32,
    /// Chunks closer than this are Low detail; beyond it they unload.
    pub low_distance: f32,
    /// Hysteresis half-width around each threshold.
    pub band: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64.0,
            high_distance: 96.0,
            medium_distance: 192.0,
            low_distance: 384.0,
            band: 16.0,
        }
    }
}

impl StreamingConfig {
    fn validate(&self) -> CoreResult<()> {
        if !is_positive(self.chunk_size) {
            return Err(CoreError::InvalidConfig(
                "streaming.chunk_size must be positive".to_string(),
            ));
        }
        let ordered = self.high_distance < self.medium_distance
            && self.medium_distance < self.low_distance;
        if !ordered {
            return Err(CoreError::InvalidConfig(
                "streaming thresholds must satisfy high < medium < low".to_string(),
            ));
        }
        if self.band < 0.0 {
            return Err(CoreError::InvalidConfig(
                "streaming.band cannot be negative".to_string(),
            ));
        }
        let smallest_gap = self
            .high_distance
            .min(self.medium_distance - self.high_distance)
            .min(self.low_distance - self.medium_distance);
        if 2.0 * self.band >= smallest_gap {
            return Err(CoreError::InvalidConfig(format!(
                "streaming.band {} is too wide for the tier gaps (smallest gap {smallest_gap})",
                self.band
            )));
        }
        Ok(())
    }
}

/// Worker supervision configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Restarts attempted after a crash before the worker is terminated.
    pub max_restarts: u32,
    /// Delay before each restart, in milliseconds.
    pub restart_backoff_ms: u64,
    /// Capacity of the message channels in each direction.
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            restart_backoff_ms: 100,
            channel_capacity: 16,
        }
    }
}

impl WorkerConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.channel_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "worker.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CoreConfig::from_toml_str(
            r"
            [world]
            capacity = 1024

            [timestep]
            step_hz = 30
            ",
        )
        .unwrap();

        assert_eq!(config.world.capacity, 1024);
        assert_eq!(config.timestep.step_hz, 30);
        assert!((config.timestep.max_frame_delta - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.worker, WorkerConfig::default());
    }

    #[test]
    fn test_rejects_non_power_of_two_capacity() {
        let result = CoreConfig::from_toml_str("[world]\ncapacity = 1000\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let result = CoreConfig::from_toml_str(
            "[streaming]\nhigh_distance = 200.0\nmedium_distance = 100.0\n",
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_wide_band() {
        let result = CoreConfig::from_toml_str("[streaming]\nband = 60.0\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_nan_step_bounds() {
        let result = CoreConfig::from_toml_str("[timestep]\nmax_frame_delta = nan\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
        let result = CoreConfig::from_toml_str("[spatial]\ncell_size = -1.0\n");
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = CoreConfig::from_toml_str("[world\ncapacity = ");
        assert!(matches!(result, Err(CoreError::ConfigParse(_))));
    }
}
