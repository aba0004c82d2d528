//! # NeoCity Core
//!
//! The real-time simulation substrate of the NeoCity world:
//! - 65,536 entities in pre-allocated struct-of-arrays storage
//! - Deterministic fixed-rate simulation under any frame rate
//! - No heap traffic in the steady-state frame
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - stores, pools and the bridge are
//!    sized at startup
//! 2. **Data-oriented design** - one flat buffer per component kind
//! 3. **Single simulation thread** - only the transform bridge crosses
//!    threads, through one atomic page flip
//!
//! ## Example
//!
//! ```rust,ignore
//! use neocity_core::{ComponentKind, ComponentMask, CoreConfig, SimulationLoop};
//!
//! let config = CoreConfig::from_toml_file("neocity.toml")?;
//! let mut sim = SimulationLoop::from_config(&config);
//!
//! let player = sim.world_mut().spawn(ComponentMask::of(&[
//!     ComponentKind::Transform,
//!     ComponentKind::InputState,
//! ]));
//!
//! // Once per rendered frame:
//! sim.tick(frame_delta_seconds);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod schedule;
pub mod spatial;
pub mod sync;
pub mod time;

pub use config::CoreConfig;
pub use ecs::{
    AiState, CharacterStats, Component, ComponentKind, ComponentMask, EntityId, InputState,
    Render, RigidBody, Stat, Tags, Transform, TransformSample, World,
};
pub use error::{CoreError, CoreResult};
pub use memory::{FramePools, ObjectPool, PoolRegistry, TempStackPool};
pub use schedule::{Phase, Scheduler, SystemContext, SystemDescriptor};
pub use spatial::{ChunkKey, ChunkTier, SpatialHashGrid, StreamEvent, StreamingGrid};
pub use sync::{TransformBridge, WorkerSupervisor};
pub use time::{LoopMetrics, SimulationLoop};
