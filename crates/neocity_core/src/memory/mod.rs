//! # Memory Management
//!
//! Pools that keep the steady-state frame free of heap traffic.
//!
//! - [`ObjectPool`]: pre-warmed owned objects, acquire/release
//! - [`TempStackPool`]: frame-scoped math temporaries, reset each frame
//! - [`PoolRegistry`]: named counters for tuning pool sizes

mod pool;
mod registry;
mod stack;

pub use pool::ObjectPool;
pub use registry::{ObjectPoolStats, PoolDiagnostics, PoolRegistry, PoolStats, StackPoolStats};
pub use stack::{FramePools, TempSlot, TempStackPool};
