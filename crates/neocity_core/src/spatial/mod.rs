//! # Spatial Partitioning
//!
//! - [`SpatialHashGrid`]: entity neighbor queries on the (x, z) plane
//! - [`StreamingGrid`]: level-of-detail tiers for world chunks around an
//!   observer

mod hash_grid;
mod streaming;

pub use hash_grid::SpatialHashGrid;
pub use streaming::{ChunkKey, ChunkTier, StreamEvent, StreamListener, StreamingGrid};
