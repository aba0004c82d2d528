//! # Entity Component System
//!
//! A zero-allocation, archetype-grouped struct-of-arrays ECS.
//!
//! ## Design Philosophy
//!
//! - All component storage is pre-allocated at world creation
//! - Each component kind is one flat `f32` buffer with a fixed stride
//! - Entity IDs are plain indices recycled through a LIFO free-list
//! - Entities with identical component sets are grouped for iteration

pub mod archetype;
mod component;
mod entity;
mod storage;
mod world;

pub use archetype::{Archetype, ArchetypeId, ArchetypeRegistry};
pub use component::{
    stride_of, AiState, CharacterStats, Component, ComponentKind, ComponentMask, InputState,
    Render, RigidBody, Stat, Tags, Transform, TransformSample, IDENTITY_ROTATION,
    INPUT_HISTORY, MAX_MEMORY_ENTRIES, MAX_PATH_NODES, STAT_MAX,
};
pub use entity::{AliveIter, EntityId, EntityRegistry};
pub use storage::{ComponentStore, Components};
pub use world::World;
