//! # Component System
//!
//! Components are pure data laid out as runs of 4-byte words, so each kind
//! maps onto a fixed stride of `f32` slots in its store. Integer fields
//! (ids, flags) share the same slots bit-for-bit via `bytemuck`.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use bytemuck::{Pod, Zeroable};

use super::entity::EntityId;
use super::storage::{ComponentStore, Components};

/// The closed set of component kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentKind {
    /// Position, rotation, scale, parent.
    Transform = 0,
    /// Physical body parameters.
    RigidBody = 1,
    /// Render model reference and flags.
    Render = 2,
    /// Character needs and vitals.
    CharacterStats = 3,
    /// Ring of recent input samples.
    InputState = 4,
    /// Behavior state with bounded path and memory.
    AiState = 5,
    /// Boolean flag bitmask.
    Tag = 6,
}

impl ComponentKind {
    /// Every kind, in bit order.
    pub const ALL: [Self; 7] = [
        Self::Transform,
        Self::RigidBody,
        Self::Render,
        Self::CharacterStats,
        Self::InputState,
        Self::AiState,
        Self::Tag,
    ];

    /// Returns the mask bit of this kind.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << (self as u8)
    }

    /// Number of `f32` slots one entity occupies in this kind's store.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self {
            Self::Transform => stride_of::<Transform>(),
            Self::RigidBody => stride_of::<RigidBody>(),
            Self::Render => stride_of::<Render>(),
            Self::CharacterStats => stride_of::<CharacterStats>(),
            Self::InputState => stride_of::<InputState>(),
            Self::AiState => stride_of::<AiState>(),
            Self::Tag => stride_of::<Tags>(),
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::RigidBody => "rigid_body",
            Self::Render => "render",
            Self::CharacterStats => "character_stats",
            Self::InputState => "input_state",
            Self::AiState => "ai_state",
            Self::Tag => "tag",
        }
    }
}

/// Number of `f32` slots a plain-data type occupies.
#[inline]
#[must_use]
pub const fn stride_of<T>() -> usize {
    std::mem::size_of::<T>() / std::mem::size_of::<f32>()
}

/// Bitwise union of component kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentMask(u32);

impl ComponentMask {
    /// No components.
    pub const EMPTY: Self = Self(0);

    /// Builds a mask from a list of kinds.
    #[must_use]
    pub const fn of(kinds: &[ComponentKind]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Wraps raw bits. Bits above the last kind are dropped.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & ((1 << ComponentKind::ALL.len()) - 1))
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns this mask with `kind` added.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: ComponentKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Returns this mask with `kind` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, kind: ComponentKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    /// Checks for a single kind.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Checks that every bit of `required` is present.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Checks for any shared bit.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Checks for the empty mask.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the kinds in this mask.
    pub fn kinds(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl From<ComponentKind> for ComponentMask {
    fn from(kind: ComponentKind) -> Self {
        Self(kind.bit())
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<ComponentKind> for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: ComponentKind) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for ComponentMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: a run of 4-byte words with no padding, viewable in place
/// - `Copy`: no heap allocations
///
/// Each component is stored in exactly one field of [`Components`].
pub trait Component: Pod + Send + Sync + 'static {
    /// The kind this type represents.
    const KIND: ComponentKind;

    /// Value written into the slot when the component is attached.
    #[must_use]
    fn initial() -> Self {
        Self::zeroed()
    }

    /// Returns this component's store.
    fn store(components: &Components) -> &ComponentStore<Self>;

    /// Returns this component's store mutably.
    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self>;
}

// =============================================================================
// Transform
// =============================================================================

/// Identity rotation quaternion `(x, y, z, w)`.
pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Spatial transform.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// World position.
    pub position: [f32; 3],
    /// Rotation quaternion `(x, y, z, w)`.
    pub rotation: [f32; 4],
    /// Per-axis scale.
    pub scale: [f32; 3],
    /// Raw id of the parent entity, `EntityId::NULL` when unparented.
    pub parent: u32,
}

impl Transform {
    /// Identity transform at the origin with no parent.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: IDENTITY_ROTATION,
        scale: [1.0; 3],
        parent: u32::MAX,
    };

    /// Returns the parent entity, if any.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        let id = EntityId::from_raw(self.parent);
        if id.is_null() {
            None
        } else {
            Some(id)
        }
    }

    /// Sets or clears the parent entity.
    #[inline]
    pub fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent.unwrap_or(EntityId::NULL).raw();
    }

    /// Position and rotation only.
    #[inline]
    #[must_use]
    pub const fn sample(&self) -> TransformSample {
        TransformSample {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

impl Component for Transform {
    const KIND: ComponentKind = ComponentKind::Transform;

    fn initial() -> Self {
        Self::IDENTITY
    }

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.transforms
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.transforms
    }
}

/// Position and rotation of one entity: the unit of snapshots,
/// interpolation and the cross-thread bridge.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TransformSample {
    /// World position.
    pub position: [f32; 3],
    /// Rotation quaternion `(x, y, z, w)`.
    pub rotation: [f32; 4],
}

impl TransformSample {
    /// Origin with identity rotation.
    pub const IDENTITY: Self = Self {
        position: [0.0; 3],
        rotation: IDENTITY_ROTATION,
    };

    /// Flat `[px, py, pz, rx, ry, rz, rw]` form.
    #[inline]
    #[must_use]
    pub fn to_array(self) -> [f32; 7] {
        bytemuck::cast(self)
    }

    /// Builds a sample from the flat form.
    #[inline]
    #[must_use]
    pub fn from_array(values: [f32; 7]) -> Self {
        bytemuck::cast(values)
    }
}

// =============================================================================
// RigidBody
// =============================================================================

/// Physical body parameters consumed by an external solver.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RigidBody {
    /// Mass in kilograms. Zero means immovable.
    pub mass: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Bounciness.
    pub restitution: f32,
    /// Collision shape id.
    pub shape_id: u32,
    /// Solver flags.
    pub flags: u32,
    /// Collision group bits.
    pub collision_group: u32,
}

impl Component for RigidBody {
    const KIND: ComponentKind = ComponentKind::RigidBody;

    fn initial() -> Self {
        Self {
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
            shape_id: 0,
            flags: 0,
            collision_group: 1,
        }
    }

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.rigid_bodies
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.rigid_bodies
    }
}

// =============================================================================
// Render
// =============================================================================

/// Render model reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Render {
    /// Model asset reference.
    pub model_ref: u32,
    /// Current level of detail, 0 is finest.
    pub lod: u32,
    /// [`Render::VISIBLE`] / [`Render::CASTS_SHADOW`] bits.
    pub flags: u32,
    /// Reserved word keeping the stride at four slots.
    pub reserved: u32,
}

impl Render {
    /// Entity is drawn.
    pub const VISIBLE: u32 = 1;
    /// Entity casts shadows.
    pub const CASTS_SHADOW: u32 = 1 << 1;

    /// Checks the visible flag.
    #[inline]
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.flags & Self::VISIBLE != 0
    }

    /// Checks the shadow flag.
    #[inline]
    #[must_use]
    pub const fn casts_shadow(&self) -> bool {
        self.flags & Self::CASTS_SHADOW != 0
    }
}

impl Component for Render {
    const KIND: ComponentKind = ComponentKind::Render;

    fn initial() -> Self {
        Self {
            model_ref: 0,
            lod: 0,
            flags: Self::VISIBLE | Self::CASTS_SHADOW,
            reserved: 0,
        }
    }

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.renders
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.renders
    }
}

// =============================================================================
// CharacterStats
// =============================================================================

/// Upper bound of every character stat.
pub const STAT_MAX: f32 = 100.0;

/// Names one of the eight character stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stat {
    /// Hit points.
    Health,
    /// Need for food.
    Hunger,
    /// Energy for running and fighting.
    Stamina,
    /// Mental strain.
    Stress,
    /// Cleanliness.
    Hygiene,
    /// Need for a toilet.
    Bladder,
    /// Substance dependency.
    Addiction,
    /// Poison load.
    Toxicity,
}

/// Character needs and vitals, each in `[0, STAT_MAX]`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct CharacterStats {
    /// Hit points.
    pub health: f32,
    /// Need for food.
    pub hunger: f32,
    /// Energy.
    pub stamina: f32,
    /// Mental strain.
    pub stress: f32,
    /// Cleanliness.
    pub hygiene: f32,
    /// Need for a toilet.
    pub bladder: f32,
    /// Substance dependency.
    pub addiction: f32,
    /// Poison load.
    pub toxicity: f32,
}

impl CharacterStats {
    /// Reads one stat.
    #[must_use]
    pub const fn get(&self, stat: Stat) -> f32 {
        match stat {
            Stat::Health => self.health,
            Stat::Hunger => self.hunger,
            Stat::Stamina => self.stamina,
            Stat::Stress => self.stress,
            Stat::Hygiene => self.hygiene,
            Stat::Bladder => self.bladder,
            Stat::Addiction => self.addiction,
            Stat::Toxicity => self.toxicity,
        }
    }

    fn slot_mut(&mut self, stat: Stat) -> &mut f32 {
        match stat {
            Stat::Health => &mut self.health,
            Stat::Hunger => &mut self.hunger,
            Stat::Stamina => &mut self.stamina,
            Stat::Stress => &mut self.stress,
            Stat::Hygiene => &mut self.hygiene,
            Stat::Bladder => &mut self.bladder,
            Stat::Addiction => &mut self.addiction,
            Stat::Toxicity => &mut self.toxicity,
        }
    }

    /// Sets one stat, clamped to `[0, STAT_MAX]`.
    pub fn set(&mut self, stat: Stat, value: f32) {
        *self.slot_mut(stat) = value.clamp(0.0, STAT_MAX);
    }

    /// Adds `delta` to one stat, clamped to `[0, STAT_MAX]`. Returns the new value.
    pub fn adjust(&mut self, stat: Stat, delta: f32) -> f32 {
        let slot = self.slot_mut(stat);
        *slot = (*slot + delta).clamp(0.0, STAT_MAX);
        *slot
    }
}

impl Component for CharacterStats {
    const KIND: ComponentKind = ComponentKind::CharacterStats;

    fn initial() -> Self {
        Self {
            health: STAT_MAX,
            stamina: STAT_MAX,
            hygiene: STAT_MAX,
            ..Self::zeroed()
        }
    }

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.stats
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.stats
    }
}

// =============================================================================
// InputState
// =============================================================================

/// Samples kept in the input ring.
pub const INPUT_HISTORY: usize = 8;

/// Ring of the most recent `(move_x, move_z)` input samples.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct InputState {
    /// Slot the next sample is written to.
    pub cursor: u32,
    /// Number of valid samples, at most [`INPUT_HISTORY`].
    pub len: u32,
    /// Sample ring.
    pub samples: [[f32; 2]; INPUT_HISTORY],
}

impl InputState {
    /// Pushes a sample, overwriting the oldest when full.
    pub fn push(&mut self, sample: [f32; 2]) {
        let cursor = self.cursor as usize % INPUT_HISTORY;
        self.samples[cursor] = sample;
        #[allow(clippy::cast_possible_truncation)]
        {
            self.cursor = ((cursor + 1) % INPUT_HISTORY) as u32;
            self.len = (self.len as usize + 1).min(INPUT_HISTORY) as u32;
        }
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<[f32; 2]> {
        self.recent().next()
    }

    /// Iterates samples newest first.
    pub fn recent(&self) -> impl Iterator<Item = [f32; 2]> + '_ {
        let cursor = self.cursor as usize;
        (1..=self.len as usize)
            .map(move |back| self.samples[(cursor + INPUT_HISTORY - back) % INPUT_HISTORY])
    }
}

impl Component for InputState {
    const KIND: ComponentKind = ComponentKind::InputState;

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.inputs
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.inputs
    }
}

// =============================================================================
// AiState
// =============================================================================

/// Path nodes an agent can hold.
pub const MAX_PATH_NODES: usize = 8;
/// Remembered entities an agent can hold.
pub const MAX_MEMORY_ENTRIES: usize = 4;

/// Behavior state for non-player agents.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct AiState {
    /// Active behavior id.
    pub behavior_id: u32,
    /// Raw id of the current target, `EntityId::NULL` when none.
    pub target: u32,
    /// Alertness in `[0, 1]`.
    pub alertness: f32,
    /// Valid entries in `path`.
    pub path_len: u32,
    /// Waypoints as `(x, z)`.
    pub path: [[f32; 2]; MAX_PATH_NODES],
    /// Valid entries in `memory`.
    pub memory_len: u32,
    /// Raw ids of remembered entities, oldest first.
    pub memory: [u32; MAX_MEMORY_ENTRIES],
}

impl AiState {
    /// Current target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        let id = EntityId::from_raw(self.target);
        if id.is_null() {
            None
        } else {
            Some(id)
        }
    }

    /// Sets or clears the target.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target.unwrap_or(EntityId::NULL).raw();
    }

    /// Appends a waypoint. Returns `false` when the path is full.
    pub fn push_path_node(&mut self, node: [f32; 2]) -> bool {
        let len = self.path_len as usize;
        if len >= MAX_PATH_NODES {
            return false;
        }
        self.path[len] = node;
        self.path_len += 1;
        true
    }

    /// Drops every waypoint.
    pub fn clear_path(&mut self) {
        self.path_len = 0;
    }

    /// Valid waypoints.
    #[must_use]
    pub fn path(&self) -> &[[f32; 2]] {
        &self.path[..(self.path_len as usize).min(MAX_PATH_NODES)]
    }

    /// Remembers an entity, forgetting the oldest entry when full.
    pub fn remember(&mut self, entity: EntityId) {
        let len = (self.memory_len as usize).min(MAX_MEMORY_ENTRIES);
        if self.memory[..len].contains(&entity.raw()) {
            return;
        }
        if len == MAX_MEMORY_ENTRIES {
            self.memory.copy_within(1.., 0);
            self.memory[MAX_MEMORY_ENTRIES - 1] = entity.raw();
        } else {
            self.memory[len] = entity.raw();
            self.memory_len += 1;
        }
    }

    /// Remembered entities, oldest first.
    pub fn memory(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.memory[..(self.memory_len as usize).min(MAX_MEMORY_ENTRIES)]
            .iter()
            .map(|raw| EntityId::from_raw(*raw))
    }
}

impl Component for AiState {
    const KIND: ComponentKind = ComponentKind::AiState;

    fn initial() -> Self {
        Self {
            target: u32::MAX,
            ..Self::zeroed()
        }
    }

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.ai
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.ai
    }
}

// =============================================================================
// Tag
// =============================================================================

/// Boolean entity flags packed in one word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Tags {
    /// Flag bits.
    pub bits: u32,
}

impl Tags {
    /// Controlled by the local player.
    pub const PLAYER: u32 = 1;
    /// Hostile to the player.
    pub const ENEMY: u32 = 1 << 1;
    /// Never moves.
    pub const STATIC: u32 = 1 << 2;
    /// Drivable vehicle.
    pub const VEHICLE: u32 = 1 << 3;
    /// Ambient non-player character.
    pub const NPC: u32 = 1 << 4;
    /// Can be used by the player.
    pub const INTERACTABLE: u32 = 1 << 5;

    /// Checks all bits of `flags`.
    #[inline]
    #[must_use]
    pub const fn contains(self, flags: u32) -> bool {
        self.bits & flags == flags
    }

    /// Sets bits.
    #[inline]
    pub fn insert(&mut self, flags: u32) {
        self.bits |= flags;
    }

    /// Clears bits.
    #[inline]
    pub fn remove(&mut self, flags: u32) {
        self.bits &= !flags;
    }
}

impl Component for Tags {
    const KIND: ComponentKind = ComponentKind::Tag;

    fn store(components: &Components) -> &ComponentStore<Self> {
        &components.tags
    }

    fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
        &mut components.tags
    }
}
