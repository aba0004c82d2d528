//! # ECS World
//!
//! The facade over entity registry, archetype registry and component stores.
//! Pre-allocates all memory at creation time.

use super::archetype::ArchetypeRegistry;
use super::component::{
    AiState, CharacterStats, Component, ComponentKind, ComponentMask, InputState, Render,
    RigidBody, Stat, Tags, Transform, TransformSample,
};
use super::entity::{AliveIter, EntityId, EntityRegistry};
use super::storage::Components;
use crate::config::WorldConfig;

/// The ECS World - container for all simulation state.
///
/// All memory is pre-allocated at creation. Spawning, despawning and moving
/// entities between archetypes touch only pre-sized buffers (archetype lists
/// grow once to their working size and are reused afterwards).
///
/// # Capacity
///
/// The capacity is a power of two fixed at creation. `reset` clears in place
/// rather than reallocating.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(65_536);
///
/// let id = world.spawn(ComponentMask::of(&[ComponentKind::Transform]));
/// world.set_position(id, [1.0, 2.0, 3.0]);
/// ```
pub struct World {
    entities: EntityRegistry,
    archetypes: ArchetypeRegistry,
    components: Components,
    /// Transform entities not yet captured by a snapshot, 64 per word.
    fresh: Box<[u64]>,
    fresh_count: usize,
    capacity: usize,
}

impl World {
    /// Creates a new world with the specified entity capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is not a power of two or does not fit in `u32`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "Capacity must be a power of two"
        );

        Self {
            entities: EntityRegistry::new(capacity),
            archetypes: ArchetypeRegistry::new(capacity),
            components: Components::new(capacity),
            fresh: vec![0u64; capacity.div_ceil(64)].into_boxed_slice(),
            fresh_count: 0,
            capacity,
        }
    }

    /// Creates a world sized by configuration.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Returns the maximum capacity of this world.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Spawns an entity owning the components in `mask`.
    ///
    /// Each attached component slot is initialized (identity transform,
    /// unit scale, no parent, ...).
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached.
    pub fn spawn(&mut self, mask: ComponentMask) -> EntityId {
        let Some(id) = self.entities.allocate(mask) else {
            tracing::warn!(
                capacity = self.capacity,
                "entity capacity exhausted, spawn refused"
            );
            return EntityId::NULL;
        };

        for kind in mask.kinds() {
            self.components.initialize(kind, id.index());
        }
        if mask.contains(ComponentKind::Transform) {
            self.mark_fresh(id);
        }
        self.archetypes.insert(id, mask);

        id
    }

    /// Despawns an entity, freeing its index for reuse.
    ///
    /// Component buffers are left as they are until the index is reused.
    ///
    /// # Returns
    ///
    /// `true` if the entity was despawned, `false` if it was not alive.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.entities.is_alive(id) {
            return false;
        }
        self.archetypes.remove(id);
        self.entities.release(id)
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    /// Returns the component mask of an alive entity.
    #[inline]
    #[must_use]
    pub fn mask(&self, id: EntityId) -> Option<ComponentMask> {
        self.entities.mask(id)
    }

    /// Checks if an alive entity owns `kind`.
    #[inline]
    #[must_use]
    pub fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.mask(id).is_some_and(|mask| mask.contains(kind))
    }

    /// Attaches a component kind, moving the entity to its new archetype.
    ///
    /// Returns `false` if the entity is dead or already owns `kind`.
    pub fn add_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let Some(mask) = self.entities.mask(id) else {
            return false;
        };
        if mask.contains(kind) {
            return false;
        }
        let next = mask.with(kind);
        self.components.initialize(kind, id.index());
        if kind == ComponentKind::Transform {
            self.mark_fresh(id);
        }
        self.entities.set_mask(id, next);
        self.archetypes.relocate(id, next);
        true
    }

    /// Detaches a component kind, moving the entity to its new archetype.
    ///
    /// Returns `false` if the entity is dead or does not own `kind`.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        let Some(mask) = self.entities.mask(id) else {
            return false;
        };
        if !mask.contains(kind) {
            return false;
        }
        let next = mask.without(kind);
        self.entities.set_mask(id, next);
        self.archetypes.relocate(id, next);
        true
    }

    /// Typed view of a component on an alive entity that owns it.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        if !self.has_component(id, C::KIND) {
            return None;
        }
        self.components.get::<C>(id.index())
    }

    /// Typed mutable view of a component on an alive entity that owns it.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        if !self.has_component(id, C::KIND) {
            return None;
        }
        self.components.get_mut::<C>(id.index())
    }

    /// Overwrites a component on an alive entity that owns it.
    pub fn set<C: Component>(&mut self, id: EntityId, value: C) -> bool {
        match self.get_mut::<C>(id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns the transform of an entity.
    #[inline]
    #[must_use]
    pub fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.get::<Transform>(id)
    }

    /// Returns the position of an entity.
    #[inline]
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<[f32; 3]> {
        self.transform(id).map(|t| t.position)
    }

    /// Sets the position of an entity.
    pub fn set_position(&mut self, id: EntityId, position: [f32; 3]) -> bool {
        self.get_mut::<Transform>(id)
            .map(|t| t.position = position)
            .is_some()
    }

    /// Sets the rotation quaternion `(x, y, z, w)` of an entity.
    pub fn set_rotation(&mut self, id: EntityId, rotation: [f32; 4]) -> bool {
        self.get_mut::<Transform>(id)
            .map(|t| t.rotation = rotation)
            .is_some()
    }

    /// Sets the scale of an entity.
    pub fn set_scale(&mut self, id: EntityId, scale: [f32; 3]) -> bool {
        self.get_mut::<Transform>(id)
            .map(|t| t.scale = scale)
            .is_some()
    }

    /// Sets or clears the parent of an entity.
    pub fn set_parent(&mut self, id: EntityId, parent: Option<EntityId>) -> bool {
        self.get_mut::<Transform>(id)
            .map(|t| t.set_parent(parent))
            .is_some()
    }

    /// Returns the rigid body of an entity.
    #[inline]
    #[must_use]
    pub fn rigid_body(&self, id: EntityId) -> Option<&RigidBody> {
        self.get::<RigidBody>(id)
    }

    /// Returns the render state of an entity.
    #[inline]
    #[must_use]
    pub fn render(&self, id: EntityId) -> Option<&Render> {
        self.get::<Render>(id)
    }

    /// Returns the character stats of an entity.
    #[inline]
    #[must_use]
    pub fn stats(&self, id: EntityId) -> Option<&CharacterStats> {
        self.get::<CharacterStats>(id)
    }

    /// Adds `delta` to one stat, clamped. Returns the new value.
    pub fn adjust_stat(&mut self, id: EntityId, stat: Stat, delta: f32) -> Option<f32> {
        self.get_mut::<CharacterStats>(id)
            .map(|stats| stats.adjust(stat, delta))
    }

    /// Pushes one (move-x, move-z) sample into the entity's input ring.
    pub fn push_input(&mut self, id: EntityId, sample: [f32; 2]) -> bool {
        self.get_mut::<InputState>(id)
            .map(|input| input.push(sample))
            .is_some()
    }

    /// Returns the AI state of an entity.
    #[inline]
    #[must_use]
    pub fn ai(&self, id: EntityId) -> Option<&AiState> {
        self.get::<AiState>(id)
    }

    /// Returns the AI state of an entity mutably.
    #[inline]
    pub fn ai_mut(&mut self, id: EntityId) -> Option<&mut AiState> {
        self.get_mut::<AiState>(id)
    }

    /// Returns the tag flags of an entity.
    #[inline]
    #[must_use]
    pub fn tags(&self, id: EntityId) -> Option<Tags> {
        self.get::<Tags>(id).copied()
    }

    /// Checks all bits of `flags`. `false` without a Tag component.
    #[inline]
    #[must_use]
    pub fn has_tag(&self, id: EntityId, flags: u32) -> bool {
        self.tags(id).is_some_and(|tags| tags.contains(flags))
    }

    /// Sets tag bits.
    pub fn set_tag(&mut self, id: EntityId, flags: u32) -> bool {
        self.get_mut::<Tags>(id)
            .map(|tags| tags.insert(flags))
            .is_some()
    }

    /// Clears tag bits.
    pub fn clear_tag(&mut self, id: EntityId, flags: u32) -> bool {
        self.get_mut::<Tags>(id)
            .map(|tags| tags.remove(flags))
            .is_some()
    }

    /// Position and rotation of an entity as of the last snapshot.
    #[inline]
    #[must_use]
    pub fn previous_transform(&self, id: EntityId) -> Option<&TransformSample> {
        if !self.has_component(id, ComponentKind::Transform) {
            return None;
        }
        self.components.previous.get(id.index())
    }

    fn mark_fresh(&mut self, id: EntityId) {
        let index = id.index();
        let bit = 1u64 << (index % 64);
        if self.fresh[index / 64] & bit == 0 {
            self.fresh[index / 64] |= bit;
            self.fresh_count += 1;
        }
    }

    fn clear_fresh(&mut self) {
        if self.fresh_count > 0 {
            self.fresh.fill(0);
            self.fresh_count = 0;
        }
    }

    /// Checks whether a Transform entity was attached after the last
    /// snapshot, so its previous state is not meaningful yet.
    #[inline]
    #[must_use]
    pub fn awaiting_snapshot(&self, id: EntityId) -> bool {
        let index = id.index();
        self.has_component(id, ComponentKind::Transform)
            && (self.fresh[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Sets the previous state of every Transform entity attached since the
    /// last snapshot to its current pose, so it does not blend in from the
    /// origin.
    pub fn seed_fresh_transforms(&mut self) {
        if self.fresh_count == 0 {
            return;
        }
        for (word_idx, word) in self.fresh.iter().enumerate() {
            let mut bits = *word;
            while bits != 0 {
                let index = word_idx * 64 + bits.trailing_zeros() as usize;
                bits &= bits - 1;
                #[allow(clippy::cast_possible_truncation)]
                let id = EntityId::from_raw(index as u32);
                if !self.has_component(id, ComponentKind::Transform) {
                    continue;
                }
                if let Some(current) = self.components.transforms.get(index) {
                    let sample = current.sample();
                    self.components.previous.set(index, sample);
                }
            }
        }
        self.clear_fresh();
    }

    /// Copies position and rotation of every Transform entity into the
    /// previous-state buffer.
    pub fn snapshot_transforms(&mut self) {
        let required = ComponentMask::from(ComponentKind::Transform);
        let Components {
            transforms,
            previous,
            ..
        } = &mut self.components;

        for (_, archetype) in self.archetypes.query(required) {
            for id in archetype.entities() {
                if let Some(current) = transforms.get(id.index()) {
                    previous.set(id.index(), current.sample());
                }
            }
        }
        self.clear_fresh();
    }

    /// Frees every entity and zeroes every store. O(capacity), no allocation.
    pub fn reset(&mut self) {
        let cleared = self.entities.alive_count();
        self.entities.reset();
        self.archetypes.clear();
        self.components.clear();
        self.clear_fresh();
        tracing::info!(cleared, "world reset");
    }

    /// Iterates alive entities in index order.
    pub fn iter_alive(&self) -> AliveIter<'_> {
        self.entities.iter_alive()
    }

    /// Returns the entity registry.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Returns the archetype registry.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    /// Returns every component store.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Returns every component store mutably.
    ///
    /// Raw store access skips liveness checks.
    #[inline]
    pub fn components_mut(&mut self) -> &mut Components {
        &mut self.components
    }

    /// Splits the world into the archetype registry (shared) and component
    /// stores (exclusive) so systems can iterate and write at once.
    #[inline]
    pub fn split_mut(&mut self) -> (&ArchetypeRegistry, &mut Components) {
        (&self.archetypes, &mut self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform_mask() -> ComponentMask {
        ComponentMask::of(&[ComponentKind::Transform])
    }

    #[test]
    fn test_world_creation() {
        let world = World::new(1024);
        assert_eq!(world.capacity(), 1024);
        assert_eq!(world.alive_count(), 0);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_panics() {
        let _ = World::new(1000);
    }

    #[test]
    fn test_spawn_despawn() {
        let mut world = World::new(128);

        let id1 = world.spawn(transform_mask());
        assert!(!id1.is_null());
        assert!(world.is_alive(id1));

        let id2 = world.spawn(transform_mask());
        assert_eq!(world.alive_count(), 2);

        assert!(world.despawn(id1));
        assert!(!world.is_alive(id1));
        assert!(!world.despawn(id1));
        assert_eq!(world.alive_count(), 1);

        // Spawn again - reuses the freed index
        let id3 = world.spawn(transform_mask());
        assert_eq!(id3, id1);
        assert_ne!(id3, id2);
        assert!(world.archetypes().is_consistent());
    }

    #[test]
    fn test_spawn_initializes_transform() {
        let mut world = World::new(16);
        let id = world.spawn(transform_mask());
        let transform = world.transform(id).unwrap();
        assert_eq!(transform.rotation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(transform.scale, [1.0, 1.0, 1.0]);
        assert_eq!(transform.parent(), None);
    }

    #[test]
    fn test_capacity_refusal() {
        let mut world = World::new(2);
        assert!(!world.spawn(ComponentMask::EMPTY).is_null());
        assert!(!world.spawn(ComponentMask::EMPTY).is_null());
        assert!(world.spawn(ComponentMask::EMPTY).is_null());
        assert_eq!(world.alive_count(), 2);
    }

    #[test]
    fn test_add_remove_component_moves_archetype() {
        let mut world = World::new(16);
        let id = world.spawn(transform_mask());
        let before = world.archetypes().archetype_of(id).unwrap();

        assert!(world.add_component(id, ComponentKind::CharacterStats));
        assert!(!world.add_component(id, ComponentKind::CharacterStats));
        let after = world.archetypes().archetype_of(id).unwrap();
        assert_ne!(before, after);
        assert_eq!(
            world.archetypes().get(after).unwrap().mask(),
            world.mask(id).unwrap()
        );

        let stats = world.get_mut::<CharacterStats>(id).unwrap();
        stats.adjust(Stat::Hunger, 30.0);
        assert!((world.get::<CharacterStats>(id).unwrap().hunger - 30.0).abs() < f32::EPSILON);

        assert!(world.remove_component(id, ComponentKind::CharacterStats));
        assert!(!world.remove_component(id, ComponentKind::CharacterStats));
        assert!(world.get::<CharacterStats>(id).is_none());
        assert_eq!(world.archetypes().archetype_of(id), Some(before));
        assert!(world.archetypes().is_consistent());
    }

    #[test]
    fn test_accessors_respect_mask_and_liveness() {
        let mut world = World::new(16);
        let id = world.spawn(transform_mask());
        assert!(world.get::<Tags>(id).is_none());
        assert!(world.set_position(id, [1.0, 2.0, 3.0]));
        assert_eq!(world.position(id), Some([1.0, 2.0, 3.0]));

        world.despawn(id);
        assert!(world.position(id).is_none());
        assert!(!world.set_position(id, [0.0; 3]));

        // Stale data is still in the raw store
        assert_eq!(
            world.components().transforms.get(id.index()).unwrap().position,
            [1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_kind_accessors() {
        let mut world = World::new(16);
        let id = world.spawn(ComponentMask::of(&[
            ComponentKind::CharacterStats,
            ComponentKind::InputState,
            ComponentKind::Tag,
        ]));

        assert!(world.set_tag(id, Tags::NPC | Tags::INTERACTABLE));
        assert!(world.has_tag(id, Tags::NPC));
        assert!(world.clear_tag(id, Tags::NPC));
        assert!(!world.has_tag(id, Tags::NPC));
        assert!(world.has_tag(id, Tags::INTERACTABLE));

        assert_eq!(world.adjust_stat(id, Stat::Stress, 250.0), Some(100.0));
        assert_eq!(world.adjust_stat(id, Stat::Stress, -300.0), Some(0.0));

        assert!(world.push_input(id, [0.5, -1.0]));
        assert_eq!(world.get::<InputState>(id).unwrap().latest(), Some([0.5, -1.0]));

        // Kinds the entity lacks
        assert!(world.ai(id).is_none());
        assert!(world.rigid_body(id).is_none());
        assert!(!world.set_position(id, [1.0; 3]));
    }

    #[test]
    fn test_snapshot_transforms() {
        let mut world = World::new(16);
        let id = world.spawn(transform_mask());
        world.set_position(id, [5.0, 0.0, 0.0]);
        assert_eq!(world.previous_transform(id).unwrap().position, [0.0; 3]);

        world.snapshot_transforms();
        assert_eq!(world.previous_transform(id).unwrap().position, [5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_seed_fresh_transforms_uses_current_pose() {
        let mut world = World::new(128);
        let settled = world.spawn(transform_mask());
        world.snapshot_transforms();
        assert!(!world.awaiting_snapshot(settled));

        let late = world.spawn(transform_mask());
        world.set_position(late, [4.0, 5.0, 6.0]);
        world.set_position(settled, [9.0, 0.0, 0.0]);
        assert!(world.awaiting_snapshot(late));

        world.seed_fresh_transforms();
        assert!(!world.awaiting_snapshot(late));
        assert_eq!(world.previous_transform(late).unwrap().position, [4.0, 5.0, 6.0]);
        // Already-snapshotted entities keep their previous state
        assert_eq!(world.previous_transform(settled).unwrap().position, [0.0; 3]);
    }

    #[test]
    fn test_attaching_transform_marks_fresh() {
        let mut world = World::new(16);
        let id = world.spawn(ComponentMask::EMPTY);
        assert!(!world.awaiting_snapshot(id));
        world.add_component(id, ComponentKind::Transform);
        assert!(world.awaiting_snapshot(id));
        world.reset();
        assert!(!world.awaiting_snapshot(id));
    }

    #[test]
    fn test_reset() {
        let mut world = World::new(64);
        for _ in 0..40 {
            world.spawn(transform_mask());
        }
        world.reset();
        assert_eq!(world.alive_count(), 0);
        assert_eq!(world.archetypes().entity_count(), 0);
        assert_eq!(world.iter_alive().count(), 0);
        assert_eq!(world.spawn(transform_mask()).index(), 0);
    }
}
