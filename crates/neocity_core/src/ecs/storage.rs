//! # Component Storage
//!
//! Pre-allocated struct-of-arrays storage with zero runtime allocations.
//!
//! Every store is one flat `f32` buffer. Entity `e` owns the slots
//! `[e * stride, (e + 1) * stride)`, so field `f` lives at `e * stride + f`.
//! Typed access reinterprets that window in place as the component struct.

use std::marker::PhantomData;

use bytemuck::Pod;

use super::component::{
    stride_of, AiState, CharacterStats, Component, ComponentKind, InputState, Render, RigidBody,
    Tags, Transform, TransformSample,
};

/// Pre-allocated storage for one plain-data type.
///
/// This storage guarantees:
/// - Zero allocations after initialization
/// - O(1) access by entity index
/// - Contiguous per-field layout for batch copies
pub struct ComponentStore<C: Pod> {
    /// Flat buffer of `capacity * stride` slots.
    data: Box<[f32]>,
    /// Maximum entities.
    capacity: usize,
    _phantom: PhantomData<C>,
}

impl<C: Pod> ComponentStore<C> {
    /// Slots per entity.
    pub const STRIDE: usize = stride_of::<C>();

    /// Creates a zero-filled store for `capacity` entities.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or `C` is not a whole number of 4-byte words.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            Self::STRIDE > 0 && std::mem::size_of::<C>() == Self::STRIDE * 4,
            "Component must be a whole number of 4-byte words"
        );
        assert_eq!(
            std::mem::align_of::<C>(),
            std::mem::align_of::<f32>(),
            "Component must be 4-byte aligned"
        );

        Self {
            data: vec![0.0; capacity * Self::STRIDE].into_boxed_slice(),
            capacity,
            _phantom: PhantomData,
        }
    }

    /// Returns the entity capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the slots per entity.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> usize {
        Self::STRIDE
    }

    #[inline]
    fn window(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(Self::STRIDE)?;
        self.data.get(start..start + Self::STRIDE)
    }

    #[inline]
    fn window_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let start = index.checked_mul(Self::STRIDE)?;
        self.data.get_mut(start..start + Self::STRIDE)
    }

    /// Views the slot of `index` as `C`.
    ///
    /// No liveness check: stale contents of a freed slot are returned as-is.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&C> {
        self.window(index)
            .and_then(|slots| bytemuck::cast_slice::<f32, C>(slots).first())
    }

    /// Views the slot of `index` as `C`, mutably.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        self.window_mut(index)
            .and_then(|slots| bytemuck::cast_slice_mut::<f32, C>(slots).first_mut())
    }

    /// Overwrites the slot of `index`.
    ///
    /// Returns `false` if `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: C) -> bool {
        if let Some(slot) = self.get_mut(index) {
            *slot = value;
            true
        } else {
            false
        }
    }

    /// Reads field `field` of entity `index` (`buffer[index * stride + field]`).
    #[inline]
    #[must_use]
    pub fn field(&self, index: usize, field: usize) -> Option<f32> {
        if field >= Self::STRIDE {
            return None;
        }
        self.data.get(index * Self::STRIDE + field).copied()
    }

    /// Writes field `field` of entity `index`.
    #[inline]
    pub fn set_field(&mut self, index: usize, field: usize, value: f32) -> bool {
        if field >= Self::STRIDE {
            return false;
        }
        match self.data.get_mut(index * Self::STRIDE + field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns the whole flat buffer.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the whole flat buffer mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Views the whole buffer as `C` values, one per entity.
    #[inline]
    #[must_use]
    pub fn as_components(&self) -> &[C] {
        bytemuck::cast_slice(&self.data)
    }

    /// Views the whole buffer as `C` values mutably.
    #[inline]
    pub fn as_components_mut(&mut self) -> &mut [C] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Zeroes every slot. No memory is freed or allocated.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

/// Every component store, plus the previous-transform snapshot.
///
/// Systems receive this bundle mutably while the archetype registry is
/// borrowed immutably, so the two never alias.
pub struct Components {
    /// Transform store.
    pub transforms: ComponentStore<Transform>,
    /// Rigid body store.
    pub rigid_bodies: ComponentStore<RigidBody>,
    /// Render store.
    pub renders: ComponentStore<Render>,
    /// Character stats store.
    pub stats: ComponentStore<CharacterStats>,
    /// Input ring store.
    pub inputs: ComponentStore<InputState>,
    /// AI state store.
    pub ai: ComponentStore<AiState>,
    /// Tag store.
    pub tags: ComponentStore<Tags>,
    /// Position and rotation as of the last fixed-step snapshot.
    pub previous: ComponentStore<TransformSample>,
}

impl Components {
    /// Allocates every store for `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            transforms: ComponentStore::new(capacity),
            rigid_bodies: ComponentStore::new(capacity),
            renders: ComponentStore::new(capacity),
            stats: ComponentStore::new(capacity),
            inputs: ComponentStore::new(capacity),
            ai: ComponentStore::new(capacity),
            tags: ComponentStore::new(capacity),
            previous: ComponentStore::new(capacity),
        }
    }

    /// Typed view of one entity's component. No liveness check.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, index: usize) -> Option<&C> {
        C::store(self).get(index)
    }

    /// Typed mutable view of one entity's component. No liveness check.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, index: usize) -> Option<&mut C> {
        C::store_mut(self).get_mut(index)
    }

    /// Writes the attach-time value of `kind` into slot `index`.
    pub fn initialize(&mut self, kind: ComponentKind, index: usize) {
        match kind {
            ComponentKind::Transform => {
                self.transforms.set(index, Transform::initial());
                self.previous.set(index, Transform::initial().sample());
            }
            ComponentKind::RigidBody => {
                self.rigid_bodies.set(index, RigidBody::initial());
            }
            ComponentKind::Render => {
                self.renders.set(index, Render::initial());
            }
            ComponentKind::CharacterStats => {
                self.stats.set(index, CharacterStats::initial());
            }
            ComponentKind::InputState => {
                self.inputs.set(index, InputState::initial());
            }
            ComponentKind::AiState => {
                self.ai.set(index, AiState::initial());
            }
            ComponentKind::Tag => {
                self.tags.set(index, Tags::initial());
            }
        }
    }

    /// Zeroes every store.
    pub fn clear(&mut self) {
        self.transforms.clear();
        self.rigid_bodies.clear();
        self.renders.clear();
        self.stats.clear();
        self.inputs.clear();
        self.ai.clear();
        self.tags.clear();
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store: ComponentStore<Transform> = ComponentStore::new(1000);
        assert_eq!(store.capacity(), 1000);
        assert_eq!(store.stride(), 11);
        assert_eq!(store.as_slice().len(), 11_000);
    }

    #[test]
    fn test_store_get_set() {
        let mut store: ComponentStore<Transform> = ComponentStore::new(100);

        let mut transform = Transform::IDENTITY;
        transform.position = [1.0, 2.0, 3.0];
        assert!(store.set(50, transform));

        assert_eq!(*store.get(50).unwrap(), transform);
    }

    #[test]
    fn test_field_addressing() {
        let mut store: ComponentStore<Transform> = ComponentStore::new(4);
        let mut transform = Transform::IDENTITY;
        transform.position = [7.0, 8.0, 9.0];
        store.set(2, transform);

        // buffer[e * stride + f]
        assert_eq!(store.as_slice()[2 * 11], 7.0);
        assert_eq!(store.field(2, 2), Some(9.0));
        assert_eq!(store.field(2, 6), Some(1.0)); // rotation w
        assert_eq!(store.field(2, 11), None);

        assert!(store.set_field(2, 0, -1.0));
        assert_eq!(store.get(2).unwrap().position[0], -1.0);
    }

    #[test]
    fn test_store_bounds() {
        let store: ComponentStore<Tags> = ComponentStore::new(100);
        assert!(store.get(100).is_none());
        assert!(store.get(99).is_some());
    }

    #[test]
    fn test_integer_fields_survive() {
        let mut store: ComponentStore<Tags> = ComponentStore::new(2);
        store.set(1, Tags { bits: u32::MAX });
        assert_eq!(store.get(1).unwrap().bits, u32::MAX);
    }

    #[test]
    fn test_initialize_transform() {
        let mut components = Components::new(8);
        components.initialize(ComponentKind::Transform, 3);
        assert_eq!(*components.get::<Transform>(3).unwrap(), Transform::IDENTITY);
        assert_eq!(*components.previous.get(3).unwrap(), TransformSample::IDENTITY);
    }
}
