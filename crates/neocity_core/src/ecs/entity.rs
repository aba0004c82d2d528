//! # Entity Management
//!
//! Entities are plain indices into the component buffers. The registry keeps
//! an alive-bitset for O(1) liveness checks and a LIFO free-list so the most
//! recently freed index is the next one handed out.

use super::component::ComponentMask;

/// Opaque entity identifier.
///
/// A newtype over the buffer index: there is no implicit conversion to or
/// from raw integers, use [`EntityId::from_raw`] and [`EntityId::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Sentinel meaning "no entity".
    pub const NULL: Self = Self(u32::MAX);

    /// Wraps a raw index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw 32-bit value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the buffer index of this entity.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Allocates and recycles entity indices.
///
/// All storage is sized at creation; `allocate`/`release` never allocate.
pub struct EntityRegistry {
    /// Alive bitset, 64 entities per word.
    alive: Box<[u64]>,
    /// Free indices. Popped from the end.
    free: Vec<u32>,
    /// Component mask recorded per entity.
    masks: Box<[ComponentMask]>,
    alive_count: usize,
    capacity: usize,
}

impl EntityRegistry {
    /// Creates a registry for `capacity` entities, all free.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity < u32::MAX as usize,
            "Capacity must be below u32::MAX"
        );

        let mut free = Vec::with_capacity(capacity);
        free.extend((0..capacity as u32).rev());

        Self {
            alive: vec![0u64; capacity.div_ceil(64)].into_boxed_slice(),
            free,
            masks: vec![ComponentMask::EMPTY; capacity].into_boxed_slice(),
            alive_count: 0,
            capacity,
        }
    }

    /// Returns the maximum number of entities.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Pops a free index and marks it alive with `mask`.
    ///
    /// Returns `None` when every index is in use.
    #[inline]
    pub fn allocate(&mut self, mask: ComponentMask) -> Option<EntityId> {
        let raw = self.free.pop()?;
        let index = raw as usize;
        self.alive[index / 64] |= 1u64 << (index % 64);
        self.masks[index] = mask;
        self.alive_count += 1;
        Some(EntityId(raw))
    }

    /// Marks an entity free and pushes its index onto the free-list.
    ///
    /// Returns `false` if the id was not alive.
    #[inline]
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let index = id.index();
        self.alive[index / 64] &= !(1u64 << (index % 64));
        self.masks[index] = ComponentMask::EMPTY;
        self.alive_count -= 1;
        self.free.push(id.0);
        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        let index = id.index();
        if id.is_null() || index >= self.capacity {
            return false;
        }
        (self.alive[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Returns the recorded component mask of an alive entity.
    #[inline]
    #[must_use]
    pub fn mask(&self, id: EntityId) -> Option<ComponentMask> {
        if self.is_alive(id) {
            Some(self.masks[id.index()])
        } else {
            None
        }
    }

    /// Records a new component mask for an alive entity.
    #[inline]
    pub(crate) fn set_mask(&mut self, id: EntityId, mask: ComponentMask) {
        debug_assert!(self.is_alive(id), "set_mask on dead entity");
        if let Some(slot) = self.masks.get_mut(id.index()) {
            *slot = mask;
        }
    }

    /// Frees every entity. O(capacity), no allocation.
    pub fn reset(&mut self) {
        self.alive.fill(0);
        self.masks.fill(ComponentMask::EMPTY);
        self.free.clear();
        self.free.extend((0..self.capacity as u32).rev());
        self.alive_count = 0;
    }

    /// Number of indices on the free-list.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Iterates alive entities in index order.
    ///
    /// Skips empty words with `trailing_zeros`, so sparse worlds are cheap.
    pub fn iter_alive(&self) -> AliveIter<'_> {
        AliveIter {
            words: &self.alive,
            word_idx: 0,
            current: self.alive.first().copied().unwrap_or(0),
        }
    }
}

/// Iterator over alive entity ids.
pub struct AliveIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for AliveIter<'_> {
    type Item = EntityId;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros();
                self.current &= self.current - 1;
                #[allow(clippy::cast_possible_truncation)]
                let raw = (self.word_idx * 64) as u32 + bit;
                return Some(EntityId(raw));
            }
            self.word_idx += 1;
            self.current = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentKind;

    #[test]
    fn test_null_sentinel() {
        assert!(EntityId::NULL.is_null());
        assert!(!EntityId::from_raw(0).is_null());
        assert_eq!(EntityId::default(), EntityId::NULL);
    }

    #[test]
    fn test_allocate_in_index_order() {
        let mut registry = EntityRegistry::new(8);
        let a = registry.allocate(ComponentMask::EMPTY).unwrap();
        let b = registry.allocate(ComponentMask::EMPTY).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.alive_count(), 2);
    }

    #[test]
    fn test_lifo_reuse() {
        let mut registry = EntityRegistry::new(8);
        let ids: Vec<_> = (0..4)
            .map(|_| registry.allocate(ComponentMask::EMPTY).unwrap())
            .collect();

        assert!(registry.release(ids[1]));
        assert!(registry.release(ids[3]));

        // Most recently freed comes back first
        assert_eq!(registry.allocate(ComponentMask::EMPTY), Some(ids[3]));
        assert_eq!(registry.allocate(ComponentMask::EMPTY), Some(ids[1]));
    }

    #[test]
    fn test_exhaustion() {
        let mut registry = EntityRegistry::new(2);
        assert!(registry.allocate(ComponentMask::EMPTY).is_some());
        assert!(registry.allocate(ComponentMask::EMPTY).is_some());
        assert!(registry.allocate(ComponentMask::EMPTY).is_none());
        assert_eq!(registry.free_count(), 0);
    }

    #[test]
    fn test_double_release() {
        let mut registry = EntityRegistry::new(4);
        let id = registry.allocate(ComponentMask::EMPTY).unwrap();
        assert!(registry.release(id));
        assert!(!registry.release(id));
        assert_eq!(registry.free_count(), 4);
    }

    #[test]
    fn test_mask_tracking() {
        let mut registry = EntityRegistry::new(4);
        let mask = ComponentMask::EMPTY.with(ComponentKind::Transform);
        let id = registry.allocate(mask).unwrap();
        assert_eq!(registry.mask(id), Some(mask));

        registry.release(id);
        assert_eq!(registry.mask(id), None);
    }

    #[test]
    fn test_iter_alive_spans_words() {
        let mut registry = EntityRegistry::new(256);
        let ids: Vec<_> = (0..200)
            .map(|_| registry.allocate(ComponentMask::EMPTY).unwrap())
            .collect();
        for id in ids.iter().filter(|id| id.index() % 3 != 0) {
            registry.release(*id);
        }

        let alive: Vec<_> = registry.iter_alive().map(EntityId::index).collect();
        let expected: Vec<_> = (0..200).filter(|i| i % 3 == 0).collect();
        assert_eq!(alive, expected);
    }

    #[test]
    fn test_reset() {
        let mut registry = EntityRegistry::new(16);
        for _ in 0..10 {
            registry.allocate(ComponentMask::EMPTY);
        }
        registry.reset();
        assert_eq!(registry.alive_count(), 0);
        assert_eq!(registry.free_count(), 16);
        assert_eq!(registry.iter_alive().count(), 0);
        assert_eq!(registry.allocate(ComponentMask::EMPTY).unwrap().index(), 0);
    }
}
