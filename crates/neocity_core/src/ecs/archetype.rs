//! # Archetype Registry
//!
//! Entities sharing an identical component mask are filed together in one
//! dense list, so a query walks only the entities that match.
//!
//! ```text
//! mask T|R      : [e4, e0, e9]        rows[e4]=0 rows[e0]=1 rows[e9]=2
//! mask T|R|AI   : [e2, e7]            rows[e2]=0 rows[e7]=1
//! ```
//!
//! Removal swaps the last entity into the hole and patches its row, so
//! every insert and remove is O(1).

use std::collections::HashMap;

use super::component::ComponentMask;
use super::entity::EntityId;

/// Handle to one archetype in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArchetypeId(u16);

impl ArchetypeId {
    /// Marks "filed under no archetype".
    const NONE: Self = Self(u16::MAX);

    /// Position of this archetype in registry order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dense group of entities sharing one component mask.
#[derive(Debug)]
pub struct Archetype {
    mask: ComponentMask,
    entities: Vec<EntityId>,
}

impl Archetype {
    fn new(mask: ComponentMask) -> Self {
        Self {
            mask,
            entities: Vec::new(),
        }
    }

    /// The component mask of every entity in this archetype.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// Dense list of member entities.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Number of member entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks for no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Registry of every archetype plus the entity → (archetype, row) lookup.
///
/// Each entity lives in at most one archetype, so a single row table serves
/// as the reverse lookup of every archetype.
pub struct ArchetypeRegistry {
    archetypes: Vec<Archetype>,
    by_mask: HashMap<ComponentMask, ArchetypeId>,
    /// Archetype each entity is filed under.
    location: Box<[ArchetypeId]>,
    /// Position of each entity inside its archetype's dense list.
    rows: Box<[u32]>,
}

impl ArchetypeRegistry {
    /// Creates an empty registry for `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            archetypes: Vec::new(),
            by_mask: HashMap::new(),
            location: vec![ArchetypeId::NONE; capacity].into_boxed_slice(),
            rows: vec![0; capacity].into_boxed_slice(),
        }
    }

    /// Number of archetypes ever created.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Checks for no archetypes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Returns an archetype by handle.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Returns the archetype registered for an exact mask.
    #[must_use]
    pub fn find(&self, mask: ComponentMask) -> Option<ArchetypeId> {
        self.by_mask.get(&mask).copied()
    }

    /// Iterates every archetype with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.archetypes
            .iter()
            .enumerate()
            .map(|(i, archetype)| (Self::id_at(i), archetype))
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn id_at(index: usize) -> ArchetypeId {
        ArchetypeId(index as u16)
    }

    fn get_or_create(&mut self, mask: ComponentMask) -> ArchetypeId {
        if let Some(id) = self.by_mask.get(&mask) {
            return *id;
        }
        let id = Self::id_at(self.archetypes.len());
        self.archetypes.push(Archetype::new(mask));
        self.by_mask.insert(mask, id);
        tracing::debug!(mask = mask.bits(), archetype = id.index(), "archetype created");
        id
    }

    /// Files an entity under the archetype for `mask`.
    ///
    /// The entity must not currently be filed anywhere.
    pub fn insert(&mut self, entity: EntityId, mask: ComponentMask) -> ArchetypeId {
        debug_assert_eq!(
            self.location[entity.index()],
            ArchetypeId::NONE,
            "entity already filed"
        );
        let id = self.get_or_create(mask);
        let list = &mut self.archetypes[id.index()].entities;
        #[allow(clippy::cast_possible_truncation)]
        let row = list.len() as u32;
        list.push(entity);
        self.location[entity.index()] = id;
        self.rows[entity.index()] = row;
        id
    }

    /// Removes an entity from its archetype with swap-remove.
    ///
    /// Returns the mask it was filed under, or `None` if it was not filed.
    pub fn remove(&mut self, entity: EntityId) -> Option<ComponentMask> {
        let slot = entity.index();
        let id = *self.location.get(slot)?;
        if id == ArchetypeId::NONE {
            return None;
        }
        let row = self.rows[slot] as usize;
        let archetype = &mut self.archetypes[id.index()];
        archetype.entities.swap_remove(row);
        if let Some(moved) = archetype.entities.get(row) {
            #[allow(clippy::cast_possible_truncation)]
            {
                self.rows[moved.index()] = row as u32;
            }
        }
        self.location[slot] = ArchetypeId::NONE;
        Some(archetype.mask)
    }

    /// Moves an entity to the archetype for `mask`.
    pub fn relocate(&mut self, entity: EntityId, mask: ComponentMask) -> ArchetypeId {
        self.remove(entity);
        self.insert(entity, mask)
    }

    /// Archetype an entity is filed under.
    #[must_use]
    pub fn archetype_of(&self, entity: EntityId) -> Option<ArchetypeId> {
        self.location
            .get(entity.index())
            .copied()
            .filter(|id| *id != ArchetypeId::NONE)
    }

    /// Row of an entity inside its archetype.
    #[must_use]
    pub fn row_of(&self, entity: EntityId) -> Option<usize> {
        self.archetype_of(entity)
            .map(|_| self.rows[entity.index()] as usize)
    }

    /// Iterates archetypes whose mask contains every bit of `required`.
    pub fn query(
        &self,
        required: ComponentMask,
    ) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.iter()
            .filter(move |(_, archetype)| archetype.mask.contains_all(required))
    }

    /// Collects matching handles into `out` (cleared first).
    ///
    /// Reusing `out` across calls keeps queries allocation-free.
    pub fn query_into(&self, required: ComponentMask, out: &mut Vec<ArchetypeId>) {
        out.clear();
        out.extend(self.query(required).map(|(id, _)| id));
    }

    /// Total entities filed across all archetypes.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.archetypes.iter().map(Archetype::len).sum()
    }

    /// Empties every archetype, keeping the archetypes and their buffers.
    pub fn clear(&mut self) {
        for archetype in &mut self.archetypes {
            archetype.entities.clear();
        }
        self.location.fill(ArchetypeId::NONE);
        self.rows.fill(0);
    }

    /// Checks the row/list agreement of every archetype.
    ///
    /// For every archetype `a` and row `i`: `rows[a[i]] == i` and
    /// `location[a[i]] == a`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.iter().all(|(id, archetype)| {
            archetype.entities.iter().enumerate().all(|(row, entity)| {
                self.location[entity.index()] == id && self.rows[entity.index()] as usize == row
            })
        })
    }
}
