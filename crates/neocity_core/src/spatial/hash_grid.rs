//! # Spatial Hash Grid
//!
//! Uniform grid over the (x, z) plane for neighbor queries.
//!
//! Cell coordinates are `floor(coord / cell_size)`, shifted by `2^15` and
//! packed as two 16-bit halves of one `u32` key. Coordinates farther than
//! `32_768` cells from the origin alias onto nearer cells.

use std::collections::HashMap;

use crate::config::SpatialConfig;
use crate::ecs::EntityId;

const CELL_OFFSET: i32 = 1 << 15;

/// Maps entities to square cells on the (x, z) plane.
///
/// Members of a cell are kept in insertion order, and queries walk cells
/// row by row, so query output is reproducible for a given history.
#[derive(Debug)]
pub struct SpatialHashGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<u32, Vec<EntityId>>,
}

impl SpatialHashGrid {
    /// Creates an empty grid.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is not positive.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        assert!(cell_size > 0.0, "Cell size must be positive");
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        }
    }

    /// Creates an empty grid from configuration.
    #[must_use]
    pub fn from_config(config: &SpatialConfig) -> Self {
        Self::new(config.cell_size)
    }

    /// Edge length of one cell.
    #[inline]
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn cell_coord(&self, v: f32) -> i32 {
        (v * self.inv_cell_size).floor() as i32
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn pack(cx: i32, cz: i32) -> u32 {
        let x = (cx.wrapping_add(CELL_OFFSET) & 0xFFFF) as u32;
        let z = (cz.wrapping_add(CELL_OFFSET) & 0xFFFF) as u32;
        (x << 16) | z
    }

    /// Key of the cell containing `(x, z)`.
    #[inline]
    #[must_use]
    pub fn cell_key(&self, x: f32, z: f32) -> u32 {
        Self::pack(self.cell_coord(x), self.cell_coord(z))
    }

    /// Adds an entity at `(x, z)`. Inserting twice into one cell is a no-op.
    pub fn insert(&mut self, entity: EntityId, x: f32, z: f32) {
        let key = self.cell_key(x, z);
        let members = self.cells.entry(key).or_default();
        if !members.contains(&entity) {
            members.push(entity);
        }
    }

    /// Removes an entity last inserted at `(x, z)`.
    ///
    /// Returns `false` if it was not in that cell.
    pub fn remove(&mut self, entity: EntityId, x: f32, z: f32) -> bool {
        let key = self.cell_key(x, z);
        let Some(members) = self.cells.get_mut(&key) else {
            return false;
        };
        let Some(position) = members.iter().position(|&e| e == entity) else {
            return false;
        };
        members.remove(position);
        if members.is_empty() {
            self.cells.remove(&key);
        }
        true
    }

    /// Moves an entity. No-op if both positions share a cell.
    pub fn update(&mut self, entity: EntityId, old_x: f32, old_z: f32, new_x: f32, new_z: f32) {
        if self.cell_key(old_x, old_z) == self.cell_key(new_x, new_z) {
            return;
        }
        self.remove(entity, old_x, old_z);
        self.insert(entity, new_x, new_z);
    }

    /// Appends every entity in cells overlapping the square that bounds the
    /// circle `(cx, cz, radius)`.
    ///
    /// Conservative: callers needing exact circular membership filter by
    /// distance afterwards. `out` is not cleared.
    pub fn query_radius(&self, cx: f32, cz: f32, radius: f32, out: &mut Vec<EntityId>) {
        let radius = radius.max(0.0);
        let (min_x, max_x) = (self.cell_coord(cx - radius), self.cell_coord(cx + radius));
        let (min_z, max_z) = (self.cell_coord(cz - radius), self.cell_coord(cz + radius));

        for gx in min_x..=max_x {
            for gz in min_z..=max_z {
                if let Some(members) = self.cells.get(&Self::pack(gx, gz)) {
                    out.extend_from_slice(members);
                }
            }
        }
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Total memberships across all cells. O(cells).
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialHashGrid::new(10.0);
        grid.insert(id(1), 5.0, 5.0);
        grid.insert(id(2), 15.0, 5.0);
        grid.insert(id(3), 100.0, 100.0);

        let mut out = Vec::new();
        grid.query_radius(5.0, 5.0, 8.0, &mut out);
        out.sort();
        assert_eq!(out, vec![id(1), id(2)]);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialHashGrid::new(10.0);
        grid.insert(id(1), -0.5, -0.5);
        grid.insert(id(2), 0.5, 0.5);

        assert_ne!(grid.cell_key(-0.5, -0.5), grid.cell_key(0.5, 0.5));
        assert_eq!(grid.cell_count(), 2);

        let mut out = Vec::new();
        grid.query_radius(-5.0, -5.0, 1.0, &mut out);
        assert_eq!(out, vec![id(1)]);
    }

    #[test]
    fn test_update_same_cell_is_noop() {
        let mut grid = SpatialHashGrid::new(10.0);
        grid.insert(id(1), 1.0, 1.0);
        grid.update(id(1), 1.0, 1.0, 9.0, 9.0);
        assert_eq!(grid.cell_count(), 1);

        grid.update(id(1), 9.0, 9.0, 25.0, 9.0);
        assert_eq!(grid.cell_count(), 1);
        let mut out = Vec::new();
        grid.query_radius(25.0, 9.0, 0.0, &mut out);
        assert_eq!(out, vec![id(1)]);
    }

    #[test]
    fn test_remove_drops_empty_cells() {
        let mut grid = SpatialHashGrid::new(4.0);
        grid.insert(id(7), 1.0, 1.0);
        assert!(grid.remove(id(7), 1.0, 1.0));
        assert!(!grid.remove(id(7), 1.0, 1.0));
        assert_eq!(grid.cell_count(), 0);
        assert_eq!(grid.entity_count(), 0);
    }

    #[test]
    fn test_duplicate_insert_and_clear() {
        let mut grid = SpatialHashGrid::new(4.0);
        grid.insert(id(1), 1.0, 1.0);
        grid.insert(id(1), 2.0, 2.0);
        assert_eq!(grid.entity_count(), 1);

        grid.clear();
        assert_eq!(grid.cell_count(), 0);
    }

    #[test]
    fn test_query_appends() {
        let mut grid = SpatialHashGrid::new(4.0);
        grid.insert(id(1), 1.0, 1.0);
        let mut out = vec![id(99)];
        grid.query_radius(1.0, 1.0, 1.0, &mut out);
        assert_eq!(out, vec![id(99), id(1)]);
    }
}
