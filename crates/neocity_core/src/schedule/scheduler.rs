//! # System Scheduler
//!
//! Orders systems per phase with a two-tier heuristic:
//!
//! 1. Systems that write any component run before read-only systems
//!    (producers before consumers).
//! 2. Within a tier, lower priority runs first; registration order breaks
//!    remaining ties.
//!
//! The order is recomputed lazily, only after a system is added or removed.

use crate::ecs::{ArchetypeId, World};
use crate::error::{CoreError, CoreResult};

use super::system::{Phase, Query, System, SystemContext, SystemDescriptor};

struct RegisteredSystem {
    descriptor: SystemDescriptor,
    system: Box<dyn System>,
    sequence: u64,
}

/// Registers systems and runs them in derived order.
pub struct Scheduler {
    systems: Vec<RegisteredSystem>,
    fixed_order: Vec<usize>,
    frame_order: Vec<usize>,
    dirty: bool,
    next_sequence: u64,
    sort_count: u64,
    /// Reused query result buffer.
    matched: Vec<ArchetypeId>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            fixed_order: Vec::new(),
            frame_order: Vec::new(),
            dirty: false,
            next_sequence: 0,
            sort_count: 0,
            matched: Vec::new(),
        }
    }

    /// Registers a system.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSystem`] if the name is taken.
    pub fn add_system<S>(&mut self, descriptor: SystemDescriptor, system: S) -> CoreResult<()>
    where
        S: System + 'static,
    {
        if self.contains(&descriptor.name) {
            return Err(CoreError::DuplicateSystem(descriptor.name));
        }
        tracing::debug!(
            name = descriptor.name.as_str(),
            phase = ?descriptor.phase,
            priority = descriptor.priority,
            "system registered"
        );
        self.systems.push(RegisteredSystem {
            descriptor,
            system: Box::new(system),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        self.dirty = true;
        Ok(())
    }

    /// Unregisters a system by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SystemNotFound`] if no system has that name.
    pub fn remove_system(&mut self, name: &str) -> CoreResult<()> {
        let position = self
            .systems
            .iter()
            .position(|entry| entry.descriptor.name == name)
            .ok_or_else(|| CoreError::SystemNotFound(name.to_string()))?;
        self.systems.remove(position);
        self.dirty = true;
        Ok(())
    }

    /// Checks if a system name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.systems.iter().any(|entry| entry.descriptor.name == name)
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Checks for no registered systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// How many times the order has been recomputed.
    #[must_use]
    pub const fn sort_count(&self) -> u64 {
        self.sort_count
    }

    fn ensure_sorted(&mut self) {
        if !self.dirty {
            return;
        }
        for (phase, order) in [
            (Phase::Fixed, &mut self.fixed_order),
            (Phase::Frame, &mut self.frame_order),
        ] {
            order.clear();
            order.extend(
                self.systems
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.descriptor.phase == phase)
                    .map(|(i, _)| i),
            );
            let systems = &self.systems;
            order.sort_by_key(|&i| {
                let entry = &systems[i];
                (
                    !entry.descriptor.is_writer(),
                    entry.descriptor.priority,
                    entry.sequence,
                )
            });
        }
        self.dirty = false;
        self.sort_count += 1;
        tracing::debug!(
            fixed = self.fixed_order.len(),
            frame = self.frame_order.len(),
            "system order recomputed"
        );
    }

    /// Names of the systems of `phase` in execution order.
    pub fn ordered_names(&mut self, phase: Phase) -> Vec<&str> {
        self.ensure_sorted();
        let order = match phase {
            Phase::Fixed => &self.fixed_order,
            Phase::Frame => &self.frame_order,
        };
        order
            .iter()
            .map(|&i| self.systems[i].descriptor.name.as_str())
            .collect()
    }

    /// Runs every fixed-phase system once with step size `dt`.
    pub fn execute_fixed(&mut self, world: &mut World, dt: f32) {
        self.execute(Phase::Fixed, world, dt);
    }

    /// Runs every frame-phase system once with frame delta `dt`.
    pub fn execute_frame(&mut self, world: &mut World, dt: f32) {
        self.execute(Phase::Frame, world, dt);
    }

    fn execute(&mut self, phase: Phase, world: &mut World, dt: f32) {
        self.ensure_sorted();
        let Self {
            systems,
            fixed_order,
            frame_order,
            matched,
            ..
        } = self;
        let order = match phase {
            Phase::Fixed => fixed_order,
            Phase::Frame => frame_order,
        };

        for &index in order.iter() {
            let entry = &mut systems[index];
            let (archetypes, components) = world.split_mut();
            archetypes.query_into(entry.descriptor.query, matched);
            entry.system.run(SystemContext {
                query: Query::new(archetypes, matched),
                components,
                dt,
            });
        }
    }
}
