//! # System Declarations
//!
//! A system is an update function plus the metadata the scheduler orders it
//! by: what it reads, what it writes, which archetypes it iterates, when it
//! runs and a priority hint.

use crate::ecs::{Archetype, ArchetypeId, ArchetypeRegistry, ComponentMask, Components, EntityId};

/// When a system runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Once per fixed simulation step, with the constant step size.
    Fixed,
    /// Once per rendered frame, with the clamped frame delta.
    Frame,
}

/// Static description of a system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDescriptor {
    /// Unique name.
    pub name: String,
    /// Component kinds read.
    pub reads: ComponentMask,
    /// Component kinds written.
    pub writes: ComponentMask,
    /// Archetypes iterated must contain all of these.
    pub query: ComponentMask,
    /// Execution phase.
    pub phase: Phase,
    /// Lower runs earlier within the same tier.
    pub priority: i32,
}

impl SystemDescriptor {
    /// Creates a descriptor with empty sets and priority 0.
    #[must_use]
    pub fn new(name: impl Into<String>, phase: Phase) -> Self {
        Self {
            name: name.into(),
            reads: ComponentMask::EMPTY,
            writes: ComponentMask::EMPTY,
            query: ComponentMask::EMPTY,
            phase,
            priority: 0,
        }
    }

    /// Sets the read set.
    #[must_use]
    pub fn reads(mut self, mask: impl Into<ComponentMask>) -> Self {
        self.reads = mask.into();
        self
    }

    /// Sets the write set.
    #[must_use]
    pub fn writes(mut self, mask: impl Into<ComponentMask>) -> Self {
        self.writes = mask.into();
        self
    }

    /// Sets the query mask.
    #[must_use]
    pub fn query(mut self, mask: impl Into<ComponentMask>) -> Self {
        self.query = mask.into();
        self
    }

    /// Sets the priority hint.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Checks whether this system writes any component.
    #[inline]
    #[must_use]
    pub const fn is_writer(&self) -> bool {
        !self.writes.is_empty()
    }
}

/// The archetypes a system matched this run.
#[derive(Clone, Copy)]
pub struct Query<'w> {
    registry: &'w ArchetypeRegistry,
    matched: &'w [ArchetypeId],
}

impl<'w> Query<'w> {
    /// Wraps a registry and the handles that matched.
    #[must_use]
    pub fn new(registry: &'w ArchetypeRegistry, matched: &'w [ArchetypeId]) -> Self {
        Self { registry, matched }
    }

    /// Matching archetypes.
    pub fn archetypes(self) -> impl Iterator<Item = &'w Archetype> {
        let registry = self.registry;
        self.matched.iter().filter_map(move |id| registry.get(*id))
    }

    /// Every entity of every matching archetype.
    pub fn entities(self) -> impl Iterator<Item = EntityId> + 'w {
        self.archetypes()
            .flat_map(|archetype| archetype.entities().iter().copied())
    }

    /// Number of matching archetypes.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.matched.len()
    }

    /// Number of matching entities.
    #[must_use]
    pub fn entity_count(self) -> usize {
        self.archetypes().map(Archetype::len).sum()
    }
}

/// Everything an update function receives.
pub struct SystemContext<'w> {
    /// Archetypes matching the system's query mask.
    pub query: Query<'w>,
    /// Component stores.
    pub components: &'w mut Components,
    /// Step size (fixed phase) or clamped frame delta (frame phase), seconds.
    pub dt: f32,
}

/// An update function.
///
/// Implemented for every `FnMut(SystemContext<'_>)`, so plain closures can be
/// registered directly.
pub trait System {
    /// Runs one update.
    fn run(&mut self, ctx: SystemContext<'_>);
}

impl<F> System for F
where
    F: FnMut(SystemContext<'_>),
{
    fn run(&mut self, ctx: SystemContext<'_>) {
        self(ctx);
    }
}
