//! # Fixed-Timestep Loop
//!
//! Decouples simulation rate from frame rate:
//!
//! ```text
//! tick(raw_dt)
//!   ├─ clamp raw_dt to max_frame_delta
//!   ├─ accumulator += dt
//!   ├─ while accumulator >= step
//!   │    ├─ snapshot transforms (previous state)
//!   │    ├─ run fixed-phase systems with `step`
//!   │    └─ accumulator -= step
//!   ├─ alpha = accumulator / step
//!   ├─ interpolate previous -> current for every Transform entity
//!   ├─ run frame-phase systems with the clamped dt
//!   └─ reset frame-scoped pools
//! ```
//!
//! The clamp bounds the catch-up loop, so one `tick` never runs more than
//! `ceil(max_frame_delta / step)` fixed steps.

use crate::config::{CoreConfig, TimestepConfig};
use crate::ecs::{
    ComponentKind, ComponentMask, ComponentStore, EntityId, Transform, TransformSample, World,
};
use crate::memory::FramePools;
use crate::schedule::Scheduler;

use super::interpolation::interpolate_sample;

/// Accumulator state of a fixed-rate clock.
///
/// The accumulator is kept in `f64` so long sessions do not drift.
#[derive(Clone, Debug)]
pub struct FixedClock {
    step: f64,
    max_delta: f64,
    accumulator: f64,
    paused: bool,
    alpha: f32,
    steps_this_frame: u32,
    total_fixed_steps: u64,
    total_frames: u64,
}

impl FixedClock {
    /// Creates a clock with step `step` seconds and frame clamp `max_delta`.
    ///
    /// # Panics
    ///
    /// Panics if either value is not positive.
    #[must_use]
    pub fn new(step: f32, max_delta: f32) -> Self {
        assert!(step > 0.0, "Step must be positive");
        assert!(max_delta > 0.0, "Max frame delta must be positive");
        Self {
            step: f64::from(step),
            max_delta: f64::from(max_delta),
            accumulator: 0.0,
            paused: false,
            alpha: 0.0,
            steps_this_frame: 0,
            total_fixed_steps: 0,
            total_frames: 0,
        }
    }

    /// Creates a clock from configuration.
    #[must_use]
    pub fn from_config(config: &TimestepConfig) -> Self {
        Self::new(config.step_seconds(), config.max_frame_delta)
    }

    /// Fixed step size in seconds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn step(&self) -> f32 {
        self.step as f32
    }

    /// Clamps a raw frame delta into `[0, max_frame_delta]`.
    ///
    /// Negative and non-finite deltas count as zero.
    #[must_use]
    pub fn clamp_delta(&self, raw: f32) -> f32 {
        if !raw.is_finite() || raw <= 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let max = self.max_delta as f32;
        raw.min(max)
    }

    /// Adds a clamped delta to the accumulator and starts a new frame.
    pub fn accumulate(&mut self, dt: f32) {
        self.total_frames += 1;
        self.steps_this_frame = 0;
        if !self.paused {
            self.accumulator += f64::from(dt);
        }
    }

    /// Consumes one step if the accumulator holds one.
    pub fn consume_step(&mut self) -> bool {
        if self.paused || self.accumulator < self.step {
            return false;
        }
        self.accumulator -= self.step;
        self.steps_this_frame += 1;
        self.total_fixed_steps += 1;
        true
    }

    /// Recomputes alpha from the leftover accumulator.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update_alpha(&mut self) -> f32 {
        self.alpha = (self.accumulator / self.step).clamp(0.0, 1.0) as f32;
        self.alpha
    }

    /// Stops accumulating time.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes with an empty accumulator so no catch-up burst follows.
    pub fn resume(&mut self) {
        self.paused = false;
        self.accumulator = 0.0;
    }

    /// Checks whether the clock is paused.
    #[inline]
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> LoopMetrics {
        LoopMetrics {
            steps_this_frame: self.steps_this_frame,
            total_fixed_steps: self.total_fixed_steps,
            total_frames: self.total_frames,
            alpha: self.alpha,
        }
    }
}

/// Loop counters exposed for debugging and profiling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopMetrics {
    /// Fixed steps run by the last tick. 0 if the frame arrived before a
    /// whole step had accumulated, more than 1 during a slow frame.
    pub steps_this_frame: u32,
    /// Fixed steps since creation.
    pub total_fixed_steps: u64,
    /// Ticks since creation.
    pub total_frames: u64,
    /// Position between the last two simulated states, in `[0, 1)`.
    pub alpha: f32,
}

/// Owns the world, scheduler and frame pools and drives them per frame.
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimulationLoop::from_config(&CoreConfig::default());
/// sim.scheduler_mut().add_system(descriptor, physics)?;
///
/// // Once per rendered frame:
/// sim.tick(frame_delta_seconds);
/// let pose = sim.interpolated_transform(player);
/// ```
pub struct SimulationLoop {
    world: World,
    scheduler: Scheduler,
    clock: FixedClock,
    pools: FramePools,
    /// Render-time blend of previous and current transform, per entity.
    interpolated: ComponentStore<TransformSample>,
}

impl SimulationLoop {
    /// Creates a loop around an existing world and scheduler.
    #[must_use]
    pub fn new(world: World, scheduler: Scheduler, clock: FixedClock, pools: FramePools) -> Self {
        let interpolated = ComponentStore::new(world.capacity());
        Self {
            world,
            scheduler,
            clock,
            pools,
            interpolated,
        }
    }

    /// Creates an empty world and scheduler sized by configuration.
    #[must_use]
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            World::from_config(&config.world),
            Scheduler::new(),
            FixedClock::from_config(&config.timestep),
            FramePools::from_config(&config.pools),
        )
    }

    /// Advances the simulation by one rendered frame.
    ///
    /// Must be called exactly once per frame with the raw elapsed seconds.
    pub fn tick(&mut self, raw_dt: f32) {
        let dt = self.clock.clamp_delta(raw_dt);
        self.clock.accumulate(dt);

        if !self.clock.is_paused() {
            let step = self.clock.step();
            while self.clock.consume_step() {
                self.world.snapshot_transforms();
                self.scheduler.execute_fixed(&mut self.world, step);
            }
        }

        let alpha = self.clock.update_alpha();
        self.interpolate(alpha);

        self.scheduler.execute_frame(&mut self.world, dt);
        self.pools.reset_frame();

        tracing::trace!(
            steps = self.clock.steps_this_frame,
            alpha,
            "frame ticked"
        );
    }

    fn interpolate(&mut self, alpha: f32) {
        self.world.seed_fresh_transforms();
        let required = ComponentMask::from(ComponentKind::Transform);
        let components = self.world.components();
        for (_, archetype) in self.world.archetypes().query(required) {
            for id in archetype.entities() {
                let index = id.index();
                let (Some(previous), Some(current)) = (
                    components.previous.get(index),
                    components.transforms.get(index),
                ) else {
                    continue;
                };
                self.interpolated
                    .set(index, interpolate_sample(previous, &current.sample(), alpha));
            }
        }
    }

    /// Render-time pose of an entity as of the last tick.
    ///
    /// An entity attached since the last tick reports its current pose.
    #[must_use]
    pub fn interpolated_transform(&self, id: EntityId) -> Option<TransformSample> {
        if self.world.awaiting_snapshot(id) {
            return self.world.transform(id).map(Transform::sample);
        }
        if !self.world.has_component(id, ComponentKind::Transform) {
            return None;
        }
        self.interpolated.get(id.index()).copied()
    }

    /// Stops fixed steps; frame-phase systems keep running.
    pub fn pause(&mut self) {
        self.clock.pause();
        tracing::info!(frame = self.clock.total_frames, "simulation paused");
    }

    /// Resumes fixed steps with an empty accumulator.
    pub fn resume(&mut self) {
        self.clock.resume();
        tracing::info!(frame = self.clock.total_frames, "simulation resumed");
    }

    /// Checks whether fixed steps are paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Counters of the last tick.
    #[must_use]
    pub fn metrics(&self) -> LoopMetrics {
        self.clock.metrics()
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Frame-scoped pools, reset at the end of every tick.
    pub fn pools_mut(&mut self) -> &mut FramePools {
        &mut self.pools
    }
}
