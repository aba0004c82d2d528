//! # Scheduling
//!
//! Systems declare their component access and phase; the scheduler derives
//! an execution order and hands each system the archetypes it queries.

mod scheduler;
mod system;

pub use scheduler::Scheduler;
pub use system::{Phase, Query, System, SystemContext, SystemDescriptor};
