//! # void_core - Gameplay Server Core
//!
//! Shared primitives used by every gameplay crate:
//! - **Identifiers**: typed ids for participants, world entities and groups
//! - **Locations**: world name + coordinates, loaded straight from config
//! - **Scheduling**: the repeating-timer contract driven by the game tick,
//!   plus a manual [`TickScheduler`] implementation
//!
//! ## Timing model
//! All timers are expressed in game ticks. The host advances the scheduler
//! once per tick; callbacks run on the caller's thread, never concurrently
//! with each other for the same scheduler.

pub mod id;
pub mod location;
pub mod scheduler;

pub use id::*;
pub use location::*;
pub use scheduler::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::id::{EntityId, EntityIdGenerator, GroupId, ParticipantId};
    pub use crate::location::Location;
    pub use crate::scheduler::{Scheduler, TickScheduler, TimerCallback, TimerHandle};
}
