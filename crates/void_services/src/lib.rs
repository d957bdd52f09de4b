//! # Void Services
//!
//! Contracts for the host services gameplay systems call into.
//!
//! Gameplay crates never talk to the server directly. They hold
//! `Arc<dyn Trait>` handles to:
//! - [`GroupService`]: party membership and leadership
//! - [`QuestService`]: starting quests and completing stages
//! - [`WorldService`]: spawning, removing and teleporting
//! - [`HudService`] / [`WaypointService`]: fire-and-forget display calls
//! - [`Notifier`]: chat messages to a single participant
//!
//! [`PartyRegistry`] is an in-process [`GroupService`] for hosts without
//! their own party system.
//!
//! ## Usage
//!
//! ```ignore
//! let parties = Arc::new(PartyRegistry::new());
//! let group = parties.create(leader)?;
//! parties.join(group, healer)?;
//!
//! assert!(parties.is_leader(group, leader));
//! assert_eq!(parties.members(group).len(), 2);
//! ```

pub mod error;
pub mod group;
pub mod hud;
pub mod quest;
pub mod world;

pub use error::{ServiceError, ServiceResult};
pub use group::{GroupService, PartyRegistry};
pub use hud::{HudElement, HudLayer, HudService, Notifier, WaypointService};
pub use quest::QuestService;
pub use world::WorldService;
