//! Void Instance - Dungeon and Raid Runs
//!
//! This crate turns static instance definitions into live, time-bounded
//! encounters for one solo participant or one group.
//!
//! # Features
//!
//! - TOML instance definitions validated at load time
//! - Solo, group and raid runs with party-size bounds
//! - Start countdown, loot-phase countdown with warnings
//! - Mob packs, an optional boss and tagged reward chests
//! - O(1) entity -> run lookup for deaths
//! - Early exit and disconnect handling with automatic teardown
//! - Completion counting with optional per-instance limits
//!
//! # Example
//!
//! ```ignore
//! use void_instance::prelude::*;
//!
//! let manager = InstanceManager::builder(services, scheduler.clone())
//!     .with_threat_manager(threat.clone())
//!     .build();
//! manager.load_path("instances.toml")?;
//!
//! manager.start_group_or_raid_instance(leader, "crypt");
//!
//! // Host event hooks
//! manager.on_mob_death(entity);
//! manager.on_chest_interact(player, "crypt_chest_main");
//! manager.on_participant_disconnect(player);
//! ```

pub mod active;
pub mod config;
pub mod definition;
pub mod error;
pub mod loader;
pub mod manager;

pub mod prelude {
    pub use crate::active::{
        ActiveInstance, DeathKind, InstancePhase, InstanceStatus, RunKey, RunOwner,
    };
    pub use crate::config::InstanceConfig;
    pub use crate::definition::{
        BossDefinition, ChestDefinition, InstanceDefinition, InstanceType, MobPack, Position,
    };
    pub use crate::error::{
        DefinitionError, DefinitionResult, InstanceError, InstanceResult, LoadError, LoadResult,
    };
    pub use crate::loader::{InstanceCatalog, InstanceFile};
    pub use crate::manager::{InstanceManager, InstanceManagerBuilder, InstanceServices};
}

pub use prelude::*;
