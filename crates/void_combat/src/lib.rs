//! Void Combat - Threat and Aggro System
//!
//! This crate decides which participant a hostile creature attacks.
//!
//! # Features
//!
//! - Per-creature threat tables, created lazily on the first threat event
//! - Weighted threat sources (damage, healing, blocked damage)
//! - Taunts that add a large fixed bonus
//! - Proportional threat reduction and removal
//! - Passive decay on a scheduler timer
//! - Target changes pushed to a [`TargetController`]
//!
//! # Example
//!
//! ```ignore
//! use void_combat::prelude::*;
//!
//! let threat = ThreatManager::new(ThreatConfig::default());
//! threat.add_damage_threat(mob, warrior, 120.0);
//! threat.add_heal_threat(mob, priest, 80.0);
//! threat.taunt(mob, paladin);
//!
//! assert_eq!(threat.get_top_threat(mob), Some(paladin));
//! ```

pub mod manager;
pub mod source;
pub mod table;

pub mod prelude {
    pub use crate::manager::{TargetController, ThreatConfig, ThreatManager};
    pub use crate::source::{ThreatEvent, ThreatSource};
    pub use crate::table::{ThreatEntry, ThreatTable};
}

pub use prelude::*;
