//! Threat sources and events

use serde::{Deserialize, Serialize};
use void_core::{EntityId, ParticipantId};

/// What generated a piece of threat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatSource {
    /// Damage dealt to the creature
    Damage,
    /// Healing done while the creature is engaged
    Heal,
    /// Damage from the creature that was blocked
    Block,
}

impl Default for ThreatSource {
    fn default() -> Self {
        Self::Damage
    }
}

/// A single threat-generating event from the combat layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatEvent {
    /// Creature whose table receives the threat
    pub creature: EntityId,
    /// Participant generating the threat
    pub participant: ParticipantId,
    /// Kind of action
    pub source: ThreatSource,
    /// Raw amount (damage, healing or blocked damage)
    pub amount: f64,
}

impl ThreatEvent {
    /// Damage dealt by `participant` to `creature`
    pub fn damage(creature: EntityId, participant: ParticipantId, amount: f64) -> Self {
        Self {
            creature,
            participant,
            source: ThreatSource::Damage,
            amount,
        }
    }

    /// Healing done by `participant` while `creature` is engaged
    pub fn heal(creature: EntityId, participant: ParticipantId, amount: f64) -> Self {
        Self {
            source: ThreatSource::Heal,
            ..Self::damage(creature, participant, amount)
        }
    }

    /// Damage from `creature` blocked by `participant`
    pub fn block(creature: EntityId, participant: ParticipantId, amount: f64) -> Self {
        Self {
            source: ThreatSource::Block,
            ..Self::damage(creature, participant, amount)
        }
    }
}
