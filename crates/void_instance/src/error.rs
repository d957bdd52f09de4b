//! Instance errors
//!
//! [`InstanceError`] covers rejected player actions. The manager never
//! returns it from a command; it turns it into one chat line with
//! [`InstanceError::user_message`] and a `false` result.

use thiserror::Error;
use void_core::ParticipantId;
use void_inventory::LootError;

use crate::active::InstancePhase;

/// Definition invariant violations, found at load time
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Instance definition has an empty id")]
    EmptyId,

    #[error("Instance '{id}' has an empty {field}")]
    EmptyField { id: String, field: &'static str },

    #[error("Instance '{id}' has invalid participant bounds [{min}, {max}]")]
    InvalidBounds { id: String, min: u32, max: u32 },

    #[error("Solo instance '{id}' must have bounds [1, 1], got [{min}, {max}]")]
    SoloBounds { id: String, min: u32, max: u32 },

    #[error("Mob pack '{pack}' of instance '{id}' spawns no creatures")]
    EmptyPack { id: String, pack: String },

    #[error("Instance '{id}' declares chest '{chest}' twice")]
    DuplicateChest { id: String, chest: String },

    #[error("Instance '{id}' uses chest tag '{tag}' twice")]
    DuplicateChestTag { id: String, tag: String },
}

pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Definition file loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Duplicate instance id: {0}")]
    DuplicateInstance(String),

    #[error("Invalid loot table: {0}")]
    Loot(#[from] LootError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Rejected instance actions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("Unknown instance: {0}")]
    UnknownInstance(String),

    #[error("Instance '{0}' is not a solo instance")]
    NotSolo(String),

    #[error("Instance '{0}' is solo only")]
    SoloOnly(String),

    #[error("{0} is already in an instance")]
    AlreadyInInstance(ParticipantId),

    #[error("Group member {0} is already in an instance")]
    MemberInInstance(ParticipantId),

    #[error("{0} is not in a group")]
    NotInGroup(ParticipantId),

    #[error("{0} is not the group leader")]
    NotLeader(ParticipantId),

    #[error("Group size {size} outside [{min}, {max}]")]
    InvalidPartySize { size: usize, min: u32, max: u32 },

    #[error("{participant} reached the completion limit of '{instance}'")]
    LimitReached {
        participant: ParticipantId,
        instance: String,
    },

    #[error("{0} is not in an instance")]
    NotInInstance(ParticipantId),

    #[error("Chests cannot be opened outside the loot phase")]
    ChestUnavailable,

    #[error("Unknown chest tag: {0}")]
    UnknownChest(String),

    #[error("Chest '{0}' was already opened")]
    ChestAlreadyOpened(String),

    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidTransition { from: InstancePhase, to: InstancePhase },
}

impl InstanceError {
    /// Chat line shown to the participant whose action was rejected
    pub fn user_message(&self) -> String {
        let text = match self {
            Self::UnknownInstance(_) => "Instance not found.".to_string(),
            Self::NotSolo(_) => "This is not a solo instance.".to_string(),
            Self::SoloOnly(_) => "This instance is solo only.".to_string(),
            Self::AlreadyInInstance(_) => "You are already in an instance.".to_string(),
            Self::MemberInInstance(member) => format!("{} is already in an instance.", member),
            Self::NotInGroup(_) => "You must be in a group.".to_string(),
            Self::NotLeader(_) => "Only the group leader can start the instance.".to_string(),
            Self::InvalidPartySize { min, max, .. } => {
                format!("Invalid number of players. Required: {} - {}", min, max)
            }
            Self::LimitReached { .. } => {
                "The completion limit for this instance has been reached.".to_string()
            }
            Self::NotInInstance(_) => "You are not in an instance.".to_string(),
            Self::ChestUnavailable => "You cannot open this chest now.".to_string(),
            Self::UnknownChest(_) => "Unknown chest.".to_string(),
            Self::ChestAlreadyOpened(_) => "This chest has already been opened.".to_string(),
            Self::InvalidTransition { .. } => "Something went wrong with this instance.".to_string(),
        };
        format!("[Instance] {}", text)
    }
}

pub type InstanceResult<T> = Result<T, InstanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_prefixed() {
        let errors = [
            InstanceError::UnknownInstance("x".into()),
            InstanceError::ChestUnavailable,
            InstanceError::InvalidPartySize { size: 1, min: 2, max: 5 },
        ];
        for error in &errors {
            assert!(error.user_message().starts_with("[Instance] "));
        }
        assert_eq!(
            errors[2].user_message(),
            "[Instance] Invalid number of players. Required: 2 - 5"
        );
    }
}
