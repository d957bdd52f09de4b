//! Collaborator errors

use thiserror::Error;
use void_core::{GroupId, ParticipantId};

/// Errors reported by host services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unknown world: {0}")]
    UnknownWorld(String),

    #[error("Participant not online: {0}")]
    Offline(ParticipantId),

    #[error("Spawn of '{kind}' failed: {reason}")]
    SpawnFailed { kind: String, reason: String },

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("{participant} is already in {group}")]
    AlreadyGrouped {
        participant: ParticipantId,
        group: GroupId,
    },

    #[error("{participant} is not in {group}")]
    NotAMember {
        participant: ParticipantId,
        group: GroupId,
    },

    #[error("Grant of {quantity} x {item} failed: {reason}")]
    GrantFailed {
        item: String,
        quantity: u32,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
