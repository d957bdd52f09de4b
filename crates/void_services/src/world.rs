//! World collaborator contract

use crate::error::ServiceResult;
use void_core::{EntityId, Location, ParticipantId};

/// Host world: entity spawning and participant movement
pub trait WorldService: Send + Sync {
    /// Spawn an entity of `kind` at `location`
    ///
    /// `tag` marks interactable entities (chests); the host reports it back
    /// when a participant interacts with the entity.
    fn spawn_entity(&self, kind: &str, location: &Location, tag: Option<&str>) -> ServiceResult<EntityId>;

    /// Remove an entity that is still alive
    fn remove_entity(&self, entity: EntityId) -> ServiceResult<()>;

    /// Move a participant
    fn teleport(&self, participant: ParticipantId, location: &Location) -> ServiceResult<()>;
}
