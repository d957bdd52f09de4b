//! Quest collaborator contract

use crate::error::ServiceResult;
use void_core::ParticipantId;

/// Host quest tracker
pub trait QuestService: Send + Sync {
    /// Start a quest for a participant
    fn start_quest(&self, participant: ParticipantId, quest_id: &str) -> ServiceResult<()>;

    /// Complete the current stage of a quest
    ///
    /// Must be a no-op when the participant has no such active quest.
    fn complete_stage(&self, participant: ParticipantId, quest_id: &str) -> ServiceResult<()>;
}
