//! Inventory collaborator contract

use void_core::ParticipantId;
use void_services::ServiceResult;

/// Host inventory that receives rolled loot
pub trait InventoryService: Send + Sync {
    /// Give `quantity` of `item` to a participant
    fn grant_item(&self, participant: ParticipantId, item: &str, quantity: u32) -> ServiceResult<()>;
}
