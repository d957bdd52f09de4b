//! Group collaborator contract and an in-process party registry

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use void_core::{GroupId, ParticipantId};

use crate::error::{ServiceError, ServiceResult};

/// Host party system
pub trait GroupService: Send + Sync {
    /// Group the participant belongs to
    fn group_of(&self, participant: ParticipantId) -> Option<GroupId>;

    fn is_leader(&self, group: GroupId, participant: ParticipantId) -> bool;

    /// Members in join order, leader included
    fn members(&self, group: GroupId) -> Vec<ParticipantId>;
}

#[derive(Debug, Clone)]
struct Party {
    leader: ParticipantId,
    members: Vec<ParticipantId>,
}

/// In-memory parties
///
/// When the leader leaves, the longest-standing remaining member is
/// promoted. A party with no members is disbanded.
pub struct PartyRegistry {
    parties: RwLock<HashMap<GroupId, Party>>,
    membership: RwLock<HashMap<ParticipantId, GroupId>>,
    next_id: AtomicU64,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self {
            parties: RwLock::new(HashMap::new()),
            membership: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a party led by `leader`
    pub fn create(&self, leader: ParticipantId) -> ServiceResult<GroupId> {
        let mut membership = self.membership.write();
        if let Some(&group) = membership.get(&leader) {
            return Err(ServiceError::AlreadyGrouped { participant: leader, group });
        }

        let group = GroupId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.parties.write().insert(
            group,
            Party {
                leader,
                members: vec![leader],
            },
        );
        membership.insert(leader, group);
        log::info!("{} created {}", leader, group);
        Ok(group)
    }

    /// Add a participant to a party
    pub fn join(&self, group: GroupId, participant: ParticipantId) -> ServiceResult<()> {
        let mut membership = self.membership.write();
        if let Some(&current) = membership.get(&participant) {
            return Err(ServiceError::AlreadyGrouped { participant, group: current });
        }

        let mut parties = self.parties.write();
        let party = parties.get_mut(&group).ok_or(ServiceError::GroupNotFound(group))?;
        party.members.push(participant);
        membership.insert(participant, group);
        Ok(())
    }

    /// Remove a participant from their party
    ///
    /// Returns the new leader if leadership moved.
    pub fn leave(&self, participant: ParticipantId) -> ServiceResult<Option<ParticipantId>> {
        let mut membership = self.membership.write();
        let group = membership
            .remove(&participant)
            .ok_or_else(|| ServiceError::Internal(format!("{} is not in a party", participant)))?;

        let mut parties = self.parties.write();
        let party = parties.get_mut(&group).ok_or(ServiceError::GroupNotFound(group))?;
        party.members.retain(|m| *m != participant);

        if party.members.is_empty() {
            parties.remove(&group);
            log::info!("{} disbanded", group);
            return Ok(None);
        }

        if party.leader == participant {
            party.leader = party.members[0];
            log::info!("{} is now leader of {}", party.leader, group);
            return Ok(Some(party.leader));
        }
        Ok(None)
    }

    /// Hand leadership to another member
    pub fn promote(&self, group: GroupId, participant: ParticipantId) -> ServiceResult<()> {
        let mut parties = self.parties.write();
        let party = parties.get_mut(&group).ok_or(ServiceError::GroupNotFound(group))?;
        if !party.members.contains(&participant) {
            return Err(ServiceError::NotAMember { participant, group });
        }
        party.leader = participant;
        Ok(())
    }

    /// Dissolve a party
    pub fn disband(&self, group: GroupId) -> ServiceResult<()> {
        let party = self
            .parties
            .write()
            .remove(&group)
            .ok_or(ServiceError::GroupNotFound(group))?;
        let mut membership = self.membership.write();
        for member in party.members {
            membership.remove(&member);
        }
        Ok(())
    }

    pub fn leader(&self, group: GroupId) -> Option<ParticipantId> {
        self.parties.read().get(&group).map(|p| p.leader)
    }

    pub fn party_count(&self) -> usize {
        self.parties.read().len()
    }
}

impl Default for PartyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupService for PartyRegistry {
    fn group_of(&self, participant: ParticipantId) -> Option<GroupId> {
        self.membership.read().get(&participant).copied()
    }

    fn is_leader(&self, group: GroupId, participant: ParticipantId) -> bool {
        self.leader(group) == Some(participant)
    }

    fn members(&self, group: GroupId) -> Vec<ParticipantId> {
        self.parties
            .read()
            .get(&group)
            .map(|p| p.members.clone())
            .unwrap_or_default()
    }
}
