//! Run state for one live instance

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use void_core::{EntityId, GroupId, ParticipantId, TimerHandle};

use crate::definition::InstanceDefinition;
use crate::error::{InstanceError, InstanceResult};

/// Lifecycle phase of a run
///
/// Phases only move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstancePhase {
    /// Participants are inside, countdown ticking
    Forming,
    /// Creatures are live
    Active,
    /// Every creature is dead, chests may be opened
    LootPhase,
    /// Torn down
    Completed,
}

impl InstancePhase {
    /// The only phase this one may advance to
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Forming => Some(Self::Active),
            Self::Active => Some(Self::LootPhase),
            Self::LootPhase => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

impl fmt::Display for InstancePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "forming"),
            Self::Active => write!(f, "active"),
            Self::LootPhase => write!(f, "loot phase"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Who a run was started for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOwner {
    Solo(ParticipantId),
    Group(GroupId),
}

impl fmt::Display for RunOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solo(participant) => write!(f, "{}", participant),
            Self::Group(group) => write!(f, "{}", group),
        }
    }
}

/// Registry key of a run: `<instance>:<owner>/run#<n>`
///
/// The run number is unique per manager, so two runs of the same instance
/// by the same owner never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    run: u64,
    label: String,
}

impl RunKey {
    pub fn new(instance_id: &str, owner: RunOwner, run: u64) -> Self {
        Self {
            run,
            label: format!("{}:{}/run#{}", instance_id, owner, run),
        }
    }

    /// Sequence number of the run
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// What a death meant for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathKind {
    Mob,
    Boss,
}

/// Mutable state of one run
///
/// Owned by the instance manager behind a per-run mutex.
#[derive(Debug)]
pub struct ActiveInstance {
    key: RunKey,
    definition: Arc<InstanceDefinition>,
    phase: InstancePhase,
    /// Set once teardown has started; timer callbacks and late events
    /// become no-ops
    closed: bool,
    /// Participant who started the run
    initiator: ParticipantId,
    participants: Vec<ParticipantId>,
    mobs: HashSet<EntityId>,
    boss: Option<EntityId>,
    /// chest id -> opened
    chests: HashMap<String, bool>,
    chest_entities: Vec<EntityId>,
    countdown_remaining: u32,
    loot_remaining: u32,
    start_timer: Option<TimerHandle>,
    loot_timer: Option<TimerHandle>,
}

impl ActiveInstance {
    pub fn new(
        key: RunKey,
        definition: Arc<InstanceDefinition>,
        initiator: ParticipantId,
        participants: Vec<ParticipantId>,
    ) -> Self {
        let chests = definition
            .chests
            .iter()
            .map(|chest| (chest.id.clone(), false))
            .collect();
        Self {
            key,
            phase: InstancePhase::Forming,
            closed: false,
            initiator,
            participants,
            mobs: HashSet::new(),
            boss: None,
            chests,
            chest_entities: Vec::new(),
            countdown_remaining: definition.countdown_seconds,
            loot_remaining: definition.loot_phase_seconds,
            start_timer: None,
            loot_timer: None,
            definition,
        }
    }

    pub fn key(&self) -> &RunKey {
        &self.key
    }

    pub fn definition(&self) -> &Arc<InstanceDefinition> {
        &self.definition
    }

    pub fn phase(&self) -> InstancePhase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase >= InstancePhase::Active
    }

    pub fn is_loot_phase(&self) -> bool {
        self.phase == InstancePhase::LootPhase
    }

    pub fn is_completed(&self) -> bool {
        self.phase == InstancePhase::Completed
    }

    /// Move to the next phase
    pub fn advance_to(&mut self, to: InstancePhase) -> InstanceResult<()> {
        if self.phase.next() != Some(to) {
            return Err(InstanceError::InvalidTransition { from: self.phase, to });
        }
        log::debug!("Run {} {} -> {}", self.key, self.phase, to);
        self.phase = to;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the run as torn down
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn initiator(&self) -> ParticipantId {
        self.initiator
    }

    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    pub fn has_participant(&self, participant: ParticipantId) -> bool {
        self.participants.contains(&participant)
    }

    pub fn remove_participant(&mut self, participant: ParticipantId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| *p != participant);
        self.participants.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn add_mob(&mut self, entity: EntityId) {
        self.mobs.insert(entity);
    }

    pub fn set_boss(&mut self, entity: EntityId) {
        self.boss = Some(entity);
    }

    pub fn add_chest_entity(&mut self, entity: EntityId) {
        self.chest_entities.push(entity);
    }

    pub fn mob_count(&self) -> usize {
        self.mobs.len()
    }

    pub fn boss(&self) -> Option<EntityId> {
        self.boss
    }

    /// Live mobs and boss
    pub fn creatures(&self) -> Vec<EntityId> {
        let mut creatures: Vec<EntityId> = self.mobs.iter().copied().collect();
        creatures.extend(self.boss);
        creatures.sort();
        creatures
    }

    /// Every entity this run still owns in the world
    pub fn live_entities(&self) -> Vec<EntityId> {
        let mut entities = self.creatures();
        entities.extend(self.chest_entities.iter().copied());
        entities
    }

    /// Forget a dead creature
    ///
    /// Returns `None` if the entity is not a live creature of this run.
    pub fn record_death(&mut self, entity: EntityId) -> Option<DeathKind> {
        if self.mobs.remove(&entity) {
            return Some(DeathKind::Mob);
        }
        if self.boss == Some(entity) {
            self.boss = None;
            return Some(DeathKind::Boss);
        }
        None
    }

    /// Every creature is dead and the loot phase has not begun
    pub fn is_cleared(&self) -> bool {
        self.phase == InstancePhase::Active && self.mobs.is_empty() && self.boss.is_none()
    }

    pub fn is_chest_opened(&self, chest_id: &str) -> bool {
        self.chests.get(chest_id).copied().unwrap_or(false)
    }

    /// Mark a chest opened
    ///
    /// Returns false if the chest is unknown or already open.
    pub fn open_chest(&mut self, chest_id: &str) -> bool {
        match self.chests.get_mut(chest_id) {
            Some(opened) if !*opened => {
                *opened = true;
                true
            }
            _ => false,
        }
    }

    pub fn opened_chest_count(&self) -> usize {
        self.chests.values().filter(|opened| **opened).count()
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    /// Count the start countdown down by one second
    pub fn tick_countdown(&mut self) -> u32 {
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        self.countdown_remaining
    }

    pub fn loot_remaining(&self) -> u32 {
        self.loot_remaining
    }

    /// Count the loot phase down by one second
    pub fn tick_loot(&mut self) -> u32 {
        self.loot_remaining = self.loot_remaining.saturating_sub(1);
        self.loot_remaining
    }

    pub fn set_start_timer(&mut self, handle: TimerHandle) {
        self.start_timer = Some(handle);
    }

    pub fn take_start_timer(&mut self) -> Option<TimerHandle> {
        self.start_timer.take()
    }

    pub fn set_loot_timer(&mut self, handle: TimerHandle) {
        self.loot_timer = Some(handle);
    }

    pub fn take_loot_timer(&mut self) -> Option<TimerHandle> {
        self.loot_timer.take()
    }

    /// Take both outstanding timers so each is cancelled once
    pub fn take_timers(&mut self) -> Vec<TimerHandle> {
        self.start_timer.take().into_iter().chain(self.loot_timer.take()).collect()
    }
}

/// Read-only view of a run
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceStatus {
    pub key: RunKey,
    pub instance_id: String,
    pub name: String,
    pub phase: InstancePhase,
    pub participants: Vec<ParticipantId>,
    pub mobs_remaining: usize,
    pub boss_alive: bool,
    pub chests_opened: usize,
    pub countdown_remaining: u32,
    pub loot_remaining: u32,
}

impl From<&ActiveInstance> for InstanceStatus {
    fn from(run: &ActiveInstance) -> Self {
        Self {
            key: run.key.clone(),
            instance_id: run.definition.id.clone(),
            name: run.definition.name.clone(),
            phase: run.phase,
            participants: run.participants.clone(),
            mobs_remaining: run.mobs.len(),
            boss_alive: run.boss.is_some(),
            chests_opened: run.opened_chest_count(),
            countdown_remaining: run.countdown_remaining,
            loot_remaining: run.loot_remaining,
        }
    }
}
