//! Instance manager
//!
//! Owns every live run and drives it through
//! Forming -> Active -> LootPhase -> Completed.
//!
//! # Registries
//!
//! - `runs`: run key -> run state
//! - `participants`: participant -> run key
//! - `entities`: spawned entity -> run key
//!
//! # Lock order
//!
//! A run's mutex may be held while a registry lock is taken. A registry
//! lock is never held while waiting on a run mutex. Registry locks nest
//! only as `participants` then `runs`.
//!
//! HUD lines, waypoints and start quests are handed out under the run
//! mutex, the same section in which an exit removes its participant. An
//! exit therefore always clears displays after they were set, never
//! before.
//!
//! Commands never fail with an error: a rejected action sends exactly one
//! chat line to the acting participant and returns `false`.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use void_combat::ThreatManager;
use void_core::{EntityId, ParticipantId, Scheduler, TimerHandle};
use void_gamestate::{CompletionStore, InMemoryCompletionStore};
use void_inventory::{InventoryService, LootRoller};
use void_services::{
    GroupService, HudElement, HudLayer, HudService, Notifier, QuestService, WaypointService, WorldService,
};

use crate::active::{ActiveInstance, DeathKind, InstancePhase, InstanceStatus, RunKey, RunOwner};
use crate::config::InstanceConfig;
use crate::definition::InstanceDefinition;
use crate::error::{InstanceError, InstanceResult, LoadResult};
use crate::loader::{InstanceCatalog, InstanceFile};

type SharedRun = Arc<Mutex<ActiveInstance>>;

/// Host services the manager calls into
#[derive(Clone)]
pub struct InstanceServices {
    pub groups: Arc<dyn GroupService>,
    pub quests: Arc<dyn QuestService>,
    pub world: Arc<dyn WorldService>,
    pub inventory: Arc<dyn InventoryService>,
    pub hud: Arc<dyn HudService>,
    pub waypoints: Arc<dyn WaypointService>,
    pub notifier: Arc<dyn Notifier>,
}

/// Builder for [`InstanceManager`]
pub struct InstanceManagerBuilder {
    services: InstanceServices,
    scheduler: Arc<dyn Scheduler>,
    config: InstanceConfig,
    catalog: InstanceCatalog,
    loot: Arc<LootRoller>,
    threat: Arc<ThreatManager>,
    completions: Arc<dyn CompletionStore>,
}

impl InstanceManagerBuilder {
    pub fn with_config(mut self, config: InstanceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_catalog(mut self, catalog: InstanceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_loot_roller(mut self, loot: Arc<LootRoller>) -> Self {
        self.loot = loot;
        self
    }

    pub fn with_threat_manager(mut self, threat: Arc<ThreatManager>) -> Self {
        self.threat = threat;
        self
    }

    pub fn with_completion_store(mut self, completions: Arc<dyn CompletionStore>) -> Self {
        self.completions = completions;
        self
    }

    pub fn build(self) -> Arc<InstanceManager> {
        Arc::new_cyclic(|me| InstanceManager {
            config: self.config,
            services: self.services,
            scheduler: self.scheduler,
            catalog: RwLock::new(self.catalog),
            loot: self.loot,
            threat: self.threat,
            completions: self.completions,
            runs: RwLock::new(HashMap::new()),
            participants: RwLock::new(HashMap::new()),
            entities: RwLock::new(HashMap::new()),
            next_run: AtomicU64::new(1),
            me: me.clone(),
        })
    }
}

/// What is left to do once a run is closed and unregistered
struct Teardown {
    key: RunKey,
    definition: Arc<InstanceDefinition>,
    participants: Vec<ParticipantId>,
    entities: Vec<EntityId>,
    creatures: Vec<EntityId>,
    timers: Vec<TimerHandle>,
}

impl Teardown {
    /// Close the run and take what cleanup needs
    fn take(state: &mut ActiveInstance) -> Self {
        state.close();
        Self {
            key: state.key().clone(),
            definition: state.definition().clone(),
            participants: state.participants().to_vec(),
            entities: state.live_entities(),
            creatures: state.creatures(),
            timers: state.take_timers(),
        }
    }
}

/// Authoritative owner of all live runs
pub struct InstanceManager {
    config: InstanceConfig,
    services: InstanceServices,
    scheduler: Arc<dyn Scheduler>,
    catalog: RwLock<InstanceCatalog>,
    loot: Arc<LootRoller>,
    threat: Arc<ThreatManager>,
    completions: Arc<dyn CompletionStore>,
    runs: RwLock<HashMap<RunKey, SharedRun>>,
    participants: RwLock<HashMap<ParticipantId, RunKey>>,
    entities: RwLock<HashMap<EntityId, RunKey>>,
    /// Sequence for run keys
    next_run: AtomicU64,
    /// Handed to timer callbacks
    me: Weak<InstanceManager>,
}

impl InstanceManager {
    /// Start building a manager with an empty catalog and default parts
    pub fn builder(services: InstanceServices, scheduler: Arc<dyn Scheduler>) -> InstanceManagerBuilder {
        InstanceManagerBuilder {
            services,
            scheduler,
            config: InstanceConfig::default(),
            catalog: InstanceCatalog::new(),
            loot: Arc::new(LootRoller::new()),
            threat: Arc::new(ThreatManager::with_defaults()),
            completions: Arc::new(InMemoryCompletionStore::new()),
        }
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn threat_manager(&self) -> &Arc<ThreatManager> {
        &self.threat
    }

    pub fn loot_roller(&self) -> &Arc<LootRoller> {
        &self.loot
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Replace definitions and loot tables
    ///
    /// Nothing changes unless the whole file is valid. Live runs keep the
    /// definition they started with.
    pub fn load(&self, file: InstanceFile) -> LoadResult<usize> {
        let (catalog, loot) = file.into_parts()?;
        self.loot.load(loot)?;

        for definition in catalog.iter() {
            for chest in &definition.chests {
                if !self.loot.contains(&chest.loot_table) {
                    log::warn!(
                        "Chest '{}' of instance '{}' uses unknown loot table '{}'",
                        chest.id,
                        definition.id,
                        chest.loot_table
                    );
                }
            }
        }

        let count = catalog.len();
        *self.catalog.write() = catalog;
        log::info!("Loaded {} instance definition(s)", count);
        Ok(count)
    }

    pub fn load_str(&self, content: &str) -> LoadResult<usize> {
        self.load(InstanceFile::from_toml(content)?)
    }

    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> LoadResult<usize> {
        self.load(InstanceFile::from_path(path)?)
    }

    pub fn get_instance_def(&self, id: &str) -> Option<Arc<InstanceDefinition>> {
        self.catalog.read().get(id).cloned()
    }

    pub fn instance_ids(&self) -> Vec<String> {
        self.catalog.read().ids()
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    fn tell(&self, participant: ParticipantId, message: &str) {
        self.services.notifier.send_message(participant, message);
    }

    fn broadcast(&self, participants: &[ParticipantId], message: &str) {
        for participant in participants {
            self.tell(*participant, message);
        }
    }

    fn reject(&self, participant: ParticipantId, error: InstanceError) -> bool {
        log::debug!("Rejected action of {}: {}", participant, error);
        self.tell(participant, &error.user_message());
        false
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn run(&self, key: &RunKey) -> Option<SharedRun> {
        self.runs.read().get(key).cloned()
    }

    fn run_of(&self, participant: ParticipantId) -> Option<SharedRun> {
        let key = self.participants.read().get(&participant).cloned()?;
        self.run(&key)
    }

    fn run_of_entity(&self, entity: EntityId) -> Option<SharedRun> {
        let key = self.entities.read().get(&entity).cloned()?;
        self.run(&key)
    }

    pub fn is_in_instance(&self, participant: ParticipantId) -> bool {
        self.participants.read().contains_key(&participant)
    }

    /// Snapshot of the participant's run
    pub fn get_active_instance(&self, participant: ParticipantId) -> Option<InstanceStatus> {
        let run = self.run_of(participant)?;
        let state = run.lock();
        Some(InstanceStatus::from(&*state))
    }

    pub fn phase_of(&self, participant: ParticipantId) -> Option<InstancePhase> {
        self.run_of(participant).map(|run| run.lock().phase())
    }

    /// Check if an entity is the live boss of some run
    pub fn is_boss(&self, entity: EntityId) -> bool {
        self.run_of_entity(entity)
            .map(|run| run.lock().boss() == Some(entity))
            .unwrap_or(false)
    }

    pub fn active_run_count(&self) -> usize {
        self.runs.read().len()
    }

    pub fn get_threat(&self, creature: EntityId, participant: ParticipantId) -> f64 {
        self.threat.get_threat(creature, participant)
    }

    pub fn get_top_threat(&self, creature: EntityId) -> Option<ParticipantId> {
        self.threat.get_top_threat(creature)
    }

    pub fn get_completion_count(&self, participant: ParticipantId, instance_id: &str) -> u32 {
        self.completions.completion_count(participant, instance_id)
    }

    /// Check a participant against the definition's completion limit
    ///
    /// Instances without a limit never report it reached.
    pub fn has_reached_limit(&self, participant: ParticipantId, instance_id: &str) -> bool {
        self.get_instance_def(instance_id)
            .and_then(|definition| definition.completion_limit)
            .map(|limit| limit.is_reached(self.get_completion_count(participant, instance_id)))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Entry
    // ------------------------------------------------------------------

    fn check_limit(&self, participant: ParticipantId, definition: &InstanceDefinition) -> InstanceResult<()> {
        if self.has_reached_limit(participant, &definition.id) {
            return Err(InstanceError::LimitReached {
                participant,
                instance: definition.id.clone(),
            });
        }
        Ok(())
    }

    /// Work out who would enter a run started by `participant`
    fn roster(
        &self,
        participant: ParticipantId,
        definition: &InstanceDefinition,
    ) -> InstanceResult<(RunOwner, Vec<ParticipantId>)> {
        if definition.kind.is_solo() {
            self.check_limit(participant, definition)?;
            return Ok((RunOwner::Solo(participant), vec![participant]));
        }

        let groups = &self.services.groups;
        let group = groups
            .group_of(participant)
            .ok_or(InstanceError::NotInGroup(participant))?;
        if !groups.is_leader(group, participant) {
            return Err(InstanceError::NotLeader(participant));
        }

        let members = groups.members(group);
        if !definition.is_valid_party_size(members.len()) {
            return Err(InstanceError::InvalidPartySize {
                size: members.len(),
                min: definition.min_participants,
                max: definition.max_participants,
            });
        }
        for member in &members {
            self.check_limit(*member, definition)?;
        }

        Ok((RunOwner::Group(group), members))
    }

    /// Check if a start by `participant` would currently succeed
    pub fn can_enter_instance(&self, participant: ParticipantId, instance_id: &str) -> bool {
        let Some(definition) = self.get_instance_def(instance_id) else {
            return false;
        };
        match self.roster(participant, &definition) {
            Ok((_, members)) => {
                let index = self.participants.read();
                !members.iter().any(|member| index.contains_key(member))
            }
            Err(_) => false,
        }
    }

    /// Start a solo run
    pub fn start_solo_instance(&self, participant: ParticipantId, instance_id: &str) -> bool {
        match self.try_start(participant, instance_id, true) {
            Ok(()) => true,
            Err(e) => self.reject(participant, e),
        }
    }

    /// Start a group or raid run for the leader's whole group
    pub fn start_group_or_raid_instance(&self, leader: ParticipantId, instance_id: &str) -> bool {
        match self.try_start(leader, instance_id, false) {
            Ok(()) => true,
            Err(e) => self.reject(leader, e),
        }
    }

    fn try_start(&self, initiator: ParticipantId, instance_id: &str, solo: bool) -> InstanceResult<()> {
        let definition = self
            .get_instance_def(instance_id)
            .ok_or_else(|| InstanceError::UnknownInstance(instance_id.to_string()))?;

        match (solo, definition.kind.is_solo()) {
            (true, false) => return Err(InstanceError::NotSolo(definition.id.clone())),
            (false, true) => return Err(InstanceError::SoloOnly(definition.id.clone())),
            _ => {}
        }
        if self.is_in_instance(initiator) {
            return Err(InstanceError::AlreadyInInstance(initiator));
        }

        let (owner, members) = self.roster(initiator, &definition)?;
        let key = RunKey::new(&definition.id, owner, self.next_run.fetch_add(1, Ordering::Relaxed));
        let run = self.register_run(key.clone(), definition.clone(), initiator, &members)?;

        log::info!(
            "{} started {} instance '{}' as run {} ({} participant(s))",
            initiator,
            definition.kind,
            definition.name,
            key,
            members.len()
        );

        for member in &members {
            self.teleport_in(*member, &definition);
        }
        self.schedule_countdown(&key, &run);
        Ok(())
    }

    /// Register a run and index its participants in one step
    fn register_run(
        &self,
        key: RunKey,
        definition: Arc<InstanceDefinition>,
        initiator: ParticipantId,
        members: &[ParticipantId],
    ) -> InstanceResult<SharedRun> {
        let mut index = self.participants.write();
        if let Some(busy) = members.iter().copied().find(|member| index.contains_key(member)) {
            return Err(if busy == initiator {
                InstanceError::AlreadyInInstance(busy)
            } else {
                InstanceError::MemberInInstance(busy)
            });
        }

        let run = Arc::new(Mutex::new(ActiveInstance::new(
            key.clone(),
            definition,
            initiator,
            members.to_vec(),
        )));
        self.runs.write().insert(key.clone(), run.clone());
        for member in members {
            index.insert(*member, key.clone());
        }
        Ok(run)
    }

    fn teleport_in(&self, participant: ParticipantId, definition: &InstanceDefinition) {
        match self
            .services
            .world
            .teleport(participant, &definition.spawn_location())
        {
            Ok(()) => self.tell(participant, &format!("[Instance] Welcome to {}!", definition.name)),
            Err(e) => {
                log::warn!("Could not teleport {} into '{}': {}", participant, definition.id, e);
                self.tell(participant, "[Instance] Teleport failed.");
            }
        }
    }

    /// Send a participant to the exit and clear instance displays
    fn teleport_out(&self, participant: ParticipantId, definition: &InstanceDefinition) {
        if let Err(e) = self.services.world.teleport(participant, &definition.exit) {
            log::warn!("Could not teleport {} out of '{}': {}", participant, definition.id, e);
        }
        self.services.hud.clear_hud(participant, HudLayer::Instance);
        self.services.waypoints.clear_waypoint(participant);
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn repeat_every_second(&self, key: &RunKey, on_fire: fn(&InstanceManager, &RunKey)) -> TimerHandle {
        let ticks = self.config.ticks_per_second;
        let me = self.me.clone();
        let key = key.clone();
        self.scheduler.run_repeating(
            ticks,
            ticks,
            Box::new(move || {
                if let Some(manager) = me.upgrade() {
                    on_fire(&manager, &key);
                }
            }),
        )
    }

    fn cancel_timers(&self, timers: impl IntoIterator<Item = TimerHandle>) {
        for handle in timers {
            self.scheduler.cancel(handle);
        }
    }

    fn schedule_countdown(&self, key: &RunKey, run: &SharedRun) {
        let mut state = run.lock();
        if state.is_closed() {
            return;
        }
        let handle = self.repeat_every_second(key, InstanceManager::on_countdown_tick);
        state.set_start_timer(handle);
    }

    fn on_countdown_tick(&self, key: &RunKey) {
        let Some(run) = self.run(key) else {
            return;
        };

        let (participants, remaining, timer) = {
            let mut state = run.lock();
            if state.is_closed() || state.phase() != InstancePhase::Forming {
                return;
            }
            let remaining = state.tick_countdown();
            let timer = if remaining == 0 {
                if let Err(e) = state.advance_to(InstancePhase::Active) {
                    log::error!("Run {}: {}", key, e);
                    return;
                }
                state.take_start_timer()
            } else {
                None
            };
            (state.participants().to_vec(), remaining, timer)
        };

        if remaining > 0 {
            self.broadcast(&participants, &format!("[Instance] Starting in {}s...", remaining));
            return;
        }

        self.cancel_timers(timer);
        self.begin_run(key, &run);
    }

    // ------------------------------------------------------------------
    // Forming -> Active
    // ------------------------------------------------------------------

    fn begin_run(&self, key: &RunKey, run: &SharedRun) {
        let (failures, initiator, participants) = {
            let mut state = run.lock();
            if state.is_closed() {
                return;
            }
            let definition = state.definition().clone();
            for participant in state.participants() {
                self.greet_start(*participant, &definition);
            }

            let failures = self.populate(key, &mut state);
            // Nothing to kill: straight to the chests
            if state.is_cleared() && self.begin_loot_phase(key, &mut state) {
                self.announce_loot_phase(&definition, state.participants());
            }
            (failures, state.initiator(), state.participants().to_vec())
        };

        if failures > 0 && participants.contains(&initiator) {
            self.tell(initiator, "[Instance] Some entities could not be spawned.");
        }
        log::info!("Run {} started", key);
    }

    /// Start quest, HUD line and start notice for one participant
    fn greet_start(&self, participant: ParticipantId, definition: &InstanceDefinition) {
        if definition.kind.is_solo() {
            if let Some(quest) = &definition.start_quest {
                if let Err(e) = self.services.quests.start_quest(participant, quest) {
                    log::warn!("Could not start quest '{}' for {}: {}", quest, participant, e);
                }
            }
        }
        self.services.hud.set_hud(
            participant,
            HudLayer::Instance,
            HudElement::new(format!("Instance : {}", definition.name), self.config.hud_color),
        );
        self.tell(participant, "[Instance] The instance has begun!");
    }

    /// Spawn creatures and chests, returning the number of failed spawns
    ///
    /// Runs under the run lock so every entity is indexed before a death
    /// for it can be looked up.
    fn populate(&self, key: &RunKey, state: &mut ActiveInstance) -> usize {
        let definition = state.definition().clone();
        let world = &self.services.world;
        let mut spawned = Vec::new();
        let mut failures = 0;

        for pack in &definition.mobs {
            let location = definition.location_of(&pack.position);
            for _ in 0..pack.count {
                match world.spawn_entity(&pack.kind, &location, None) {
                    Ok(entity) => {
                        state.add_mob(entity);
                        spawned.push(entity);
                    }
                    Err(e) => {
                        failures += 1;
                        log::warn!("Run {}: spawn in pack '{}' failed: {}", key, pack.id, e);
                    }
                }
            }
        }

        if let Some(boss) = &definition.boss {
            match world.spawn_entity(&boss.kind, &definition.location_of(&boss.position), None) {
                Ok(entity) => {
                    state.set_boss(entity);
                    spawned.push(entity);
                    log::info!("Run {}: boss '{}' spawned as {}", key, boss.id, entity);
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("Run {}: boss '{}' spawn failed: {}", key, boss.id, e);
                }
            }
        }

        for chest in &definition.chests {
            let location = definition.location_of(&chest.position);
            match world.spawn_entity(&chest.kind, &location, Some(&chest.tag)) {
                Ok(entity) => {
                    state.add_chest_entity(entity);
                    spawned.push(entity);
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("Run {}: chest '{}' spawn failed: {}", key, chest.id, e);
                }
            }
        }

        let mut index = self.entities.write();
        for entity in spawned {
            index.insert(entity, key.clone());
        }
        failures
    }

    // ------------------------------------------------------------------
    // Active -> LootPhase
    // ------------------------------------------------------------------

    /// Record a creature death
    ///
    /// Returns false for entities no run is tracking.
    pub fn on_mob_death(&self, entity: EntityId) -> bool {
        let Some(key) = self.entities.read().get(&entity).cloned() else {
            return false;
        };
        let Some(run) = self.run(&key) else {
            return false;
        };

        {
            let mut state = run.lock();
            if state.is_closed() {
                return false;
            }
            let Some(kind) = state.record_death(entity) else {
                return false;
            };
            self.entities.write().remove(&entity);

            match kind {
                DeathKind::Boss => {
                    log::info!("Run {}: boss {} defeated", key, entity);
                    self.broadcast(state.participants(), "[Instance] The boss has been defeated!");
                }
                DeathKind::Mob => log::debug!("Run {}: mob {} killed", key, entity),
            }

            // Removal and the cleared check happen under one lock
            if state.is_cleared() && self.begin_loot_phase(&key, &mut state) {
                self.announce_loot_phase(state.definition(), state.participants());
            }
        }

        self.threat.reset_threat(entity);
        true
    }

    fn begin_loot_phase(&self, key: &RunKey, state: &mut ActiveInstance) -> bool {
        if let Err(e) = state.advance_to(InstancePhase::LootPhase) {
            log::error!("Run {}: {}", key, e);
            return false;
        }
        let handle = self.repeat_every_second(key, InstanceManager::on_loot_tick);
        state.set_loot_timer(handle);
        log::info!("Run {} entered the loot phase ({}s)", key, state.loot_remaining());
        true
    }

    fn announce_loot_phase(&self, definition: &InstanceDefinition, participants: &[ParticipantId]) {
        self.broadcast(participants, "[Instance] All monsters are defeated!");
        self.broadcast(
            participants,
            &format!(
                "[Instance] You have {}s to loot the chests.",
                definition.loot_phase_seconds
            ),
        );

        if let Some(chest) = definition.chests.first() {
            let location = definition.location_of(&chest.position);
            for participant in participants {
                self.services.waypoints.set_waypoint(*participant, "Chest", &location);
            }
        }
    }

    fn on_loot_tick(&self, key: &RunKey) {
        let Some(run) = self.run(key) else {
            return;
        };

        let (remaining, participants) = {
            let mut state = run.lock();
            if state.is_closed() || !state.is_loot_phase() {
                return;
            }
            (state.tick_loot(), state.participants().to_vec())
        };

        if remaining == 0 {
            self.complete_run(key);
        } else if self.config.is_loot_warning(remaining) {
            self.broadcast(
                &participants,
                &format!("[Instance] Teleporting out in {}s...", remaining),
            );
        }
    }

    // ------------------------------------------------------------------
    // Chests
    // ------------------------------------------------------------------

    /// Open a chest by its interaction tag
    pub fn on_chest_interact(&self, participant: ParticipantId, tag: &str) -> bool {
        match self.try_open_chest(participant, tag) {
            Ok(loot_table) => {
                self.grant_loot(participant, &loot_table);
                true
            }
            Err(e) => self.reject(participant, e),
        }
    }

    fn try_open_chest(&self, participant: ParticipantId, tag: &str) -> InstanceResult<String> {
        let run = self.run_of(participant).ok_or(InstanceError::ChestUnavailable)?;
        let mut state = run.lock();
        if state.is_closed() || !state.is_loot_phase() {
            return Err(InstanceError::ChestUnavailable);
        }

        let definition = state.definition().clone();
        let chest = definition
            .chest_by_tag(tag)
            .ok_or_else(|| InstanceError::UnknownChest(tag.to_string()))?;
        if !state.open_chest(&chest.id) {
            return Err(InstanceError::ChestAlreadyOpened(chest.id.clone()));
        }

        log::info!("{} opened chest '{}' in run {}", participant, chest.id, state.key());
        Ok(chest.loot_table.clone())
    }

    fn grant_loot(&self, participant: ParticipantId, loot_table: &str) {
        if !self.loot.contains(loot_table) {
            log::warn!("Chest opened by {} has unknown loot table '{}'", participant, loot_table);
            self.tell(participant, "[Instance] No loot configured for this chest.");
            return;
        }

        let mut granted = 0;
        for item in self.loot.roll(loot_table) {
            match self
                .services
                .inventory
                .grant_item(participant, &item.item, item.quantity)
            {
                Ok(()) => {
                    granted += 1;
                    self.tell(participant, &format!("+ {} x {}", item.quantity, item.item));
                }
                Err(e) => log::warn!("Could not grant {} to {}: {}", item, participant, e),
            }
        }

        if granted > 0 {
            self.tell(participant, "[Instance] Chest opened! Loot added to your inventory.");
        } else {
            self.tell(participant, "[Instance] The chest was empty...");
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Close a run and drop it from every registry
    fn close_run(&self, state: &mut ActiveInstance) -> Teardown {
        let teardown = Teardown::take(state);
        {
            let mut index = self.participants.write();
            for participant in &teardown.participants {
                if index.get(participant) == Some(&teardown.key) {
                    index.remove(participant);
                }
            }
        }
        self.runs.write().remove(&teardown.key);
        let mut entities = self.entities.write();
        for entity in &teardown.entities {
            entities.remove(entity);
        }
        teardown
    }

    /// Cancel timers, despawn leftovers and forget their threat
    fn finish_teardown(&self, teardown: &Teardown) {
        self.cancel_timers(teardown.timers.iter().copied());
        for entity in &teardown.entities {
            if let Err(e) = self.services.world.remove_entity(*entity) {
                log::warn!("Run {}: could not remove {}: {}", teardown.key, entity, e);
            }
        }
        for creature in &teardown.creatures {
            self.threat.reset_threat(*creature);
        }
    }

    fn complete_run(&self, key: &RunKey) {
        let Some(run) = self.run(key) else {
            return;
        };

        let teardown = {
            let mut state = run.lock();
            if state.is_closed() {
                return;
            }
            if let Err(e) = state.advance_to(InstancePhase::Completed) {
                log::error!("Run {}: {}", key, e);
                return;
            }
            self.close_run(&mut state)
        };

        self.finish_teardown(&teardown);

        let definition = &teardown.definition;
        for participant in &teardown.participants {
            if let Some(quest) = &definition.end_quest {
                if let Err(e) = self.services.quests.complete_stage(*participant, quest) {
                    log::warn!("Could not complete quest '{}' for {}: {}", quest, participant, e);
                }
            }
            self.teleport_out(*participant, definition);
            self.completions.record_completion(*participant, &definition.id);
            self.tell(*participant, "[Instance] Instance complete! Well played!");
        }

        log::info!("Run {} completed", key);
    }

    /// Leave the current run, reporting when there is none
    pub fn leave_instance(&self, participant: ParticipantId) -> bool {
        if self.exit_instance(participant) {
            true
        } else {
            self.reject(participant, InstanceError::NotInInstance(participant))
        }
    }

    /// Leave the current run without complaint when there is none
    ///
    /// The last participant out tears the run down in whatever phase it is
    /// in; no loot or end quest is granted.
    pub fn exit_instance(&self, participant: ParticipantId) -> bool {
        let Some(run) = self.run_of(participant) else {
            return false;
        };

        let (definition, creatures, teardown) = {
            let mut state = run.lock();
            if state.is_closed() || !state.remove_participant(participant) {
                return false;
            }
            {
                let mut index = self.participants.write();
                if index.get(&participant) == Some(state.key()) {
                    index.remove(&participant);
                }
            }
            let creatures = state.creatures();
            let teardown = state.is_empty().then(|| self.close_run(&mut state));
            (state.definition().clone(), creatures, teardown)
        };

        self.teleport_out(participant, &definition);
        self.tell(participant, "[Instance] You left the instance.");
        for creature in creatures {
            self.threat.remove_threat(creature, participant);
        }

        if let Some(teardown) = teardown {
            self.finish_teardown(&teardown);
            log::info!("Run {} torn down (no participants left)", teardown.key);
        } else {
            log::info!("{} left '{}'", participant, definition.id);
        }
        true
    }

    /// Host disconnect hook
    pub fn on_participant_disconnect(&self, participant: ParticipantId) {
        self.exit_instance(participant);
    }

    /// Force every participant out and drop all runs
    pub fn shutdown(&self) {
        let runs: Vec<SharedRun> = self.runs.write().drain().map(|(_, run)| run).collect();
        self.participants.write().clear();
        self.entities.write().clear();

        let mut closed = 0;
        for run in runs {
            let teardown = {
                let mut state = run.lock();
                if state.is_closed() {
                    continue;
                }
                Teardown::take(&mut state)
            };

            self.finish_teardown(&teardown);
            for participant in &teardown.participants {
                self.teleport_out(*participant, &teardown.definition);
                self.tell(
                    *participant,
                    "[Instance] The server is restarting, you have been teleported out.",
                );
            }
            closed += 1;
        }

        log::info!("Instance manager shutdown complete ({} run(s) closed)", closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InstanceType, MobPack, Position};
    use void_core::{EntityIdGenerator, Location, TickScheduler};
    use void_services::{PartyRegistry, ServiceResult};

    #[derive(Default)]
    struct Quiet {
        ids: EntityIdGenerator,
    }

    impl QuestService for Quiet {
        fn start_quest(&self, _: ParticipantId, _: &str) -> ServiceResult<()> {
            Ok(())
        }
        fn complete_stage(&self, _: ParticipantId, _: &str) -> ServiceResult<()> {
            Ok(())
        }
    }

    impl WorldService for Quiet {
        fn spawn_entity(&self, _: &str, _: &Location, _: Option<&str>) -> ServiceResult<EntityId> {
            Ok(self.ids.next())
        }
        fn remove_entity(&self, _: EntityId) -> ServiceResult<()> {
            Ok(())
        }
        fn teleport(&self, _: ParticipantId, _: &Location) -> ServiceResult<()> {
            Ok(())
        }
    }

    impl InventoryService for Quiet {
        fn grant_item(&self, _: ParticipantId, _: &str, _: u32) -> ServiceResult<()> {
            Ok(())
        }
    }

    impl HudService for Quiet {
        fn set_hud(&self, _: ParticipantId, _: HudLayer, _: HudElement) {}
        fn clear_hud(&self, _: ParticipantId, _: HudLayer) {}
    }

    impl WaypointService for Quiet {
        fn set_waypoint(&self, _: ParticipantId, _: &str, _: &Location) {}
        fn clear_waypoint(&self, _: ParticipantId) {}
    }

    impl Notifier for Quiet {
        fn send_message(&self, _: ParticipantId, _: &str) {}
    }

    fn manager() -> (Arc<InstanceManager>, Arc<TickScheduler>) {
        let quiet = Arc::new(Quiet::default());
        let services = InstanceServices {
            groups: Arc::new(PartyRegistry::new()),
            quests: quiet.clone(),
            world: quiet.clone(),
            inventory: quiet.clone(),
            hud: quiet.clone(),
            waypoints: quiet.clone(),
            notifier: quiet,
        };
        let scheduler = Arc::new(TickScheduler::new());
        let catalog = InstanceCatalog::from_definitions(vec![
            InstanceDefinition::new("trial", "Trial", InstanceType::Solo, "w")
                .with_countdown(1)
                .with_mob_pack(MobPack::new("rats", "rat", 1, Position::default())),
        ])
        .unwrap();
        let manager = InstanceManager::builder(services, scheduler.clone())
            .with_config(InstanceConfig {
                ticks_per_second: 1,
                ..Default::default()
            })
            .with_catalog(catalog)
            .build();
        (manager, scheduler)
    }

    #[test]
    fn test_timer_dies_with_manager() {
        let (manager, scheduler) = manager();
        let player = ParticipantId::new(1);
        assert!(manager.start_solo_instance(player, "trial"));
        drop(manager);
        scheduler.advance(3);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_registries_follow_run() {
        let (manager, scheduler) = manager();
        let player = ParticipantId::new(1);
        manager.start_solo_instance(player, "trial");
        assert_eq!(manager.active_run_count(), 1);

        scheduler.advance(1);
        assert_eq!(manager.phase_of(player), Some(InstancePhase::Active));
        assert_eq!(manager.entities.read().len(), 1);

        assert!(manager.exit_instance(player));
        assert_eq!(manager.active_run_count(), 0);
        assert!(manager.entities.read().is_empty());
        assert!(manager.participants.read().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }
}
