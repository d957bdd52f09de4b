//! Threat manager
//!
//! Owns every creature's [`ThreatTable`] and derives each creature's
//! current target. All mutators are no-ops for creatures without a table,
//! except the `add_*` family and [`ThreatManager::taunt`], which create one.
//!
//! Target changes are pushed to the [`TargetController`] after the table
//! lock is released, so controllers may call back into the manager.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use void_core::{EntityId, ParticipantId, Scheduler, TimerHandle};

use crate::source::{ThreatEvent, ThreatSource};
use crate::table::{ThreatEntry, ThreatTable};

/// Receives target changes for creatures
pub trait TargetController: Send + Sync {
    /// Point `creature` at `target` (`None` clears the target)
    fn set_target(&self, creature: EntityId, target: Option<ParticipantId>);
}

/// Threat tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    /// Multiplier for damage dealt
    pub damage_weight: f64,
    /// Multiplier for healing done
    pub heal_weight: f64,
    /// Multiplier for damage blocked
    pub block_weight: f64,
    /// Flat bonus added by a taunt
    pub taunt_bonus: f64,
    /// Amount removed from every entry per decay tick
    pub decay_per_tick: f64,
    /// Game ticks between decay passes (20 = one second)
    pub decay_period_ticks: u64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            damage_weight: 1.0,
            heal_weight: 0.5,
            block_weight: 1.5,
            taunt_bonus: 200.0,
            decay_per_tick: 2.0,
            decay_period_ticks: 20,
        }
    }
}

impl ThreatConfig {
    /// Weight applied to a threat source
    pub fn weight(&self, source: ThreatSource) -> f64 {
        match source {
            ThreatSource::Damage => self.damage_weight,
            ThreatSource::Heal => self.heal_weight,
            ThreatSource::Block => self.block_weight,
        }
    }
}

type TargetChange = (EntityId, Option<ParticipantId>);

struct DecayTask {
    scheduler: Arc<dyn Scheduler>,
    handle: TimerHandle,
}

/// Threat manager - owns all threat tables
pub struct ThreatManager {
    config: ThreatConfig,
    tables: RwLock<HashMap<EntityId, ThreatTable>>,
    controller: Option<Arc<dyn TargetController>>,
    decay_task: Mutex<Option<DecayTask>>,
}

impl ThreatManager {
    /// Create a manager without a target controller
    pub fn new(config: ThreatConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
            controller: None,
            decay_task: Mutex::new(None),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ThreatConfig::default())
    }

    /// Push target changes to a controller
    pub fn with_target_controller(mut self, controller: Arc<dyn TargetController>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &ThreatConfig {
        &self.config
    }

    fn apply_changes(&self, changes: Vec<TargetChange>) {
        if let Some(controller) = &self.controller {
            for (creature, target) in changes {
                log::debug!("{} now targets {:?}", creature, target);
                controller.set_target(creature, target);
            }
        }
    }

    /// Add raw threat (already weighted) and re-derive the target
    fn add_raw(&self, creature: EntityId, participant: ParticipantId, amount: f64) {
        let change = {
            let mut tables = self.tables.write();
            let table = tables
                .entry(creature)
                .or_insert_with(|| ThreatTable::new(creature));
            table.add(participant, amount);
            table.refresh_target().map(|target| (creature, target))
        };
        self.apply_changes(change.into_iter().collect());
    }

    /// Add weighted threat for an event
    pub fn add_threat(&self, creature: EntityId, participant: ParticipantId, source: ThreatSource, amount: f64) {
        self.add_raw(creature, participant, amount * self.config.weight(source));
    }

    /// Apply a threat event from the combat layer
    pub fn apply_event(&self, event: &ThreatEvent) {
        self.add_threat(event.creature, event.participant, event.source, event.amount);
    }

    /// Threat from damage dealt
    pub fn add_damage_threat(&self, creature: EntityId, participant: ParticipantId, damage: f64) {
        self.add_threat(creature, participant, ThreatSource::Damage, damage);
    }

    /// Threat from healing done
    pub fn add_heal_threat(&self, creature: EntityId, healer: ParticipantId, heal: f64) {
        self.add_threat(creature, healer, ThreatSource::Heal, heal);
    }

    /// Threat from damage blocked
    pub fn add_block_threat(&self, creature: EntityId, tank: ParticipantId, blocked: f64) {
        self.add_threat(creature, tank, ThreatSource::Block, blocked);
    }

    /// Add the taunt bonus to a participant
    pub fn taunt(&self, creature: EntityId, tank: ParticipantId) {
        self.add_raw(creature, tank, self.config.taunt_bonus);
    }

    /// Current threat of a participant on a creature
    pub fn get_threat(&self, creature: EntityId, participant: ParticipantId) -> f64 {
        self.tables
            .read()
            .get(&creature)
            .map(|table| table.threat(participant))
            .unwrap_or(0.0)
    }

    /// Participant with the strictly highest positive threat
    pub fn get_top_threat(&self, creature: EntityId) -> Option<ParticipantId> {
        self.tables
            .read()
            .get(&creature)
            .and_then(|table| table.top_target())
    }

    /// Target last pushed to the creature
    pub fn current_target(&self, creature: EntityId) -> Option<ParticipantId> {
        self.tables
            .read()
            .get(&creature)
            .and_then(|table| table.current_target())
    }

    /// Snapshot of a creature's table in insertion order
    pub fn get_all_threats(&self, creature: EntityId) -> Vec<ThreatEntry> {
        self.tables
            .read()
            .get(&creature)
            .map(|table| table.entries().to_vec())
            .unwrap_or_default()
    }

    /// Check if a creature has a table
    pub fn is_tracked(&self, creature: EntityId) -> bool {
        self.tables.read().contains_key(&creature)
    }

    /// Number of creatures with a table
    pub fn tracked_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Discard a creature's table and clear its target
    pub fn reset_threat(&self, creature: EntityId) {
        let removed = self.tables.write().remove(&creature);
        if let Some(table) = removed {
            if table.current_target().is_some() {
                self.apply_changes(vec![(creature, None)]);
            }
        }
    }

    /// Run a mutation on an existing table, then re-derive its target
    fn mutate_existing(&self, creature: EntityId, f: impl FnOnce(&mut ThreatTable)) {
        let change = {
            let mut tables = self.tables.write();
            let Some(table) = tables.get_mut(&creature) else {
                return;
            };
            f(table);
            let change = table.refresh_target().map(|target| (creature, target));
            if table.len() == 0 {
                tables.remove(&creature);
            }
            change
        };
        self.apply_changes(change.into_iter().collect());
    }

    /// Remove one participant from a creature's table
    pub fn remove_threat(&self, creature: EntityId, participant: ParticipantId) {
        self.mutate_existing(creature, |table| {
            table.remove(participant);
        });
    }

    /// Remove a participant from every table (e.g. they left the area)
    pub fn remove_participant(&self, participant: ParticipantId) {
        let changes: Vec<TargetChange> = {
            let mut tables = self.tables.write();
            let mut changes = Vec::new();
            for (creature, table) in tables.iter_mut() {
                if table.remove(participant) {
                    if let Some(target) = table.refresh_target() {
                        changes.push((*creature, target));
                    }
                }
            }
            tables.retain(|_, table| table.len() > 0);
            changes
        };
        self.apply_changes(changes);
    }

    /// Shrink one participant's threat by a fraction in `0..=1`
    pub fn reduce_threat(&self, creature: EntityId, participant: ParticipantId, fraction: f64) {
        self.mutate_existing(creature, |table| {
            table.reduce(participant, fraction);
        });
    }

    /// One passive decay pass over every table
    ///
    /// Tables with no positive threat left are discarded.
    pub fn decay_tick(&self) {
        let amount = self.config.decay_per_tick;
        let changes: Vec<TargetChange> = {
            let mut tables = self.tables.write();
            let mut changes = Vec::new();
            for (creature, table) in tables.iter_mut() {
                table.decay(amount);
                if let Some(target) = table.refresh_target() {
                    changes.push((*creature, target));
                }
            }
            let before = tables.len();
            tables.retain(|_, table| !table.is_empty());
            if tables.len() != before {
                log::debug!("Threat decay discarded {} table(s)", before - tables.len());
            }
            changes
        };
        self.apply_changes(changes);
    }

    /// Schedule [`Self::decay_tick`] every `decay_period_ticks`
    ///
    /// Replaces any previously started decay task. The timer holds a weak
    /// reference, so dropping the manager stops decay.
    pub fn start_decay(self: &Arc<Self>, scheduler: Arc<dyn Scheduler>) -> TimerHandle {
        self.stop_decay();

        let period = self.config.decay_period_ticks;
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = scheduler.run_repeating(period, period, Box::new(move || {
            if let Some(manager) = weak.upgrade() {
                manager.decay_tick();
            }
        }));

        *self.decay_task.lock() = Some(DecayTask { scheduler, handle });
        log::info!("Threat decay started ({} per {} ticks)", self.config.decay_per_tick, period);
        handle
    }

    /// Cancel the decay task if running
    pub fn stop_decay(&self) -> bool {
        match self.decay_task.lock().take() {
            Some(task) => task.scheduler.cancel(task.handle),
            None => false,
        }
    }

    /// Stop decay and drop every table
    pub fn shutdown(&self) {
        self.stop_decay();
        self.tables.write().clear();
        log::info!("Threat manager stopped");
    }
}

impl Default for ThreatManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_core::TickScheduler;

    const MOB: EntityId = EntityId::new(100);

    fn p(raw: u64) -> ParticipantId {
        ParticipantId::new(raw)
    }

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<TargetChange>>,
    }

    impl TargetController for RecordingController {
        fn set_target(&self, creature: EntityId, target: Option<ParticipantId>) {
            self.calls.lock().push((creature, target));
        }
    }

    #[test]
    fn test_weights() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 100.0);
        threat.add_heal_threat(MOB, p(2), 100.0);
        threat.add_block_threat(MOB, p(3), 100.0);

        assert_eq!(threat.get_threat(MOB, p(1)), 100.0);
        assert_eq!(threat.get_threat(MOB, p(2)), 50.0);
        assert_eq!(threat.get_threat(MOB, p(3)), 150.0);
        assert_eq!(threat.get_top_threat(MOB), Some(p(3)));
    }

    #[test]
    fn test_taunt_overtakes() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 150.0);
        assert_eq!(threat.get_top_threat(MOB), Some(p(1)));

        threat.taunt(MOB, p(2));
        assert_eq!(threat.get_threat(MOB, p(2)), 200.0);
        assert_eq!(threat.get_top_threat(MOB), Some(p(2)));
    }

    #[test]
    fn test_taunt_does_not_beat_large_lead() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 500.0);
        threat.taunt(MOB, p(2));
        assert_eq!(threat.get_top_threat(MOB), Some(p(1)));
    }

    #[test]
    fn test_unknown_creature_is_noop() {
        let threat = ThreatManager::with_defaults();
        threat.remove_threat(MOB, p(1));
        threat.reduce_threat(MOB, p(1), 0.5);
        threat.reset_threat(MOB);

        assert_eq!(threat.get_threat(MOB, p(1)), 0.0);
        assert_eq!(threat.get_top_threat(MOB), None);
        assert!(!threat.is_tracked(MOB));
    }

    #[test]
    fn test_reduce_threat() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 100.0);
        threat.add_damage_threat(MOB, p(2), 80.0);

        threat.reduce_threat(MOB, p(1), 0.5);
        assert_eq!(threat.get_threat(MOB, p(1)), 50.0);
        assert_eq!(threat.get_top_threat(MOB), Some(p(2)));
    }

    #[test]
    fn test_remove_last_entry_discards_table() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 10.0);
        threat.remove_threat(MOB, p(1));
        assert!(!threat.is_tracked(MOB));
    }

    #[test]
    fn test_target_controller_notified_on_change_only() {
        let controller = Arc::new(RecordingController::default());
        let threat = ThreatManager::with_defaults().with_target_controller(controller.clone());

        threat.add_damage_threat(MOB, p(1), 10.0);
        threat.add_damage_threat(MOB, p(1), 10.0);
        threat.add_damage_threat(MOB, p(2), 50.0);
        threat.reset_threat(MOB);

        let calls = controller.calls.lock().clone();
        assert_eq!(
            calls,
            vec![(MOB, Some(p(1))), (MOB, Some(p(2))), (MOB, None)]
        );
    }

    #[test]
    fn test_decay_discards_empty_tables() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 3.0);
        threat.add_damage_threat(EntityId::new(101), p(1), 100.0);

        threat.decay_tick();
        assert_eq!(threat.get_threat(MOB, p(1)), 1.0);
        threat.decay_tick();
        assert!(!threat.is_tracked(MOB));
        assert_eq!(threat.get_threat(EntityId::new(101), p(1)), 96.0);
        assert_eq!(threat.tracked_count(), 1);
    }

    #[test]
    fn test_decay_without_reorder_keeps_target() {
        let controller = Arc::new(RecordingController::default());
        let threat = ThreatManager::with_defaults().with_target_controller(controller.clone());
        threat.add_damage_threat(MOB, p(1), 50.0);
        threat.add_damage_threat(MOB, p(2), 20.0);
        controller.calls.lock().clear();

        threat.decay_tick();
        threat.decay_tick();
        assert!(controller.calls.lock().is_empty());
        assert_eq!(threat.current_target(MOB), Some(p(1)));
    }

    #[test]
    fn test_remove_participant_everywhere() {
        let threat = ThreatManager::with_defaults();
        threat.add_damage_threat(MOB, p(1), 10.0);
        threat.add_damage_threat(MOB, p(2), 5.0);
        threat.add_damage_threat(EntityId::new(7), p(1), 10.0);

        threat.remove_participant(p(1));
        assert_eq!(threat.get_top_threat(MOB), Some(p(2)));
        assert!(!threat.is_tracked(EntityId::new(7)));
    }

    #[test]
    fn test_decay_task_on_scheduler() {
        let scheduler = Arc::new(TickScheduler::new());
        let threat = Arc::new(ThreatManager::new(ThreatConfig {
            decay_period_ticks: 5,
            ..Default::default()
        }));
        threat.add_damage_threat(MOB, p(1), 10.0);

        threat.start_decay(scheduler.clone());
        scheduler.advance(4);
        assert_eq!(threat.get_threat(MOB, p(1)), 10.0);
        scheduler.advance(1);
        assert_eq!(threat.get_threat(MOB, p(1)), 8.0);

        threat.shutdown();
        assert_eq!(scheduler.pending(), 0);
        assert!(!threat.stop_decay());
    }

    #[test]
    fn test_config_from_toml() {
        let config: ThreatConfig = toml::from_str("taunt_bonus = 300.0\nheal_weight = 0.25").unwrap();
        assert_eq!(config.taunt_bonus, 300.0);
        assert_eq!(config.heal_weight, 0.25);
        assert_eq!(config.damage_weight, 1.0);
    }
}
