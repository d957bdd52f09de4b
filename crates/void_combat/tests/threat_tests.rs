//! Integration tests for void_combat

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use void_combat::*;
use void_core::{EntityId, ParticipantId, TickScheduler};

// Mock AI layer that remembers what each creature attacks
#[derive(Default)]
struct MockBrain {
    targets: Mutex<HashMap<EntityId, Option<ParticipantId>>>,
    changes: Mutex<usize>,
}

impl TargetController for MockBrain {
    fn set_target(&self, creature: EntityId, target: Option<ParticipantId>) {
        self.targets.lock().insert(creature, target);
        *self.changes.lock() += 1;
    }
}

fn setup() -> (Arc<ThreatManager>, Arc<MockBrain>) {
    let brain = Arc::new(MockBrain::default());
    let threat = Arc::new(ThreatManager::with_defaults().with_target_controller(brain.clone()));
    (threat, brain)
}

#[test]
fn test_tank_healer_dps_fight() {
    let (threat, brain) = setup();
    let boss = EntityId::new(1);
    let tank = ParticipantId::new(1);
    let healer = ParticipantId::new(2);
    let dps = ParticipantId::new(3);

    threat.add_block_threat(boss, tank, 40.0); // 60
    threat.add_damage_threat(boss, dps, 80.0); // 80
    assert_eq!(brain.targets.lock()[&boss], Some(dps));

    threat.taunt(boss, tank); // 260
    assert_eq!(brain.targets.lock()[&boss], Some(tank));

    threat.add_heal_threat(boss, healer, 600.0); // 300
    assert_eq!(threat.get_top_threat(boss), Some(healer));

    threat.reduce_threat(boss, healer, 1.0);
    assert_eq!(threat.get_threat(boss, healer), 0.0);
    assert_eq!(brain.targets.lock()[&boss], Some(tank));
}

#[test]
fn test_events_from_combat_layer() {
    let (threat, _) = setup();
    let mob = EntityId::new(9);
    let events = [
        ThreatEvent::damage(mob, ParticipantId::new(1), 30.0),
        ThreatEvent::heal(mob, ParticipantId::new(2), 100.0),
        ThreatEvent::block(mob, ParticipantId::new(3), 10.0),
    ];
    for event in &events {
        threat.apply_event(event);
    }

    let all = threat.get_all_threats(mob);
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].participant, ParticipantId::new(1));
    assert_eq!(threat.get_top_threat(mob), Some(ParticipantId::new(2)));
}

#[test]
fn test_decay_clears_idle_creature() {
    let (threat, brain) = setup();
    let scheduler = Arc::new(TickScheduler::new());
    let mob = EntityId::new(5);
    let player = ParticipantId::new(1);

    threat.add_damage_threat(mob, player, 4.0);
    threat.start_decay(scheduler.clone());

    scheduler.advance(40);
    assert!(!threat.is_tracked(mob));
    assert_eq!(brain.targets.lock()[&mob], None);

    threat.shutdown();
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_reset_after_death() {
    let (threat, brain) = setup();
    let mob = EntityId::new(2);
    threat.add_damage_threat(mob, ParticipantId::new(1), 10.0);
    threat.reset_threat(mob);
    threat.reset_threat(mob);

    assert!(!threat.is_tracked(mob));
    assert_eq!(*brain.changes.lock(), 2);
}
