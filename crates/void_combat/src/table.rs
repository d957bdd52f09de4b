//! Per-creature threat table

use serde::{Deserialize, Serialize};
use void_core::{EntityId, ParticipantId};

/// One participant's accumulated threat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatEntry {
    pub participant: ParticipantId,
    /// Accumulated score, never negative
    pub score: f64,
}

/// Threat accumulated on a single creature
///
/// Entries keep insertion order. When two participants share the highest
/// score, the one inserted first stays on top.
#[derive(Debug, Clone)]
pub struct ThreatTable {
    creature: EntityId,
    entries: Vec<ThreatEntry>,
    /// Target last pushed to the creature
    current_target: Option<ParticipantId>,
}

impl ThreatTable {
    /// Create an empty table for a creature
    pub fn new(creature: EntityId) -> Self {
        Self {
            creature,
            entries: Vec::new(),
            current_target: None,
        }
    }

    /// Creature this table belongs to
    pub fn creature(&self) -> EntityId {
        self.creature
    }

    fn position(&self, participant: ParticipantId) -> Option<usize> {
        self.entries.iter().position(|e| e.participant == participant)
    }

    /// Add (or subtract, if negative) threat for a participant
    ///
    /// The result is clamped at zero. Returns the new score.
    pub fn add(&mut self, participant: ParticipantId, amount: f64) -> f64 {
        if !amount.is_finite() {
            log::debug!("Ignoring non-finite threat {} on {}", amount, self.creature);
            return self.threat(participant);
        }

        match self.position(participant) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.score = (entry.score + amount).max(0.0);
                entry.score
            }
            None => {
                let score = amount.max(0.0);
                self.entries.push(ThreatEntry { participant, score });
                score
            }
        }
    }

    /// Remove a participant entirely
    pub fn remove(&mut self, participant: ParticipantId) -> bool {
        match self.position(participant) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Shrink a participant's threat by a fraction (clamped to 0..=1)
    pub fn reduce(&mut self, participant: ParticipantId, fraction: f64) -> f64 {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        match self.position(participant) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.score = (entry.score * (1.0 - fraction)).max(0.0);
                entry.score
            }
            None => 0.0,
        }
    }

    /// Reduce every entry by a fixed amount, floored at zero
    pub fn decay(&mut self, amount: f64) {
        for entry in &mut self.entries {
            entry.score = (entry.score - amount).max(0.0);
        }
    }

    /// Threat for a participant (0 if absent)
    pub fn threat(&self, participant: ParticipantId) -> f64 {
        self.position(participant)
            .map(|index| self.entries[index].score)
            .unwrap_or(0.0)
    }

    /// Participant with the strictly highest positive score
    pub fn top_target(&self) -> Option<ParticipantId> {
        let mut best: Option<&ThreatEntry> = None;
        for entry in &self.entries {
            if entry.score <= 0.0 {
                continue;
            }
            match best {
                Some(b) if entry.score <= b.score => {}
                _ => best = Some(entry),
            }
        }
        best.map(|e| e.participant)
    }

    /// Recompute the top target
    ///
    /// Returns `Some(new_target)` only when it differs from the target last
    /// pushed to the creature.
    pub fn refresh_target(&mut self) -> Option<Option<ParticipantId>> {
        let top = self.top_target();
        if top != self.current_target {
            self.current_target = top;
            Some(top)
        } else {
            None
        }
    }

    /// Target last pushed to the creature
    pub fn current_target(&self) -> Option<ParticipantId> {
        self.current_target
    }

    /// Whether no entry carries positive threat
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.score <= 0.0)
    }

    /// Number of tracked participants (including zero scores)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[ThreatEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: u64) -> ParticipantId {
        ParticipantId::new(raw)
    }

    #[test]
    fn test_add_and_clamp() {
        let mut table = ThreatTable::new(EntityId::new(1));

        assert_eq!(table.add(p(1), 50.0), 50.0);
        assert_eq!(table.add(p(1), -80.0), 0.0);
        assert_eq!(table.add(p(2), -10.0), 0.0);
        assert_eq!(table.threat(p(2)), 0.0);
        assert_eq!(table.len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_top_target_strict() {
        let mut table = ThreatTable::new(EntityId::new(1));
        assert_eq!(table.top_target(), None);

        table.add(p(1), 0.0);
        assert_eq!(table.top_target(), None);

        table.add(p(2), 10.0);
        table.add(p(3), 30.0);
        assert_eq!(table.top_target(), Some(p(3)));
    }

    #[test]
    fn test_tie_keeps_first_inserted() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(5), 40.0);
        table.add(p(2), 40.0);
        table.add(p(9), 40.0);

        assert_eq!(table.top_target(), Some(p(5)));

        // Re-adding to a later entry breaks the tie
        table.add(p(9), 0.5);
        assert_eq!(table.top_target(), Some(p(9)));
    }

    #[test]
    fn test_tie_ignores_who_got_there_first() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(1), 10.0);
        table.add(p(2), 50.0);
        assert_eq!(table.top_target(), Some(p(2)));

        table.add(p(1), 40.0);
        assert_eq!(table.top_target(), Some(p(1)));
    }

    #[test]
    fn test_reduce_and_remove() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(1), 100.0);

        assert_eq!(table.reduce(p(1), 0.25), 75.0);
        assert_eq!(table.reduce(p(1), 4.0), 0.0);
        assert_eq!(table.reduce(p(7), 0.5), 0.0);

        assert!(table.remove(p(1)));
        assert!(!table.remove(p(1)));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(1), 3.0);
        table.add(p(2), 10.0);

        table.decay(2.0);
        assert_eq!(table.threat(p(1)), 1.0);
        table.decay(2.0);
        assert_eq!(table.threat(p(1)), 0.0);
        assert_eq!(table.threat(p(2)), 6.0);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_refresh_target_reports_changes_only() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(1), 10.0);
        assert_eq!(table.refresh_target(), Some(Some(p(1))));
        assert_eq!(table.refresh_target(), None);

        table.add(p(2), 20.0);
        assert_eq!(table.refresh_target(), Some(Some(p(2))));

        table.remove(p(2));
        table.remove(p(1));
        assert_eq!(table.refresh_target(), Some(None));
    }

    #[test]
    fn test_non_finite_ignored() {
        let mut table = ThreatTable::new(EntityId::new(1));
        table.add(p(1), 5.0);
        table.add(p(1), f64::NAN);
        table.add(p(1), f64::INFINITY);
        assert_eq!(table.threat(p(1)), 5.0);
    }
}
