//! Completion counting

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use void_core::ParticipantId;

/// Completion store errors
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Where finished runs are counted
pub trait CompletionStore: Send + Sync {
    /// Count one finished run; returns the new total
    fn record_completion(&self, participant: ParticipantId, instance_id: &str) -> u32;

    /// Finished runs so far (0 if none)
    fn completion_count(&self, participant: ParticipantId, instance_id: &str) -> u32;

    /// Forget counts for one instance, or for every instance when `None`
    fn reset(&self, instance_id: Option<&str>);
}

/// Maximum number of completions allowed before the store is reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionLimit(u32);

impl CompletionLimit {
    pub const fn new(max: u32) -> Self {
        Self(max)
    }

    pub const fn max(&self) -> u32 {
        self.0
    }

    /// Check if `count` completions exhaust the limit
    pub fn is_reached(&self, count: u32) -> bool {
        count >= self.0
    }

    /// Completions left before the limit
    pub fn remaining(&self, count: u32) -> u32 {
        self.0.saturating_sub(count)
    }
}

/// Snapshot row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub participant: ParticipantId,
    pub instance_id: String,
    pub count: u32,
}

/// Process-local completion counts
#[derive(Default)]
pub struct InMemoryCompletionStore {
    counts: RwLock<HashMap<(ParticipantId, String), u32>>,
}

impl InMemoryCompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All counts, sorted by participant then instance
    pub fn records(&self) -> Vec<CompletionRecord> {
        let mut records: Vec<CompletionRecord> = self
            .counts
            .read()
            .iter()
            .map(|((participant, instance_id), count)| CompletionRecord {
                participant: *participant,
                instance_id: instance_id.clone(),
                count: *count,
            })
            .collect();
        records.sort_by(|a, b| {
            a.participant
                .cmp(&b.participant)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        });
        records
    }

    /// Serialize every count to JSON
    pub fn to_json(&self) -> Result<String, CompletionError> {
        serde_json::to_string_pretty(&self.records())
            .map_err(|e| CompletionError::Serialization(e.to_string()))
    }

    /// Rebuild a store from [`Self::to_json`] output
    pub fn from_json(json: &str) -> Result<Self, CompletionError> {
        let records: Vec<CompletionRecord> =
            serde_json::from_str(json).map_err(|e| CompletionError::Deserialization(e.to_string()))?;

        let counts = records
            .into_iter()
            .map(|r| ((r.participant, r.instance_id), r.count))
            .collect();
        Ok(Self {
            counts: RwLock::new(counts),
        })
    }
}

impl CompletionStore for InMemoryCompletionStore {
    fn record_completion(&self, participant: ParticipantId, instance_id: &str) -> u32 {
        let mut counts = self.counts.write();
        let count = counts.entry((participant, instance_id.to_string())).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    fn completion_count(&self, participant: ParticipantId, instance_id: &str) -> u32 {
        self.counts
            .read()
            .get(&(participant, instance_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn reset(&self, instance_id: Option<&str>) {
        let mut counts = self.counts.write();
        match instance_id {
            Some(id) => counts.retain(|(_, instance), _| instance != id),
            None => counts.clear(),
        }
        log::info!("Completion counts reset ({})", instance_id.unwrap_or("all instances"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: u64) -> ParticipantId {
        ParticipantId::new(raw)
    }

    #[test]
    fn test_record_and_count() {
        let store = InMemoryCompletionStore::new();
        assert_eq!(store.completion_count(p(1), "crypt"), 0);
        assert_eq!(store.record_completion(p(1), "crypt"), 1);
        assert_eq!(store.record_completion(p(1), "crypt"), 2);
        assert_eq!(store.completion_count(p(1), "crypt"), 2);
        assert_eq!(store.completion_count(p(2), "crypt"), 0);
    }

    #[test]
    fn test_reset_one_instance() {
        let store = InMemoryCompletionStore::new();
        store.record_completion(p(1), "crypt");
        store.record_completion(p(1), "keep");

        store.reset(Some("crypt"));
        assert_eq!(store.completion_count(p(1), "crypt"), 0);
        assert_eq!(store.completion_count(p(1), "keep"), 1);

        store.reset(None);
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_limit() {
        let limit = CompletionLimit::new(2);
        assert!(!limit.is_reached(1));
        assert!(limit.is_reached(2));
        assert_eq!(limit.remaining(1), 1);
        assert_eq!(limit.remaining(5), 0);
    }

    #[test]
    fn test_json_snapshot() {
        let store = InMemoryCompletionStore::new();
        store.record_completion(p(2), "keep");
        store.record_completion(p(1), "crypt");
        store.record_completion(p(1), "crypt");

        let json = store.to_json().unwrap();
        let restored = InMemoryCompletionStore::from_json(&json).unwrap();
        assert_eq!(restored.records(), store.records());
        assert_eq!(restored.records()[0].participant, p(1));
        assert!(InMemoryCompletionStore::from_json("{").is_err());
    }
}
