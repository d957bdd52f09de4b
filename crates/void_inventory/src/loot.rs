//! Loot table definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loot errors
#[derive(Debug, Error)]
pub enum LootError {
    #[error("Loot entry '{item}' in table '{table}' has min {min} > max {max}")]
    InvalidRange {
        table: String,
        item: String,
        min: u32,
        max: u32,
    },

    #[error("Loot entry '{item}' in table '{table}' has chance {chance} outside 0..=1")]
    InvalidChance {
        table: String,
        item: String,
        chance: f64,
    },

    #[error("Loot table has an empty id")]
    EmptyId,

    #[error("Duplicate loot table: {0}")]
    DuplicateTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for loot operations
pub type LootResult<T> = Result<T, LootError>;

fn default_one() -> u32 {
    1
}

fn default_chance() -> f64 {
    1.0
}

/// One possible drop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootEntry {
    /// Item id as known to the inventory service
    pub item: String,
    /// Minimum quantity (inclusive)
    #[serde(default = "default_one")]
    pub min: u32,
    /// Maximum quantity (inclusive)
    #[serde(default = "default_one")]
    pub max: u32,
    /// Independent drop chance in `0..=1`
    #[serde(default = "default_chance")]
    pub chance: f64,
}

impl LootEntry {
    /// Create an entry
    pub fn new(item: impl Into<String>, min: u32, max: u32, chance: f64) -> Self {
        Self {
            item: item.into(),
            min,
            max,
            chance,
        }
    }

    /// Entry that always drops exactly `quantity`
    pub fn guaranteed(item: impl Into<String>, quantity: u32) -> Self {
        Self::new(item, quantity, quantity, 1.0)
    }

    /// Check range and chance
    pub fn validate(&self, table: &str) -> LootResult<()> {
        if self.min > self.max {
            return Err(LootError::InvalidRange {
                table: table.to_string(),
                item: self.item.clone(),
                min: self.min,
                max: self.max,
            });
        }
        if !(0.0..=1.0).contains(&self.chance) {
            return Err(LootError::InvalidChance {
                table: table.to_string(),
                item: self.item.clone(),
                chance: self.chance,
            });
        }
        Ok(())
    }

    /// Average quantity per roll
    pub fn expected_amount(&self) -> f64 {
        self.chance * (self.min as f64 + self.max as f64) / 2.0
    }

    pub fn is_guaranteed(&self) -> bool {
        self.chance >= 1.0
    }

    pub fn is_fixed_amount(&self) -> bool {
        self.min == self.max
    }
}

/// Named list of independent loot entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LootTable {
    pub id: String,
    #[serde(default)]
    pub entries: Vec<LootEntry>,
}

impl LootTable {
    /// Create an empty table
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry
    pub fn with_entry(mut self, entry: LootEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Check the id and every entry
    pub fn validate(&self) -> LootResult<()> {
        if self.id.trim().is_empty() {
            return Err(LootError::EmptyId);
        }
        self.entries
            .iter()
            .try_for_each(|entry| entry.validate(&self.id))
    }

    /// Sum of expected quantities across entries
    pub fn expected_total(&self) -> f64 {
        self.entries.iter().map(LootEntry::expected_amount).sum()
    }
}

/// A rolled item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootDrop {
    pub item: String,
    pub quantity: u32,
}

impl LootDrop {
    pub fn new(item: impl Into<String>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
        }
    }
}

impl std::fmt::Display for LootDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x {}", self.quantity, self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_validation() {
        assert!(LootEntry::new("coin", 1, 5, 0.5).validate("t").is_ok());
        assert!(matches!(
            LootEntry::new("coin", 5, 1, 0.5).validate("t"),
            Err(LootError::InvalidRange { min: 5, max: 1, .. })
        ));
        assert!(matches!(
            LootEntry::new("coin", 1, 1, 1.5).validate("t"),
            Err(LootError::InvalidChance { .. })
        ));
        assert!(LootEntry::new("coin", 1, 1, f64::NAN).validate("t").is_err());
    }

    #[test]
    fn test_entry_helpers() {
        let entry = LootEntry::new("gem", 2, 4, 0.5);
        assert_eq!(entry.expected_amount(), 1.5);
        assert!(!entry.is_guaranteed());
        assert!(!entry.is_fixed_amount());

        let key = LootEntry::guaranteed("key", 1);
        assert!(key.is_guaranteed());
        assert!(key.is_fixed_amount());
    }

    #[test]
    fn test_table_validation() {
        let table = LootTable::new("chest")
            .with_entry(LootEntry::guaranteed("coin", 10))
            .with_entry(LootEntry::new("sword", 3, 1, 0.1));
        assert!(table.validate().is_err());
        assert!(matches!(LootTable::new("  ").validate(), Err(LootError::EmptyId)));
    }

    #[test]
    fn test_entry_defaults_from_toml() {
        let entry: LootEntry = toml::from_str("item = \"coin\"").unwrap();
        assert_eq!(entry, LootEntry::guaranteed("coin", 1));
    }

    #[test]
    fn test_drop_display() {
        assert_eq!(LootDrop::new("coin", 3).to_string(), "3 x coin");
    }
}
