//! Loot roll engine
//!
//! Every entry of a table gets its own Bernoulli trial, so one roll may
//! yield nothing, some, or every entry. Rolled quantities are uniform over
//! the entry's inclusive range; a rolled quantity of zero produces no drop.

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::loot::{LootDrop, LootError, LootResult, LootTable};

/// On-disk loot file (`[[loot_tables]]` with nested `[[loot_tables.entries]]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LootFile {
    #[serde(default)]
    pub loot_tables: Vec<LootTable>,
}

impl LootFile {
    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> LootResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> LootResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Loot table registry and roller
pub struct LootRoller {
    tables: RwLock<HashMap<String, LootTable>>,
    rng: Mutex<StdRng>,
}

impl LootRoller {
    /// Create a roller seeded from OS entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a deterministic roller
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Register a validated table
    pub fn register(&self, table: LootTable) -> LootResult<()> {
        table.validate()?;
        let mut tables = self.tables.write();
        if tables.contains_key(&table.id) {
            return Err(LootError::DuplicateTable(table.id));
        }
        log::debug!("Registered loot table '{}' ({} entries)", table.id, table.entries.len());
        tables.insert(table.id.clone(), table);
        Ok(())
    }

    /// Replace every table with the contents of a loot file
    ///
    /// Nothing is replaced unless every table in the file is valid.
    pub fn load(&self, file: LootFile) -> LootResult<usize> {
        let mut loaded = HashMap::with_capacity(file.loot_tables.len());
        for table in file.loot_tables {
            if let Err(e) = table.validate() {
                log::error!("Rejected loot file: {}", e);
                return Err(e);
            }
            if loaded.contains_key(&table.id) {
                return Err(LootError::DuplicateTable(table.id));
            }
            loaded.insert(table.id.clone(), table);
        }

        let count = loaded.len();
        *self.tables.write() = loaded;
        log::info!("Loaded {} loot table(s)", count);
        Ok(count)
    }

    /// Load tables from a TOML string
    pub fn load_str(&self, content: &str) -> LootResult<usize> {
        self.load(LootFile::from_toml(content)?)
    }

    /// Load tables from a TOML file
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> LootResult<usize> {
        self.load(LootFile::from_path(path)?)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tables.read().contains_key(id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Get a copy of a table
    pub fn get(&self, id: &str) -> Option<LootTable> {
        self.tables.read().get(id).cloned()
    }

    /// Roll a registered table
    ///
    /// An unknown id yields no drops.
    pub fn roll(&self, id: &str) -> Vec<LootDrop> {
        let tables = self.tables.read();
        match tables.get(id) {
            Some(table) => self.roll_table(table),
            None => {
                log::warn!("Roll requested for unknown loot table '{}'", id);
                Vec::new()
            }
        }
    }

    /// Roll an arbitrary table
    pub fn roll_table(&self, table: &LootTable) -> Vec<LootDrop> {
        let mut rng = self.rng.lock();
        let mut drops = Vec::new();

        for entry in &table.entries {
            // gen() is in [0, 1): chance 1.0 always hits, 0.0 never does
            if rng.gen::<f64>() >= entry.chance {
                continue;
            }
            let (low, high) = (entry.min.min(entry.max), entry.min.max(entry.max));
            let quantity = rng.gen_range(low..=high);
            if quantity > 0 {
                drops.push(LootDrop::new(entry.item.clone(), quantity));
            }
        }

        drops
    }
}

impl Default for LootRoller {
    fn default() -> Self {
        Self::new()
    }
}
