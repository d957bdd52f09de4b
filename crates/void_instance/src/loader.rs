//! Definition file loading
//!
//! One TOML file may carry both `[[instances]]` and `[[loot_tables]]`.
//! Every definition is validated before anything is returned; a single
//! invalid definition fails the whole load.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use void_inventory::{LootFile, LootTable};

use crate::definition::InstanceDefinition;
use crate::error::{LoadError, LoadResult};

/// Parsed definitions file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFile {
    #[serde(default)]
    pub instances: Vec<InstanceDefinition>,
    #[serde(default)]
    pub loot_tables: Vec<LootTable>,
}

impl InstanceFile {
    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> LoadResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate and split into a catalog and the loot section
    pub fn into_parts(self) -> LoadResult<(InstanceCatalog, LootFile)> {
        let catalog = InstanceCatalog::from_definitions(self.instances)?;
        Ok((
            catalog,
            LootFile {
                loot_tables: self.loot_tables,
            },
        ))
    }
}

/// Validated definitions by id
#[derive(Debug, Clone, Default)]
pub struct InstanceCatalog {
    definitions: HashMap<String, Arc<InstanceDefinition>>,
}

impl InstanceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from definitions, rejecting duplicates and invalid entries
    pub fn from_definitions(definitions: Vec<InstanceDefinition>) -> LoadResult<Self> {
        let mut map = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if let Err(e) = definition.validate() {
                log::error!("Rejected instance definition: {}", e);
                return Err(e.into());
            }
            if map.contains_key(&definition.id) {
                log::error!("Duplicate instance definition: {}", definition.id);
                return Err(LoadError::DuplicateInstance(definition.id));
            }
            map.insert(definition.id.clone(), Arc::new(definition));
        }
        Ok(Self { definitions: map })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<InstanceDefinition>> {
        self.definitions.get(id)
    }

    /// Sorted instance ids
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.definitions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstanceDefinition>> {
        self.definitions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::InstanceType;

    const FILE: &str = r#"
[[instances]]
id = "crypt"
name = "Forgotten Crypt"
type = "GROUP"
min_participants = 2
max_participants = 5
world = "crypt_world"
spawn = { x = 0.5, y = 64.0, z = 0.5 }
exit = { world = "hub", x = 100.0, y = 70.0, z = -20.0 }
start_quest = "crypt_intro"
end_quest = "crypt_done"
countdown_seconds = 5

[[instances.mobs]]
id = "skeletons"
type = "skeleton"
count = 4
position = { x = 10.0, y = 64.0, z = 3.0 }

[instances.boss]
id = "lich"
type = "lich_king"
position = { x = 40.0, y = 70.0, z = 0.0 }

[[instances.chests]]
id = "main"
tag = "crypt_chest_main"
loot_table = "crypt_loot"
position = { x = 42.0, y = 70.0, z = 2.0 }

[[instances]]
id = "trial"
name = "Solo Trial"
type = "SOLO"
world = "trial_world"
spawn = { x = 0.0, y = 64.0, z = 0.0 }
exit = { world = "hub", x = 0.0, y = 70.0, z = 0.0 }
completion_limit = 3

[[loot_tables]]
id = "crypt_loot"

[[loot_tables.entries]]
item = "gold_coin"
min = 10
max = 25
chance = 1.0
"#;

    #[test]
    fn test_parse_file() {
        let file = InstanceFile::from_toml(FILE).unwrap();
        assert_eq!(file.instances.len(), 2);
        assert_eq!(file.loot_tables.len(), 1);

        let crypt = &file.instances[0];
        assert_eq!(crypt.kind, InstanceType::Group);
        assert_eq!(crypt.countdown_seconds, 5);
        assert_eq!(crypt.loot_phase_seconds, 60);
        assert_eq!(crypt.mobs[0].kind, "skeleton");
        assert_eq!(crypt.boss.as_ref().map(|b| b.kind.as_str()), Some("lich_king"));
        assert_eq!(crypt.chests[0].kind, "chest");
        assert_eq!(crypt.exit.world, "hub");

        let trial = &file.instances[1];
        assert_eq!(trial.countdown_seconds, 10);
        assert_eq!(trial.min_participants, 1);
        assert_eq!(trial.completion_limit.map(|l| l.max()), Some(3));
    }

    #[test]
    fn test_catalog() {
        let (catalog, loot) = InstanceFile::from_toml(FILE).unwrap().into_parts().unwrap();
        assert_eq!(catalog.ids(), vec!["crypt".to_string(), "trial".to_string()]);
        assert!(catalog.get("crypt").is_some());
        assert_eq!(loot.loot_tables[0].id, "crypt_loot");
    }

    #[test]
    fn test_one_invalid_definition_fails_load() {
        let broken = FILE.replace("min_participants = 2", "min_participants = 9");
        let result = InstanceFile::from_toml(&broken).unwrap().into_parts();
        assert!(matches!(result, Err(LoadError::Definition(_))));
    }

    #[test]
    fn test_duplicate_ids_fail_load() {
        let def = InstanceDefinition::new("a", "A", InstanceType::Solo, "w");
        let result = InstanceCatalog::from_definitions(vec![def.clone(), def]);
        assert!(matches!(result, Err(LoadError::DuplicateInstance(id)) if id == "a"));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(InstanceFile::from_toml("[[instances]]\nid = 3"), Err(LoadError::Parse(_))));
    }
}
