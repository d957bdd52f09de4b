//! Instance definitions
//!
//! Definitions are immutable once loaded and shared between runs through
//! `Arc<InstanceDefinition>`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use void_core::Location;
use void_gamestate::CompletionLimit;

use crate::error::{DefinitionError, DefinitionResult};

/// Who an instance is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceType {
    Solo,
    Group,
    Raid,
}

impl InstanceType {
    pub fn is_solo(&self) -> bool {
        matches!(self, Self::Solo)
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solo => write!(f, "SOLO"),
            Self::Group => write!(f, "GROUP"),
            Self::Raid => write!(f, "RAID"),
        }
    }
}

/// Coordinates inside the instance world
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn in_world(&self, world: &str) -> Location {
        Location::new(world, self.x, self.y, self.z)
    }
}

/// Identical creatures spawned together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobPack {
    pub id: String,
    /// Creature type as known to the world service
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    pub position: Position,
}

impl MobPack {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, count: u32, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            count,
            position,
        }
    }
}

/// The instance boss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
}

impl BossDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            position,
        }
    }
}

fn default_chest_kind() -> String {
    "chest".to_string()
}

/// Reward chest opened during the loot phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChestDefinition {
    pub id: String,
    /// Interaction tag the host reports when the chest is used
    pub tag: String,
    pub loot_table: String,
    pub position: Position,
    /// Entity type spawned for the chest
    #[serde(default = "default_chest_kind")]
    pub kind: String,
}

impl ChestDefinition {
    pub fn new(
        id: impl Into<String>,
        tag: impl Into<String>,
        loot_table: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            loot_table: loot_table.into(),
            position,
            kind: default_chest_kind(),
        }
    }
}

fn default_one() -> u32 {
    1
}

fn default_countdown() -> u32 {
    10
}

fn default_loot_phase() -> u32 {
    60
}

/// Static description of a dungeon or raid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDefinition {
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InstanceType,
    #[serde(default = "default_one")]
    pub min_participants: u32,
    #[serde(default = "default_one")]
    pub max_participants: u32,
    /// World the instance takes place in
    pub world: String,
    pub spawn: Position,
    /// Where participants go when they leave (any world)
    pub exit: Location,
    #[serde(default)]
    pub start_quest: Option<String>,
    #[serde(default)]
    pub end_quest: Option<String>,
    #[serde(default = "default_countdown")]
    pub countdown_seconds: u32,
    #[serde(default = "default_loot_phase")]
    pub loot_phase_seconds: u32,
    #[serde(default)]
    pub mobs: Vec<MobPack>,
    #[serde(default)]
    pub boss: Option<BossDefinition>,
    #[serde(default)]
    pub chests: Vec<ChestDefinition>,
    #[serde(default)]
    pub completion_limit: Option<CompletionLimit>,
}

impl InstanceDefinition {
    /// Create a definition with solo bounds and default timings
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: InstanceType, world: impl Into<String>) -> Self {
        let world = world.into();
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            min_participants: 1,
            max_participants: 1,
            exit: Location::new(world.clone(), 0.0, 0.0, 0.0),
            world,
            spawn: Position::default(),
            start_quest: None,
            end_quest: None,
            countdown_seconds: default_countdown(),
            loot_phase_seconds: default_loot_phase(),
            mobs: Vec::new(),
            boss: None,
            chests: Vec::new(),
            completion_limit: None,
        }
    }

    pub fn with_party_size(mut self, min: u32, max: u32) -> Self {
        self.min_participants = min;
        self.max_participants = max;
        self
    }

    pub fn with_spawn(mut self, spawn: Position) -> Self {
        self.spawn = spawn;
        self
    }

    pub fn with_exit(mut self, exit: Location) -> Self {
        self.exit = exit;
        self
    }

    pub fn with_start_quest(mut self, quest: impl Into<String>) -> Self {
        self.start_quest = Some(quest.into());
        self
    }

    pub fn with_end_quest(mut self, quest: impl Into<String>) -> Self {
        self.end_quest = Some(quest.into());
        self
    }

    pub fn with_countdown(mut self, seconds: u32) -> Self {
        self.countdown_seconds = seconds;
        self
    }

    pub fn with_loot_phase(mut self, seconds: u32) -> Self {
        self.loot_phase_seconds = seconds;
        self
    }

    pub fn with_mob_pack(mut self, pack: MobPack) -> Self {
        self.mobs.push(pack);
        self
    }

    pub fn with_boss(mut self, boss: BossDefinition) -> Self {
        self.boss = Some(boss);
        self
    }

    pub fn with_chest(mut self, chest: ChestDefinition) -> Self {
        self.chests.push(chest);
        self
    }

    pub fn with_completion_limit(mut self, max: u32) -> Self {
        self.completion_limit = Some(CompletionLimit::new(max));
        self
    }

    /// Check every load-time invariant
    pub fn validate(&self) -> DefinitionResult<()> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::EmptyId);
        }
        let empty = |field: &'static str| DefinitionError::EmptyField {
            id: self.id.clone(),
            field,
        };
        if self.name.trim().is_empty() {
            return Err(empty("name"));
        }
        if self.world.trim().is_empty() {
            return Err(empty("world"));
        }
        if self.exit.world.trim().is_empty() {
            return Err(empty("exit world"));
        }

        let (min, max) = (self.min_participants, self.max_participants);
        if min < 1 || max < min {
            return Err(DefinitionError::InvalidBounds {
                id: self.id.clone(),
                min,
                max,
            });
        }
        if self.kind.is_solo() && (min != 1 || max != 1) {
            return Err(DefinitionError::SoloBounds {
                id: self.id.clone(),
                min,
                max,
            });
        }

        if let Some(pack) = self.mobs.iter().find(|pack| pack.count == 0) {
            return Err(DefinitionError::EmptyPack {
                id: self.id.clone(),
                pack: pack.id.clone(),
            });
        }

        let mut chest_ids = HashSet::new();
        let mut chest_tags = HashSet::new();
        for chest in &self.chests {
            if !chest_ids.insert(chest.id.as_str()) {
                return Err(DefinitionError::DuplicateChest {
                    id: self.id.clone(),
                    chest: chest.id.clone(),
                });
            }
            if !chest_tags.insert(chest.tag.as_str()) {
                return Err(DefinitionError::DuplicateChestTag {
                    id: self.id.clone(),
                    tag: chest.tag.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn spawn_location(&self) -> Location {
        self.spawn.in_world(&self.world)
    }

    /// Resolve a position inside the instance world
    pub fn location_of(&self, position: &Position) -> Location {
        position.in_world(&self.world)
    }

    /// Creatures spawned by all packs (boss excluded)
    pub fn total_mob_count(&self) -> u32 {
        self.mobs.iter().map(|pack| pack.count).sum()
    }

    pub fn has_boss(&self) -> bool {
        self.boss.is_some()
    }

    pub fn is_valid_party_size(&self, size: usize) -> bool {
        (self.min_participants as usize..=self.max_participants as usize).contains(&size)
    }

    pub fn chest_by_tag(&self, tag: &str) -> Option<&ChestDefinition> {
        self.chests.iter().find(|chest| chest.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypt() -> InstanceDefinition {
        InstanceDefinition::new("crypt", "Forgotten Crypt", InstanceType::Group, "crypt_world")
            .with_party_size(2, 5)
            .with_mob_pack(MobPack::new("skeletons", "skeleton", 4, Position::new(10.0, 64.0, 0.0)))
            .with_mob_pack(MobPack::new("ghouls", "ghoul", 2, Position::new(20.0, 64.0, 0.0)))
            .with_boss(BossDefinition::new("lich", "lich", Position::new(40.0, 70.0, 0.0)))
            .with_chest(ChestDefinition::new("c1", "crypt_chest_1", "crypt_loot", Position::default()))
    }

    #[test]
    fn test_valid_definition() {
        let def = crypt();
        assert!(def.validate().is_ok());
        assert_eq!(def.total_mob_count(), 6);
        assert!(def.has_boss());
        assert!(def.is_valid_party_size(2));
        assert!(def.is_valid_party_size(5));
        assert!(!def.is_valid_party_size(6));
        assert_eq!(def.chest_by_tag("crypt_chest_1").map(|c| c.id.as_str()), Some("c1"));
        assert_eq!(def.spawn_location().world, "crypt_world");
    }

    #[test]
    fn test_bounds_rejected() {
        assert!(matches!(
            crypt().with_party_size(3, 2).validate(),
            Err(DefinitionError::InvalidBounds { min: 3, max: 2, .. })
        ));
        assert!(matches!(
            crypt().with_party_size(0, 2).validate(),
            Err(DefinitionError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_solo_requires_single_participant() {
        let solo = InstanceDefinition::new("trial", "Trial", InstanceType::Solo, "w").with_party_size(1, 2);
        assert!(matches!(solo.validate(), Err(DefinitionError::SoloBounds { .. })));
        let solo = InstanceDefinition::new("trial", "Trial", InstanceType::Solo, "w");
        assert!(solo.validate().is_ok());
    }

    #[test]
    fn test_empty_fields_and_packs() {
        let mut def = crypt();
        def.name = " ".into();
        assert!(matches!(def.validate(), Err(DefinitionError::EmptyField { field: "name", .. })));

        let def = crypt().with_mob_pack(MobPack::new("none", "rat", 0, Position::default()));
        assert!(matches!(def.validate(), Err(DefinitionError::EmptyPack { .. })));
    }

    #[test]
    fn test_duplicate_chests() {
        let def = crypt().with_chest(ChestDefinition::new("c1", "other", "t", Position::default()));
        assert!(matches!(def.validate(), Err(DefinitionError::DuplicateChest { .. })));

        let def = crypt().with_chest(ChestDefinition::new("c2", "crypt_chest_1", "t", Position::default()));
        assert!(matches!(def.validate(), Err(DefinitionError::DuplicateChestTag { .. })));
    }

    #[test]
    fn test_type_display() {
        assert_eq!(InstanceType::Raid.to_string(), "RAID");
        assert!(InstanceType::Solo.is_solo());
    }
}
