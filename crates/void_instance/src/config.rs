//! Instance manager configuration

use serde::{Deserialize, Serialize};

use crate::error::LoadResult;

/// Instance manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Game ticks per second; countdown timers fire once per second
    pub ticks_per_second: u64,
    /// Remaining loot-phase seconds at which participants are warned
    pub loot_warning_thresholds: Vec<u32>,
    /// Colour of the instance HUD line (0xRRGGBB)
    pub hud_color: u32,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            loot_warning_thresholds: vec![30, 10, 5],
            hud_color: 0x00FFFF,
        }
    }
}

impl InstanceConfig {
    /// Parse from a TOML string; missing keys keep their defaults
    pub fn from_toml(content: &str) -> LoadResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn is_loot_warning(&self, remaining: u32) -> bool {
        self.loot_warning_thresholds.contains(&remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InstanceConfig::default();
        assert_eq!(config.ticks_per_second, 20);
        assert!(config.is_loot_warning(30));
        assert!(config.is_loot_warning(5));
        assert!(!config.is_loot_warning(20));
    }

    #[test]
    fn test_partial_toml() {
        let config = InstanceConfig::from_toml("ticks_per_second = 10").unwrap();
        assert_eq!(config.ticks_per_second, 10);
        assert_eq!(config.loot_warning_thresholds, vec![30, 10, 5]);
    }
}
