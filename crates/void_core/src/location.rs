//! World locations

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in a named world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World name
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    /// Create a new location
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Same coordinates in another world
    pub fn in_world(&self, world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            ..self.clone()
        }
    }

    /// Get coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({:.1}, {:.1}, {:.1})", self.world, self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location() {
        let loc = Location::new("dungeon", 1.0, 64.0, -3.5);
        assert_eq!(loc.coords(), [1.0, 64.0, -3.5]);
        assert_eq!(loc.to_string(), "dungeon@(1.0, 64.0, -3.5)");

        let moved = loc.in_world("overworld");
        assert_eq!(moved.world, "overworld");
        assert_eq!(moved.coords(), loc.coords());
    }
}
