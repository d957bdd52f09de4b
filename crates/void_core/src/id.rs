//! Typed identifiers for participants, entities and groups

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create from a raw value
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value
            #[inline]
            pub const fn raw(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_id!(
    /// A connected player taking part in gameplay
    ParticipantId,
    "participant#"
);

define_id!(
    /// A world entity (mob, boss, chest) spawned by the server
    EntityId,
    "entity#"
);

define_id!(
    /// A party/group as known to the group service
    GroupId,
    "group#"
);

/// Thread-safe entity id generator
///
/// World implementations hand out ids from one of these so that every
/// spawned entity is unique for the lifetime of the process.
pub struct EntityIdGenerator {
    next: AtomicU64,
}

impl EntityIdGenerator {
    /// Create a generator starting at 1
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Generate the next unique id
    pub fn next(&self) -> EntityId {
        EntityId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntityIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ParticipantId::new(7).to_string(), "participant#7");
        assert_eq!(EntityId::new(3).to_string(), "entity#3");
        assert_eq!(format!("{:?}", GroupId::new(1)), "GroupId(1)");
    }

    #[test]
    fn test_entity_id_generator() {
        let gen = EntityIdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
    }
}
