//! Void Inventory - Loot Tables and Item Grants
//!
//! This crate decides what a reward chest contains and hands the result to
//! the host's inventory.
//!
//! # Features
//!
//! - Loot tables with independent-chance entries
//! - Inclusive quantity ranges per entry
//! - Seedable roller for deterministic tests
//! - TOML loot table files
//! - [`InventoryService`] contract for granting items
//!
//! # Example
//!
//! ```ignore
//! use void_inventory::prelude::*;
//!
//! let roller = LootRoller::new();
//! roller.register(
//!     LootTable::new("crypt_chest")
//!         .with_entry(LootEntry::new("gold_coin", 5, 20, 1.0))
//!         .with_entry(LootEntry::new("bone_blade", 1, 1, 0.1)),
//! )?;
//!
//! for drop in roller.roll("crypt_chest") {
//!     inventory.grant_item(player, &drop.item, drop.quantity)?;
//! }
//! ```

pub mod loot;
pub mod roller;
pub mod service;

pub mod prelude {
    pub use crate::loot::{LootDrop, LootEntry, LootError, LootResult, LootTable};
    pub use crate::roller::{LootFile, LootRoller};
    pub use crate::service::InventoryService;
}

pub use prelude::*;
