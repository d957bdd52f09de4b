//! Void GameState - Completion History
//!
//! This crate records how often each participant finished each instance.
//!
//! # Features
//!
//! - Pluggable [`CompletionStore`] trait (hosts bring their own persistence)
//! - [`InMemoryCompletionStore`] with JSON snapshots
//! - [`CompletionLimit`] for capped instances
//!
//! Reset periods (daily/weekly lockouts) belong to the store: a host that
//! wants them clears counts on its own schedule with
//! [`CompletionStore::reset`].
//!
//! # Example
//!
//! ```ignore
//! use void_gamestate::prelude::*;
//!
//! let store = InMemoryCompletionStore::new();
//! store.record_completion(player, "crypt");
//!
//! let limit = CompletionLimit::new(1);
//! assert!(limit.is_reached(store.completion_count(player, "crypt")));
//!
//! std::fs::write("completions.json", store.to_json()?)?;
//! ```

pub mod completion;

pub mod prelude {
    pub use crate::completion::{
        CompletionError, CompletionLimit, CompletionRecord, CompletionStore, InMemoryCompletionStore,
    };
}

pub use prelude::*;
