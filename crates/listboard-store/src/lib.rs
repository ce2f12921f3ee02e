//! Listboard storage layer
//!
//! Storage backends, the read cache, and the model façade the
//! presentation layer talks to.

pub mod model;
pub mod settings;
pub mod spamguard;
pub mod storage;

pub use model::Model;
pub use settings::Settings;
pub use spamguard::SpamGuard;
pub use storage::{open, CachedStore, MemoryStore, PostgresStore, SqliteStore, StorageConfig};
