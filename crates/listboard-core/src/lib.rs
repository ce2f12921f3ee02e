//! Listboard Core Library
//!
//! Storage contract, error taxonomy and the pure helpers the write path
//! depends on (ordering, markdown rendering, trip codes).

// Re-export pure types from listboard-types
pub use listboard_types::*;

pub mod error;
pub mod order;
pub mod ports;
pub mod render;
pub mod tripcode;

pub use error::{ListboardError, Result};
pub use order::{Direction, OrderBy, OrderColumn, OrderTerm};
pub use ports::{StorageBackend, VoteBump};
