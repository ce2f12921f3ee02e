//! Listboard Types - Pure entity definitions
//!
//! This crate contains only passive data types shared by the storage
//! contract, its backends and the presentation layer.

pub mod node;

pub use node::*;
