//! Error types for Listboard

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ListboardError>;

#[derive(Error, Debug)]
pub enum ListboardError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Node not found: {domain_id}/{node_id}")]
    NotFound { domain_id: String, node_id: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid order clause: {0}")]
    InvalidOrder(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Tripcode error: {0}")]
    Tripcode(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl ListboardError {
    pub fn not_found(domain_id: &str, node_id: &str) -> Self {
        ListboardError::NotFound {
            domain_id: domain_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ListboardError::NotFound { .. })
    }
}
