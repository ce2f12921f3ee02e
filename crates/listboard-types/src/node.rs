//! Node types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque node identifier, unique within a domain
pub type NodeId = String;

/// Tenant key
pub type DomainId = String;

/// Parent id of every top-level list
pub const ROOT_NODE_ID: &str = "0";

/// Depth of a node in the list -> item -> reply hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    List,
    Item,
    Reply,
}

impl Level {
    pub fn as_i32(self) -> i32 {
        match self {
            Level::List => 0,
            Level::Item => 1,
            Level::Reply => 2,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Level::List),
            1 => Some(Level::Item),
            2 => Some(Level::Reply),
            _ => None,
        }
    }

    /// Level a child of this node must carry; replies are leaves
    pub fn child(self) -> Option<Self> {
        match self {
            Level::List => Some(Level::Item),
            Level::Item => Some(Level::Reply),
            Level::Reply => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::List => write!(f, "list"),
            Level::Item => write!(f, "item"),
            Level::Reply => write!(f, "reply"),
        }
    }
}

/// Soft-delete flag; only enabled nodes are visible to reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Disabled,
    #[default]
    Enabled,
}

impl Status {
    pub fn as_i32(self) -> i32 {
        match self {
            Status::Disabled => 0,
            Status::Enabled => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Status::Disabled),
            1 => Some(Status::Enabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Disabled => write!(f, "disabled"),
            Status::Enabled => write!(f, "enabled"),
        }
    }
}

/// A post in a tenant's board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub domain_id: DomainId,
    pub title: String,
    /// Net tally on items; vote activity count on lists
    pub vote: i64,
    pub tripcode: String,
    /// Raw author-supplied markdown
    pub body: String,
    /// Sanitized HTML derived from `body`
    pub rendered: String,
    pub status: Status,
    pub level: Level,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Node {
    /// Unsaved node; `id` and timestamps are assigned by the store
    pub fn new(
        domain_id: impl Into<DomainId>,
        parent_id: impl Into<NodeId>,
        level: Level,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            parent_id: parent_id.into(),
            domain_id: domain_id.into(),
            title: title.into(),
            vote: 0,
            tripcode: String::new(),
            body: String::new(),
            rendered: String::new(),
            status: Status::Enabled,
            level,
            created: now,
            updated: now,
        }
    }

    pub fn is_root_child(&self) -> bool {
        self.parent_id == ROOT_NODE_ID
    }

    /// Site-relative path of the page showing this node
    pub fn path(&self) -> String {
        match self.level {
            Level::List => format!("/list/{}/", self.id),
            Level::Item => format!("/vote/{}/vote.html", self.id),
            Level::Reply => format!("/vote/{}/vote.html#I{}", self.parent_id, self.id),
        }
    }
}

/// Ordered node sequence; order comes from the query, not the list
pub type NodeList = Vec<Node>;
