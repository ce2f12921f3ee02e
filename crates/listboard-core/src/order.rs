//! Allow-listed ordering for node queries
//!
//! Callers describe an order as text (`"vote DESC, created"`), but only
//! known column/direction pairs survive parsing. Backends build their
//! clause from the typed value, never from caller text.

use crate::error::{ListboardError, Result};
use listboard_types::Node;
use std::cmp::Ordering;

/// Sortable node columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderColumn {
    Id,
    Vote,
    Created,
    Updated,
    Title,
    Level,
}

impl OrderColumn {
    pub fn column_name(self) -> &'static str {
        match self {
            OrderColumn::Id => "id",
            OrderColumn::Vote => "vote",
            OrderColumn::Created => "created",
            OrderColumn::Updated => "updated",
            OrderColumn::Title => "title",
            OrderColumn::Level => "level",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "id" => Some(OrderColumn::Id),
            "vote" => Some(OrderColumn::Vote),
            "created" => Some(OrderColumn::Created),
            "updated" => Some(OrderColumn::Updated),
            "title" => Some(OrderColumn::Title),
            "level" => Some(OrderColumn::Level),
            _ => None,
        }
    }

    fn compare(self, a: &Node, b: &Node) -> Ordering {
        match self {
            OrderColumn::Id => a.id.cmp(&b.id),
            OrderColumn::Vote => a.vote.cmp(&b.vote),
            OrderColumn::Created => a.created.cmp(&b.created),
            OrderColumn::Updated => a.updated.cmp(&b.updated),
            OrderColumn::Title => a.title.cmp(&b.title),
            OrderColumn::Level => a.level.cmp(&b.level),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderTerm {
    pub column: OrderColumn,
    pub direction: Direction,
}

/// Validated sort expression, usable as part of a cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    terms: Vec<OrderTerm>,
}

impl OrderBy {
    pub fn new(terms: Vec<OrderTerm>) -> Result<Self> {
        if terms.is_empty() {
            return Err(ListboardError::InvalidOrder(
                "at least one term is required".to_string(),
            ));
        }
        Ok(Self { terms })
    }

    /// Single-column order
    pub fn by(column: OrderColumn, direction: Direction) -> Self {
        Self {
            terms: vec![OrderTerm { column, direction }],
        }
    }

    /// Newest first, as used by feeds
    pub fn newest() -> Self {
        Self::by(OrderColumn::Created, Direction::Desc)
    }

    /// Highest vote first, oldest first among equals
    pub fn top_voted() -> Self {
        Self {
            terms: vec![
                OrderTerm {
                    column: OrderColumn::Vote,
                    direction: Direction::Desc,
                },
                OrderTerm {
                    column: OrderColumn::Created,
                    direction: Direction::Asc,
                },
            ],
        }
    }

    /// Parse `"col [ASC|DESC], ..."` against the allow-list
    pub fn parse(input: &str) -> Result<Self> {
        let mut terms = Vec::new();
        for raw in input.split(',') {
            let tokens: Vec<&str> = raw.split_whitespace().collect();
            let (column, direction) = match tokens.as_slice() {
                [column] => (*column, None),
                [column, direction] => (*column, Some(*direction)),
                _ => {
                    return Err(ListboardError::InvalidOrder(format!(
                        "malformed term '{}'",
                        raw.trim()
                    )))
                }
            };

            let column = OrderColumn::parse(column).ok_or_else(|| {
                ListboardError::InvalidOrder(format!("unknown column '{}'", column))
            })?;
            let direction = match direction.map(|d| d.to_ascii_uppercase()) {
                None => Direction::Asc,
                Some(d) if d == "ASC" => Direction::Asc,
                Some(d) if d == "DESC" => Direction::Desc,
                Some(d) => {
                    return Err(ListboardError::InvalidOrder(format!(
                        "unknown direction '{}'",
                        d
                    )))
                }
            };
            terms.push(OrderTerm { column, direction });
        }
        Self::new(terms)
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    /// ORDER BY body with columns qualified by `table`. An `id` tiebreak is
    /// appended so windowed reads page deterministically.
    pub fn sql_clause(&self, table: &str) -> String {
        let mut parts: Vec<String> = self
            .terms
            .iter()
            .map(|t| {
                format!(
                    "{}.{} {}",
                    table,
                    t.column.column_name(),
                    t.direction.keyword()
                )
            })
            .collect();
        if !self.terms.iter().any(|t| t.column == OrderColumn::Id) {
            parts.push(format!("{}.id ASC", table));
        }
        parts.join(", ")
    }

    /// In-process comparator matching `sql_clause`, minus the id tiebreak
    pub fn compare(&self, a: &Node, b: &Node) -> Ordering {
        for term in &self.terms {
            let ord = term.column.compare(a, b);
            let ord = match term.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::by(OrderColumn::Created, Direction::Asc)
    }
}

impl std::str::FromStr for OrderBy {
    type Err = ListboardError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .terms
            .iter()
            .map(|t| format!("{} {}", t.column.column_name(), t.direction.keyword()))
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}
