//! Row-level change notifications from the persistence store
//!
//! Postgres triggers and the in-memory store both emit `RowChange` values.
//! Rows arrive as JSON; Postgres renders ids as numbers while serialized
//! entities render them as strings, so filter comparison is done on the
//! scalar's text form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;

/// Watched tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Requests,
    Offers,
    Chats,
    Messages,
    Reviews,
    Payments,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Self::Requests,
        Self::Offers,
        Self::Chats,
        Self::Messages,
        Self::Reviews,
        Self::Payments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::Offers => "offers",
            Self::Chats => "chats",
            Self::Messages => "messages",
            Self::Reviews => "reviews",
            Self::Payments => "payments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown table: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One mutated row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: Table,
    pub op: ChangeOp,
    pub row: Value,
}

impl RowChange {
    pub fn new(table: Table, op: ChangeOp, row: Value) -> Self {
        Self { table, op, row }
    }

    /// Column value as text, if the column holds a scalar
    pub fn column(&self, name: &str) -> Option<String> {
        scalar_text(self.row.get(name)?)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// What a change feed delivers to each receiver
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Row(RowChange),
    /// The source reconnected and changes may have been missed in between
    Resync,
}

impl From<RowChange> for FeedEvent {
    fn from(change: RowChange) -> Self {
        Self::Row(change)
    }
}

/// Table plus optional `column = value` equality filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub eq: Option<(String, String)>,
}

impl ChangeFilter {
    /// Every change on a table
    pub fn table(table: Table) -> Self {
        Self { table, eq: None }
    }

    /// Changes on a table where `column = value`
    pub fn eq(table: Table, column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            table,
            eq: Some((column.into(), value.to_string())),
        }
    }

    pub fn matches(&self, change: &RowChange) -> bool {
        if change.table != self.table {
            return false;
        }
        match &self.eq {
            None => true,
            Some((column, expected)) => change.column(column).as_deref() == Some(expected.as_str()),
        }
    }
}
