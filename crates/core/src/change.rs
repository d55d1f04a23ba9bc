// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::fmt;

/// Which of the two per-collection change logs a CDC event came from
/// (§3 Change record: "There are two change logs: one for the record
/// table, one for the access table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Record,
    Access,
}

impl TableKind {
    /// Suffix appended to the collection name to build the physical
    /// change-log table name, e.g. `kv_changes` / `kv_access_changes`.
    pub const fn log_suffix(self) -> &'static str {
        match self {
            TableKind::Record => "_changes",
            TableKind::Access => "_access_changes",
        }
    }
}

/// The SQLite operation that produced a change-log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeOperation::Insert => "INSERT",
            ChangeOperation::Update => "UPDATE",
            ChangeOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeOperation {
    type Err = super::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(ChangeOperation::Insert),
            "UPDATE" => Ok(ChangeOperation::Update),
            "DELETE" => Ok(ChangeOperation::Delete),
            other => Err(super::Error::StoreRead(format!("unknown change operation: {other}"))),
        }
    }
}

/// One durable row from a `*_changes` log table (§3 Change record): the
/// store's account of a single committed mutation, carrying before/after
/// JSON snapshots of the affected row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub row_id: i64,
    pub key: String,
    pub operation: ChangeOperation,
    pub before: Option<String>,
    pub after: Option<String>,
    pub originated_at: i64,
}
