// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::fmt;

/// Visibility marker carried by the auxiliary access row of every record
/// (§3 Access state). A record is visible to subscribers iff it is
/// `Allowed`. Transitions are monotone: once `Deleted`, always `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessState {
    Allowed,
    Blocked,
    Deleted,
}

impl AccessState {
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessState::Allowed => "ALLOWED",
            AccessState::Blocked => "BLOCKED",
            AccessState::Deleted => "DELETED",
        }
    }

    /// `true` once access has left the visible set and can never return.
    pub const fn is_terminal(self) -> bool {
        matches!(self, AccessState::Deleted)
    }

    /// Whether a transition from `self` to `next` is legal under the
    /// monotone state machine in §3: `Deleted` never transitions away.
    pub const fn can_transition_to(self, next: AccessState) -> bool {
        !matches!(self, AccessState::Deleted) || matches!(next, AccessState::Deleted)
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessState {
    type Err = super::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOWED" => Ok(AccessState::Allowed),
            "BLOCKED" => Ok(AccessState::Blocked),
            "DELETED" => Ok(AccessState::Deleted),
            other => Err(super::Error::StoreRead(format!("unknown access state: {other}"))),
        }
    }
}
