// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Embedded SQLite store adapter (§4.A): schema management, the
//! single-writer actor, transactional reads, and the settled CDC event
//! stream the rest of the system consumes.

mod adapter;
mod error;
mod schema;
mod time;

pub use adapter::{ChangeEvent, ChangeEvents, RawRecord, SnapshotResult, StoreAdapter, DEFAULT_SETTLE_DELAY};
pub use error::{Result, StoreError};
pub use schema::{access_changes_table, access_table, record_changes_table, record_table};
pub use time::now_millis;
