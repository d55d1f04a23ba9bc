// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The store adapter (§4.A). Owns the single writer connection to the
//! embedded SQLite file on a dedicated thread (rusqlite's `Connection`
//! is not `Send` across an `.await`, so it never touches the async
//! runtime directly) and exposes an async request/response API plus the
//! settled `ChangeEvents` stream the dispatcher consumes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use rusqlite::hooks::Action;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use replicore_core::{AccessState, ChangeOperation, ChangeRecord, CollectionRegistry, TableKind};

use crate::error::{Result, StoreError};
use crate::schema::{self, access_changes_table, access_table, record_changes_table, record_table};

/// Default delay between a row mutation being observed by the CDC hook
/// and the corresponding event reaching `ChangeEvents`. Some embedded
/// stores fire the hook fractionally before the row is visible to
/// readers; §4.A calls for a short settle delay to cover that gap.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(5);

const COMMAND_CHANNEL_CAPACITY: usize = 1024;
const CHANGE_EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// A row-level notification, after the settle delay, ready for the
/// dispatcher to act on (§4.A "CDC hook").
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table_kind: TableKind,
    pub collection: String,
    pub row_id: i64,
}

/// A record as stored physically: identity, timestamps and the
/// application field bag, still as a raw JSON value.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub id: String,
    pub fields: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of `ReadSnapshot` (§4.A): the currently visible records plus,
/// when a watermark was given, the tombstones the client needs to learn
/// about.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResult {
    pub records: Vec<RawRecord>,
    pub removed_ids: HashMap<String, i64>,
}

enum Command {
    AddRecord { collection: String, id: String, fields: serde_json::Value, reply: oneshot::Sender<Result<()>> },
    EditRecord { collection: String, id: String, fields: serde_json::Value, reply: oneshot::Sender<Result<u64>> },
    RemoveRecord { collection: String, id: String, reply: oneshot::Sender<Result<()>> },
    SetAccess { collection: String, id: String, state: AccessState, reply: oneshot::Sender<Result<()>> },
    ReadSnapshot { collection: String, since_version: Option<i64>, reply: oneshot::Sender<Result<SnapshotResult>> },
    ReadChangeRecord { table_kind: TableKind, collection: String, row_id: i64, reply: oneshot::Sender<Result<Option<ChangeRecord>>> },
    DeleteChangeRecord { table_kind: TableKind, collection: String, row_id: i64, reply: oneshot::Sender<Result<()>> },
    ReadRecord { collection: String, id: String, reply: oneshot::Sender<Result<Option<RawRecord>>> },
}

/// Handle to the running store. Cheap to clone; every clone shares the
/// same single-writer connection via the command channel.
#[derive(Clone)]
pub struct StoreAdapter {
    registry: CollectionRegistry,
    cmd_tx: mpsc::Sender<Command>,
}

/// The settled CDC event stream. There is exactly one consumer: the
/// orchestrator's change-dispatch loop (§4.E).
pub struct ChangeEvents {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl ChangeEvents {
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl StoreAdapter {
    /// Open (and, if needed, migrate and drain) the store at `path` for
    /// every collection in `registry`, then start the writer thread and
    /// the CDC settle-delay forwarder.
    #[instrument(skip(registry), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>, registry: CollectionRegistry, settle_delay: Duration) -> Result<(Self, ChangeEvents)> {
        let path = path.as_ref().to_path_buf();
        let collections: Vec<String> = registry.current_names().map(str::to_string).collect();

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<(TableKind, String, i64)>();
        let (events_tx, events_rx) = mpsc::channel(CHANGE_EVENT_CHANNEL_CAPACITY);

        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("replicore-store".into())
            .spawn(move || run_writer(&path, &collections, cmd_rx, raw_tx, ready_tx))
            .expect("failed to spawn store writer thread");

        ready_rx.await.map_err(|_| StoreError::WorkerGone)??;

        tokio::spawn(async move {
            while let Some((table_kind, collection, row_id)) = raw_rx.recv().await {
                let events_tx = events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(settle_delay).await;
                    if events_tx.send(ChangeEvent { table_kind, collection, row_id }).await.is_err() {
                        debug!("change event dropped: no consumer left");
                    }
                });
            }
        });

        Ok((Self { registry, cmd_tx }, ChangeEvents { rx: events_rx }))
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx.send(build(reply_tx)).await.map_err(|_| StoreError::WorkerGone)?;
        reply_rx.await.map_err(|_| StoreError::WorkerGone)?
    }

    /// Insert a record and its `ALLOWED` access row as a single
    /// transaction (§4.A `AddRecord`).
    pub async fn add_record(&self, collection: &str, id: &str, fields: serde_json::Value) -> Result<()> {
        self.call(|reply| Command::AddRecord { collection: collection.into(), id: id.into(), fields, reply }).await
    }

    /// Returns the number of affected rows (0 means "not found").
    pub async fn edit_record(&self, collection: &str, id: &str, fields: serde_json::Value) -> Result<u64> {
        self.call(|reply| Command::EditRecord { collection: collection.into(), id: id.into(), fields, reply }).await
    }

    pub async fn remove_record(&self, collection: &str, id: &str) -> Result<()> {
        self.call(|reply| Command::RemoveRecord { collection: collection.into(), id: id.into(), reply }).await
    }

    /// Sets access to `BLOCKED` (§4.A `RevokeAccess`).
    pub async fn revoke_access(&self, collection: &str, id: &str) -> Result<()> {
        self.set_access(collection, id, AccessState::Blocked).await
    }

    /// General access-state transition, used by `revoke_access` and by
    /// tests exercising the `Deleted` / "un-remove" paths (§9).
    pub async fn set_access(&self, collection: &str, id: &str, state: AccessState) -> Result<()> {
        self.call(|reply| Command::SetAccess { collection: collection.into(), id: id.into(), state, reply }).await
    }

    pub async fn read_snapshot(&self, collection: &str, since_version: Option<i64>) -> Result<SnapshotResult> {
        self.call(|reply| Command::ReadSnapshot { collection: collection.into(), since_version, reply }).await
    }

    pub async fn read_change_record(&self, table_kind: TableKind, collection: &str, row_id: i64) -> Result<Option<ChangeRecord>> {
        self.call(|reply| Command::ReadChangeRecord { table_kind, collection: collection.into(), row_id, reply }).await
    }

    pub async fn delete_change_record(&self, table_kind: TableKind, collection: &str, row_id: i64) -> Result<()> {
        self.call(|reply| Command::DeleteChangeRecord { table_kind, collection: collection.into(), row_id, reply }).await
    }

    pub async fn read_record(&self, collection: &str, id: &str) -> Result<Option<RawRecord>> {
        self.call(|reply| Command::ReadRecord { collection: collection.into(), id: id.into(), reply }).await
    }
}

fn run_writer(
    path: &Path,
    collections: &[String],
    mut cmd_rx: mpsc::Receiver<Command>,
    raw_tx: mpsc::UnboundedSender<(TableKind, String, i64)>,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let conn = match open_and_migrate(path, collections) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    register_update_hook(&conn, collections, raw_tx);
    let _ = ready_tx.send(Ok(()));

    let known: HashSet<String> = collections.iter().cloned().collect();
    while let Some(command) = cmd_rx.blocking_recv() {
        handle_command(&conn, command, &known);
    }
    debug!("store writer thread exiting");
}

fn open_and_migrate(path: &Path, collections: &[String]) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = OFF;")?;

    for collection in collections {
        schema::apply_collection_schema(&conn, collection)?;
        schema::cleanup_collection_changes(&conn, collection)?;
    }
    Ok(conn)
}

fn register_update_hook(conn: &Connection, collections: &[String], raw_tx: mpsc::UnboundedSender<(TableKind, String, i64)>) {
    let mut table_map: HashMap<String, (TableKind, String)> = HashMap::with_capacity(collections.len() * 2);
    for collection in collections {
        table_map.insert(record_changes_table(collection), (TableKind::Record, collection.clone()));
        table_map.insert(access_changes_table(collection), (TableKind::Access, collection.clone()));
    }

    conn.update_hook(Some(move |action: Action, _db: &str, table: &str, row_id: i64| {
        // Physical deletes of change-log rows are the dispatcher's own
        // cleanup; publishing them would feed back into itself (§9).
        if action == Action::SQLITE_DELETE {
            return;
        }
        let Some((table_kind, collection)) = table_map.get(table) else {
            return;
        };
        if raw_tx.send((*table_kind, collection.clone(), row_id)).is_err() {
            warn!("change event forwarder is gone, dropping event for {table}");
        }
    }));
}

fn handle_command(conn: &Connection, command: Command, known: &HashSet<String>) {
    match command {
        Command::AddRecord { collection, id, fields, reply } => {
            let _ = reply.send(add_record(conn, &collection, &id, &fields));
        }
        Command::EditRecord { collection, id, fields, reply } => {
            let _ = reply.send(edit_record(conn, &collection, &id, &fields));
        }
        Command::RemoveRecord { collection, id, reply } => {
            let _ = reply.send(remove_record(conn, &collection, &id));
        }
        Command::SetAccess { collection, id, state, reply } => {
            let _ = reply.send(set_access(conn, &collection, &id, state));
        }
        Command::ReadSnapshot { collection, since_version, reply } => {
            let _ = reply.send(read_snapshot(conn, &collection, since_version, known));
        }
        Command::ReadChangeRecord { table_kind, collection, row_id, reply } => {
            let _ = reply.send(read_change_record(conn, table_kind, &collection, row_id));
        }
        Command::DeleteChangeRecord { table_kind, collection, row_id, reply } => {
            let _ = reply.send(delete_change_record(conn, table_kind, &collection, row_id));
        }
        Command::ReadRecord { collection, id, reply } => {
            let _ = reply.send(read_record(conn, &collection, &id));
        }
    }
}

fn add_record(conn: &Connection, collection: &str, id: &str, fields: &serde_json::Value) -> Result<()> {
    let now = crate::time::now_millis();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!("INSERT INTO {} (key, fields, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)", record_table(collection)),
        params![id, fields.to_string(), now],
    )?;
    tx.execute(
        &format!("INSERT INTO {} (kv_key, access, updated_at) VALUES (?1, ?2, ?3)", access_table(collection)),
        params![id, AccessState::Allowed.as_str(), now],
    )?;
    tx.commit()?;
    Ok(())
}

/// `updated_at` is stamped with `max(now, previous + 1)` so it is always
/// strictly greater than its prior value (§3 invariant) even when several
/// edits land within the same millisecond.
fn edit_record(conn: &Connection, collection: &str, id: &str, fields: &serde_json::Value) -> Result<u64> {
    let now = crate::time::now_millis();
    let affected = conn.execute(
        &format!(
            "UPDATE {} SET fields = ?1, updated_at = CASE WHEN ?2 > updated_at THEN ?2 ELSE updated_at + 1 END WHERE key = ?3",
            record_table(collection)
        ),
        params![fields.to_string(), now, id],
    )?;
    Ok(affected as u64)
}

fn remove_record(conn: &Connection, collection: &str, id: &str) -> Result<()> {
    conn.execute(&format!("DELETE FROM {} WHERE key = ?1", record_table(collection)), params![id])?;
    Ok(())
}

fn set_access(conn: &Connection, collection: &str, id: &str, state: AccessState) -> Result<()> {
    let current: Option<String> = conn
        .query_row(&format!("SELECT access FROM {} WHERE kv_key = ?1", access_table(collection)), params![id], |row| row.get(0))
        .optional()?;

    let Some(current) = current else {
        return Ok(());
    };
    let current_state: AccessState = current.parse().map_err(|_| StoreError::InvalidAccessState(current.clone()))?;
    if current_state == state || !current_state.can_transition_to(state) {
        return Ok(());
    }

    let now = crate::time::now_millis();
    conn.execute(
        &format!(
            "UPDATE {} SET access = ?1, updated_at = CASE WHEN ?2 > updated_at THEN ?2 ELSE updated_at + 1 END WHERE kv_key = ?3",
            access_table(collection)
        ),
        params![state.as_str(), now, id],
    )?;
    Ok(())
}

/// `known` is the set of collections the store actually has a schema for
/// (§4.A "Request for an unknown collection name: fails with
/// `UnknownCollection`") — checked before any SQL is built so an
/// unrecognised name never surfaces as a raw `rusqlite` "no such table"
/// error.
fn read_snapshot(conn: &Connection, collection: &str, since_version: Option<i64>, known: &HashSet<String>) -> Result<SnapshotResult> {
    if !known.contains(collection) {
        return Err(StoreError::UnknownCollection(collection.to_string()));
    }

    let mut records = Vec::new();
    {
        let sql = match since_version {
            Some(_) => format!(
                "SELECT r.key, r.fields, r.created_at, r.updated_at FROM {access} a \
                 INNER JOIN {record} r ON r.key = a.kv_key \
                 WHERE a.access = ?1 AND r.updated_at > ?2",
                access = access_table(collection),
                record = record_table(collection),
            ),
            None => format!(
                "SELECT r.key, r.fields, r.created_at, r.updated_at FROM {access} a \
                 INNER JOIN {record} r ON r.key = a.kv_key \
                 WHERE a.access = ?1",
                access = access_table(collection),
                record = record_table(collection),
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![AccessState::Allowed.as_str(), since_version.unwrap_or_default()], |row| {
            let fields_raw: String = row.get(1)?;
            Ok((row.get::<_, String>(0)?, fields_raw, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?))
        })?;
        for row in rows {
            let (id, fields_raw, created_at, updated_at) = row?;
            let fields = serde_json::from_str(&fields_raw)?;
            records.push(RawRecord { id, fields, created_at, updated_at });
        }
    }

    let mut removed_ids = HashMap::new();
    if let Some(since) = since_version {
        let sql = format!(
            "SELECT kv_key, updated_at FROM {access} WHERE access IN (?1, ?2) AND updated_at >= ?3",
            access = access_table(collection)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![AccessState::Blocked.as_str(), AccessState::Deleted.as_str(), since], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, updated_at) = row?;
            removed_ids.insert(id, updated_at);
        }
    }

    Ok(SnapshotResult { records, removed_ids })
}

fn read_change_record(conn: &Connection, table_kind: TableKind, collection: &str, row_id: i64) -> Result<Option<ChangeRecord>> {
    let table = match table_kind {
        TableKind::Record => record_changes_table(collection),
        TableKind::Access => access_changes_table(collection),
    };
    conn.query_row(
        &format!("SELECT rowid, key, operation, before, after, originated_at FROM {table} WHERE rowid = ?1"),
        params![row_id],
        |row| {
            let operation: String = row.get(2)?;
            Ok(ChangeRecord {
                row_id: row.get(0)?,
                key: row.get(1)?,
                operation: operation.parse().unwrap_or(ChangeOperation::Update),
                before: row.get(3)?,
                after: row.get(4)?,
                originated_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

fn delete_change_record(conn: &Connection, table_kind: TableKind, collection: &str, row_id: i64) -> Result<()> {
    let table = match table_kind {
        TableKind::Record => record_changes_table(collection),
        TableKind::Access => access_changes_table(collection),
    };
    conn.execute(&format!("DELETE FROM {table} WHERE rowid = ?1"), params![row_id])?;
    Ok(())
}

fn read_record(conn: &Connection, collection: &str, id: &str) -> Result<Option<RawRecord>> {
    conn.query_row(
        &format!("SELECT key, fields, created_at, updated_at FROM {} WHERE key = ?1", record_table(collection)),
        params![id],
        |row| {
            let fields_raw: String = row.get(1)?;
            Ok((row.get::<_, String>(0)?, fields_raw, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?))
        },
    )
    .optional()?
    .map(|(id, fields_raw, created_at, updated_at)| -> Result<RawRecord> {
        Ok(RawRecord { id, fields: serde_json::from_str(&fields_raw)?, created_at, updated_at })
    })
    .transpose()
}
