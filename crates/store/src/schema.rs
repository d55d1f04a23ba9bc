// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Per-collection schema: the record table, its access table, and the
//! two append-only change-log tables, wired together with triggers that
//! populate the change logs (§3 Change record, §6 Persisted state).
//!
//! Application fields are kept in a single `fields` JSON column rather
//! than one physical column per field, so the same schema serves any
//! collection the registry names, not just the reference `kv` one.

use rusqlite::{Connection, params};

use crate::error::Result;

pub fn record_table(collection: &str) -> String {
    collection.to_string()
}

pub fn access_table(collection: &str) -> String {
    format!("{collection}_access")
}

pub fn record_changes_table(collection: &str) -> String {
    format!("{collection}_changes")
}

pub fn access_changes_table(collection: &str) -> String {
    format!("{collection}_access_changes")
}

/// Apply the schema for one collection if it is not already present.
/// Migration is idempotent: if both change-log tables already exist for
/// this collection, nothing is done (§6 "Schema migration on first
/// startup is idempotent").
pub fn apply_collection_schema(conn: &Connection, collection: &str) -> Result<()> {
    let changes = record_changes_table(collection);
    let access_changes = access_changes_table(collection);

    let existing: i64 = conn.query_row(
        "SELECT count(name) FROM sqlite_master WHERE type = 'table' AND name IN (?1, ?2)",
        params![changes, access_changes],
        |row| row.get(0),
    )?;
    if existing == 2 {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&collection_schema_sql(collection))?;
    tx.commit()?;
    Ok(())
}

fn collection_schema_sql(collection: &str) -> String {
    let record = record_table(collection);
    let access = access_table(collection);
    let changes = record_changes_table(collection);
    let access_changes = access_changes_table(collection);

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {record} (
            key TEXT PRIMARY KEY,
            fields TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {access} (
            kv_key TEXT PRIMARY KEY,
            access TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {changes} (
            key TEXT NOT NULL,
            operation TEXT NOT NULL,
            before TEXT,
            after TEXT,
            originated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {access_changes} (
            key TEXT NOT NULL,
            operation TEXT NOT NULL,
            before TEXT,
            after TEXT,
            originated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS {record}_updated_at_idx ON {record}(updated_at);
        CREATE INDEX IF NOT EXISTS {access}_updated_at_idx ON {access}(updated_at);

        CREATE TRIGGER IF NOT EXISTS {record}_changes_insert
        AFTER INSERT ON {record}
        BEGIN
            INSERT INTO {changes} (key, operation, before, after, originated_at)
            VALUES (
                NEW.key,
                'INSERT',
                NULL,
                json_patch(json_object('id', NEW.key, 'created_at', NEW.created_at, 'updated_at', NEW.updated_at), NEW.fields),
                NEW.updated_at + 1
            );
        END;

        CREATE TRIGGER IF NOT EXISTS {record}_changes_update
        AFTER UPDATE ON {record}
        BEGIN
            INSERT INTO {changes} (key, operation, before, after, originated_at)
            VALUES (
                NEW.key,
                'UPDATE',
                json_patch(json_object('id', OLD.key, 'created_at', OLD.created_at, 'updated_at', OLD.updated_at), OLD.fields),
                json_patch(json_object('id', NEW.key, 'created_at', NEW.created_at, 'updated_at', NEW.updated_at), NEW.fields),
                NEW.updated_at + 1
            );
        END;

        CREATE TRIGGER IF NOT EXISTS {record}_changes_delete
        AFTER DELETE ON {record}
        BEGIN
            INSERT INTO {changes} (key, operation, before, after, originated_at)
            VALUES (
                OLD.key,
                'DELETE',
                json_patch(json_object('id', OLD.key, 'created_at', OLD.created_at, 'updated_at', OLD.updated_at), OLD.fields),
                NULL,
                OLD.updated_at + 1
            );
        END;

        CREATE TRIGGER IF NOT EXISTS {access}_changes_insert
        AFTER INSERT ON {access}
        BEGIN
            INSERT INTO {access_changes} (key, operation, before, after, originated_at)
            VALUES (NEW.kv_key, 'INSERT', NULL, json_object('access', NEW.access), NEW.updated_at + 1);
        END;

        CREATE TRIGGER IF NOT EXISTS {access}_changes_update
        AFTER UPDATE ON {access}
        BEGIN
            INSERT INTO {access_changes} (key, operation, before, after, originated_at)
            VALUES (
                NEW.kv_key,
                'UPDATE',
                json_object('access', OLD.access),
                json_object('access', NEW.access),
                NEW.updated_at + 1
            );
        END;
        "#
    )
}

/// Drain both change-log tables on startup (§6: "Change-log tables are
/// drained on normal startup").
pub fn cleanup_collection_changes(conn: &Connection, collection: &str) -> Result<()> {
    conn.execute(&format!("DELETE FROM {}", record_changes_table(collection)), [])?;
    conn.execute(&format!("DELETE FROM {}", access_changes_table(collection)), [])?;
    Ok(())
}
