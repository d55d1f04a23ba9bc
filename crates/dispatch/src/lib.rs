// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The change dispatcher (§4.D): turns one settled CDC event into zero
//! or one public `change` frame and broadcasts it, then unconditionally
//! retires the change record that produced it.

use replicore_core::{ChangeOperation, ChangeType, Item, ServerMessage, TableKind};
use replicore_session::SessionManager;
use replicore_store::{ChangeEvent, StoreAdapter};
use tracing::{debug, error, warn};

/// Consume one settled CDC event: classify it, broadcast the resulting
/// frame if any, and always delete the change record that produced it
/// (§4.D step 4 — runs even when no frame was emitted).
pub async fn dispatch_event(store: &StoreAdapter, sessions: &SessionManager, event: ChangeEvent) {
    let message = match resolve(store, &event).await {
        Ok(message) => message,
        Err(err) => {
            warn!(collection = %event.collection, row_id = event.row_id, error = %err, "skipping change event");
            None
        }
    };

    if let Some(message) = message {
        match serde_json::to_string(&message) {
            Ok(frame) => sessions.broadcast(frame).await,
            Err(err) => error!(error = %err, "failed to serialise change frame"),
        }
    }

    if let Err(err) = store.delete_change_record(event.table_kind, &event.collection, event.row_id).await {
        error!(collection = %event.collection, row_id = event.row_id, error = %err, "failed to delete change record");
    }
}

async fn resolve(store: &StoreAdapter, event: &ChangeEvent) -> replicore_core::Result<Option<ServerMessage>> {
    let Some(change) = store.read_change_record(event.table_kind, &event.collection, event.row_id).await.map_err(Into::into)? else {
        // Already deleted by a prior raced pass; treat as idempotent success.
        return Ok(None);
    };

    match event.table_kind {
        TableKind::Record => resolve_record_change(&event.collection, change),
        TableKind::Access => resolve_access_change(store, &event.collection, change).await,
    }
}

fn resolve_record_change(collection: &str, change: replicore_core::ChangeRecord) -> replicore_core::Result<Option<ServerMessage>> {
    let change_type = match change.operation {
        ChangeOperation::Insert => ChangeType::Create,
        ChangeOperation::Update => ChangeType::Update,
        ChangeOperation::Delete => ChangeType::Remove,
    };

    let before = decode_item(&change.key, change.before.as_deref())?;
    let after = decode_item(&change.key, change.after.as_deref())?;

    Ok(Some(ServerMessage::Change {
        collection_name: collection.to_string(),
        change_type,
        id: change.key,
        updated_at: change.originated_at,
        before,
        after,
    }))
}

async fn resolve_access_change(
    store: &StoreAdapter,
    collection: &str,
    change: replicore_core::ChangeRecord,
) -> replicore_core::Result<Option<ServerMessage>> {
    match change.operation {
        ChangeOperation::Insert => {
            debug!(id = %change.key, "suppressing access INSERT; the paired record INSERT is canonical");
            Ok(None)
        }
        ChangeOperation::Delete => {
            // The store layer never physically deletes access rows (§4.D
            // "DELETE forbidden at the store layer"); nothing to resolve.
            warn!(id = %change.key, "observed unexpected DELETE on an access table");
            Ok(None)
        }
        ChangeOperation::Update => {
            let Some(after_raw) = change.after.as_deref() else {
                return Ok(None);
            };
            let access: AccessSnapshot = serde_json::from_str(after_raw).map_err(|e| replicore_core::Error::StoreRead(e.to_string()))?;

            let change_type = match access.access {
                replicore_core::AccessState::Deleted => return Ok(None),
                replicore_core::AccessState::Blocked => ChangeType::Remove,
                replicore_core::AccessState::Allowed => ChangeType::Create,
            };

            let Some(record) = store.read_record(collection, &change.key).await.map_err(Into::into)? else {
                return Err(replicore_core::Error::MissingRecordOnAccessChange(change.key));
            };
            let fields = record.fields.as_object().cloned().unwrap_or_default();
            let item = Item::new(record.id, record.created_at, record.updated_at, fields);

            let (before, after) = match change_type {
                ChangeType::Remove => (Some(item), None),
                _ => (None, Some(item)),
            };

            Ok(Some(ServerMessage::Change {
                collection_name: collection.to_string(),
                change_type,
                id: change.key,
                updated_at: change.originated_at,
                before,
                after,
            }))
        }
    }
}

#[derive(serde::Deserialize)]
struct AccessSnapshot {
    access: replicore_core::AccessState,
}

fn decode_item(id: &str, raw: Option<&str>) -> replicore_core::Result<Option<Item>> {
    let Some(raw) = raw else { return Ok(None) };
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| replicore_core::Error::StoreRead(format!("id={id}: {e}")))?;
    let item: Item = serde_json::from_value(value).map_err(|e| replicore_core::Error::StoreRead(format!("id={id}: {e}")))?;
    Ok(Some(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replicore_core::CollectionRegistry;
    use replicore_testing::open_store_fixture_with_delay;
    use std::time::Duration;

    async fn next_record_event(events: &mut replicore_store::ChangeEvents) -> ChangeEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event stream ended");
            if event.table_kind == TableKind::Record {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn insert_on_record_table_broadcasts_a_create() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        fixture.adapter.add_record("kv", "rec-1", serde_json::json!({"value": "X"})).await.unwrap();
        let mut events = fixture.events;
        let event = next_record_event(&mut events).await;

        dispatch_event(&fixture.adapter, &sessions, event).await;

        let frame = rx.recv().await.expect("expected a broadcast frame");
        let message: ServerMessage = serde_json::from_str(&frame).unwrap();
        match message {
            ServerMessage::Change { change_type, before, after, collection_name, .. } => {
                assert_eq!(change_type, ChangeType::Create);
                assert!(before.is_none());
                assert_eq!(after.unwrap().id, "rec-1");
                assert_eq!(collection_name, "kv");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn access_insert_never_produces_a_frame() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        fixture.adapter.add_record("kv", "rec-1", serde_json::json!({"value": "X"})).await.unwrap();
        let mut events = fixture.events;

        let first = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();

        dispatch_event(&fixture.adapter, &sessions, first).await;
        dispatch_event(&fixture.adapter, &sessions, second).await;

        let frame = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.unwrap().unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_err(), "only one frame should have been broadcast");
        let message: ServerMessage = serde_json::from_str(&frame).unwrap();
        assert!(matches!(message, ServerMessage::Change { change_type: ChangeType::Create, .. }));
    }

    #[tokio::test]
    async fn access_revoke_synthesises_a_remove() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        fixture.adapter.add_record("kv", "rec-1", serde_json::json!({"value": "X"})).await.unwrap();
        let mut events = fixture.events;
        dispatch_event(&fixture.adapter, &sessions, next_record_event(&mut events).await).await;
        let _ = rx.recv().await;

        fixture.adapter.revoke_access("kv", "rec-1").await.unwrap();
        let access_event = loop {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
            if event.table_kind == TableKind::Access {
                break event;
            }
        };
        dispatch_event(&fixture.adapter, &sessions, access_event).await;

        let frame = rx.recv().await.expect("expected a remove frame");
        let message: ServerMessage = serde_json::from_str(&frame).unwrap();
        match message {
            ServerMessage::Change { change_type, before, after, .. } => {
                assert_eq!(change_type, ChangeType::Remove);
                assert!(before.is_some());
                assert!(after.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
