// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The sync responder (§4.C): turns one decoded `sync` request into the
//! ordered sequence of `partial_sync`/`full_sync`/`remove_collection`
//! frames a session is owed, and hands them to the session manager in
//! one shot.

use std::collections::HashMap;

use futures_util::future::join_all;
use replicore_core::{ClientMessage, Item, ServerMessage};
use replicore_session::{ClientRequest, SessionManager};
use replicore_store::StoreAdapter;
use tracing::{debug, warn};

/// Records are chunked into batches of this size (§4.C step 4, §8 property 3).
const BATCH_SIZE: usize = 1_000;

/// Handle one inbound request. Malformed payloads, non-`sync` types, and
/// abandoned responses (a `ReadSnapshot` failure) all resolve to "send
/// nothing" — the client is expected to retry.
pub async fn handle_request(store: &StoreAdapter, sessions: &SessionManager, request: ClientRequest) {
    let message: ClientMessage = match serde_json::from_str(&request.payload) {
        Ok(message) => message,
        Err(err) => {
            debug!(session_id = %request.session_id, error = %err, "dropping malformed client frame");
            return;
        }
    };
    if message.kind != "sync" {
        debug!(session_id = %request.session_id, kind = %message.kind, "dropping frame of unknown type");
        return;
    }

    let now = replicore_store::now_millis();
    let registry = store.registry();

    let mut watermarks: HashMap<String, Option<i64>> = registry.current_names().map(|name| (name.to_string(), None)).collect();
    let mut retired_frames = Vec::new();
    for (name, version) in &message.collection_versions {
        if registry.is_current(name) {
            watermarks.insert(name.clone(), Some(*version));
        } else if registry.is_retired(name) {
            retired_frames.push(ServerMessage::RemoveCollection { collection_name: name.clone() });
        }
    }

    let reads = join_all(watermarks.into_iter().map(|(name, watermark)| async move {
        let result = store.read_snapshot(&name, watermark).await;
        (name, result)
    }))
    .await;

    let mut frames = Vec::new();
    for (name, result) in reads {
        match result {
            Ok(snapshot) => frames.extend(build_frames(&name, snapshot, now)),
            Err(err) => {
                warn!(session_id = %request.session_id, collection = %name, error = %err, "abandoning sync response");
                return;
            }
        }
    }
    frames.extend(retired_frames);

    let serialised: Vec<String> = frames
        .iter()
        .filter_map(|frame| match serde_json::to_string(frame) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(error = %err, "failed to serialise sync frame");
                None
            }
        })
        .collect();

    sessions.send_one(&request.session_id, serialised).await;
}

fn build_frames(collection_name: &str, snapshot: replicore_store::SnapshotResult, now: i64) -> Vec<ServerMessage> {
    let removed_ids = if snapshot.removed_ids.is_empty() { None } else { Some(snapshot.removed_ids) };
    let items: Vec<Item> = snapshot
        .records
        .into_iter()
        .map(|record| {
            let fields = record.fields.as_object().cloned().unwrap_or_default();
            Item::new(record.id, record.created_at, record.updated_at, fields)
        })
        .collect();

    if items.is_empty() {
        return vec![ServerMessage::FullSync { collection_name: collection_name.to_string(), values: None, removed_ids, version: now }];
    }

    let mut batches: Vec<Vec<Item>> = items.chunks(BATCH_SIZE).map(|chunk| chunk.to_vec()).collect();
    let last = batches.pop().expect("at least one batch when items is non-empty");

    let mut frames: Vec<ServerMessage> =
        batches.into_iter().map(|batch| ServerMessage::PartialSync { collection_name: collection_name.to_string(), values: batch }).collect();
    frames.push(ServerMessage::FullSync {
        collection_name: collection_name.to_string(),
        values: Some(last),
        removed_ids,
        version: now,
    });
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replicore_core::CollectionRegistry;
    use replicore_testing::open_store_fixture_with_delay;
    use std::time::Duration;

    async fn recv_frames(rx: &mut tokio::sync::mpsc::Receiver<String>, count: usize) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        for _ in 0..count {
            let raw = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            frames.push(serde_json::from_str(&raw).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn empty_store_yields_one_empty_full_sync() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        let request = ClientRequest { session_id: "s1".to_string(), payload: r#"{"type":"sync"}"#.to_string() };
        handle_request(&fixture.adapter, &sessions, request).await;

        let frames = recv_frames(&mut rx, 1).await;
        match &frames[0] {
            ServerMessage::FullSync { collection_name, values, removed_ids, .. } => {
                assert_eq!(collection_name, "kv");
                assert!(values.is_none());
                assert!(removed_ids.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retired_collection_reference_yields_remove_collection_alongside_kv_sync() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        let request = ClientRequest {
            session_id: "s1".to_string(),
            payload: r#"{"type":"sync","collection_versions":{"deleted_test_collection": 1}}"#.to_string(),
        };
        handle_request(&fixture.adapter, &sessions, request).await;

        let frames = recv_frames(&mut rx, 2).await;
        assert!(frames.iter().any(|f| matches!(f, ServerMessage::FullSync { collection_name, .. } if collection_name == "kv")));
        assert!(frames.iter().any(|f| matches!(f, ServerMessage::RemoveCollection { collection_name } if collection_name == "deleted_test_collection")));
    }

    #[tokio::test]
    async fn batches_2500_records_into_two_partials_and_one_full() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        for i in 0..2_500 {
            fixture.adapter.add_record("kv", &format!("rec-{i}"), serde_json::json!({"n": i})).await.unwrap();
        }

        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        let request = ClientRequest { session_id: "s1".to_string(), payload: r#"{"type":"sync"}"#.to_string() };
        handle_request(&fixture.adapter, &sessions, request).await;

        let frames = recv_frames(&mut rx, 3).await;
        let partials = frames.iter().filter(|f| matches!(f, ServerMessage::PartialSync { .. })).count();
        let fulls = frames.iter().filter(|f| matches!(f, ServerMessage::FullSync { .. })).count();
        assert_eq!(partials, 2);
        assert_eq!(fulls, 1);

        let mut total = 0;
        for frame in &frames {
            total += match frame {
                ServerMessage::PartialSync { values, .. } => values.len(),
                ServerMessage::FullSync { values: Some(values), .. } => values.len(),
                ServerMessage::FullSync { values: None, .. } => 0,
                _ => 0,
            };
        }
        assert_eq!(total, 2_500);

        assert!(matches!(frames.last().unwrap(), ServerMessage::FullSync { .. }), "full_sync must be the terminal frame");
    }

    #[tokio::test]
    async fn non_sync_payload_produces_no_frames() {
        let fixture = open_store_fixture_with_delay(CollectionRegistry::reference(), Duration::from_millis(1)).await;
        let sessions = SessionManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        sessions.add("s1".to_string(), tx).await;

        let request = ClientRequest { session_id: "s1".to_string(), payload: r#"{"test":123}"#.to_string() };
        handle_request(&fixture.adapter, &sessions, request).await;

        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }
}
