// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::time::Duration;

use pretty_assertions::assert_eq;
use replicore_core::{AccessState, TableKind};
use replicore_store::StoreError;
use replicore_testing::open_store_fixture_with_delay;

fn fields(n: i64) -> serde_json::Value {
    serde_json::json!({ "count": n })
}

#[tokio::test]
async fn add_record_is_visible_in_a_snapshot() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;

    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    let snapshot = fixture.adapter.read_snapshot("kv", None).await.unwrap();
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].id, "rec-1");
    assert_eq!(snapshot.records[0].fields, fields(1));
    assert!(snapshot.removed_ids.is_empty());
}

#[tokio::test]
async fn edit_record_bumps_updated_at_strictly() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    let before = fixture.adapter.read_record("kv", "rec-1").await.unwrap().unwrap();
    let affected = fixture.adapter.edit_record("kv", "rec-1", fields(2)).await.unwrap();
    let after = fixture.adapter.read_record("kv", "rec-1").await.unwrap().unwrap();

    assert_eq!(affected, 1);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.fields, fields(2));
}

#[tokio::test]
async fn edit_unknown_record_reports_zero_affected() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    let affected = fixture.adapter.edit_record("kv", "missing", fields(1)).await.unwrap();
    assert_eq!(affected, 0);
}

#[tokio::test]
async fn revoked_access_hides_record_from_unwatermarked_snapshot_but_lists_removal() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    let watermark = fixture.adapter.read_record("kv", "rec-1").await.unwrap().unwrap().updated_at;
    fixture.adapter.revoke_access("kv", "rec-1").await.unwrap();

    let snapshot = fixture.adapter.read_snapshot("kv", None).await.unwrap();
    assert!(snapshot.records.is_empty());

    let incremental = fixture.adapter.read_snapshot("kv", Some(watermark)).await.unwrap();
    assert!(incremental.removed_ids.contains_key("rec-1"));
}

#[tokio::test]
async fn deleted_access_is_terminal_and_cannot_be_restored() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    fixture.adapter.set_access("kv", "rec-1", AccessState::Deleted).await.unwrap();
    fixture.adapter.set_access("kv", "rec-1", AccessState::Allowed).await.unwrap();

    let snapshot = fixture.adapter.read_snapshot("kv", None).await.unwrap();
    assert!(snapshot.records.is_empty(), "a deleted record must never become visible again");
}

#[tokio::test]
async fn remove_record_cascades_to_change_events_for_both_tables() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    let mut events = fixture.events;

    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    let mut seen_record_insert = false;
    let mut seen_access_insert = false;
    while !(seen_record_insert && seen_access_insert) {
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for change event")
            .expect("change event stream ended early");
        match event.table_kind {
            TableKind::Record if event.collection == "kv" => seen_record_insert = true,
            TableKind::Access if event.collection == "kv" => seen_access_insert = true,
            _ => {}
        }
    }
}

#[tokio::test]
async fn change_records_round_trip_and_can_be_deleted() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;
    let mut events = fixture.events;

    fixture.adapter.add_record("kv", "rec-1", fields(1)).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for change event")
        .expect("change event stream ended early");

    let record = fixture
        .adapter
        .read_change_record(event.table_kind, &event.collection, event.row_id)
        .await
        .unwrap()
        .expect("change record should exist right after the event fired");
    assert_eq!(record.key, "rec-1");

    fixture.adapter.delete_change_record(event.table_kind, &event.collection, event.row_id).await.unwrap();
    let gone = fixture.adapter.read_change_record(event.table_kind, &event.collection, event.row_id).await.unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn read_snapshot_on_unknown_collection_reports_unknown_collection() {
    let fixture = open_store_fixture_with_delay(replicore_core::CollectionRegistry::reference(), Duration::from_millis(1)).await;

    let err = fixture.adapter.read_snapshot("nonexistent", None).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownCollection(name) if name == "nonexistent"));
}
