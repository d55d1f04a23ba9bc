// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Shared fixtures for exercising the store and its consumers without a
//! server running: an ephemeral on-disk SQLite file backing a
//! `StoreAdapter`, torn down with the returned `TempDir`.

use std::time::Duration;

use replicore_core::CollectionRegistry;
use replicore_store::{ChangeEvents, StoreAdapter};
use tempfile::TempDir;

/// A `StoreAdapter` over a throwaway SQLite file. Keep the `TempDir`
/// alive for as long as the adapter is in use; dropping it removes the
/// backing file.
pub struct StoreFixture {
    pub adapter: StoreAdapter,
    pub events: ChangeEvents,
    pub dir: TempDir,
}

/// Open a fixture store for the registry's reference collections, with
/// the production settle delay.
pub async fn open_store_fixture() -> StoreFixture {
    open_store_fixture_with_delay(CollectionRegistry::reference(), replicore_store::DEFAULT_SETTLE_DELAY).await
}

/// Open a fixture store with a caller-supplied registry and settle
/// delay, for tests that want to shrink the delay or exercise a custom
/// set of collections.
pub async fn open_store_fixture_with_delay(registry: CollectionRegistry, settle_delay: Duration) -> StoreFixture {
    let dir = tempfile::tempdir().expect("failed to create temp dir for store fixture");
    let path = dir.path().join("replicore-test.sqlite");
    let (adapter, events) = StoreAdapter::open(&path, registry, settle_delay)
        .await
        .expect("failed to open fixture store");
    StoreFixture { adapter, events, dir }
}
