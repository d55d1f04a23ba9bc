// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::collections::HashSet;

/// The two disjoint static sets of collection names a server knows about
/// at startup (§3 Collection): collections served live, and collections
/// whose name is reserved only so clients referencing them can be told
/// they were retired.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    current: HashSet<String>,
    retired: HashSet<String>,
}

impl CollectionRegistry {
    pub fn new(current: impl IntoIterator<Item = String>, retired: impl IntoIterator<Item = String>) -> Self {
        Self { current: current.into_iter().collect(), retired: retired.into_iter().collect() }
    }

    /// The reference single-collection deployment: one current collection
    /// named `kv`, plus the one retired name exercised by the end-to-end
    /// test suite (§8 S6).
    pub fn reference() -> Self {
        Self::new(["kv".to_string()], ["deleted_test_collection".to_string()])
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current.contains(name)
    }

    pub fn is_retired(&self, name: &str) -> bool {
        self.retired.contains(name)
    }

    pub fn current_names(&self) -> impl Iterator<Item = &str> {
        self.current.iter().map(String::as_str)
    }
}
