// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use tracing_subscriber::EnvFilter;

/// Initialise the global tracing subscriber. `RUST_LOG` takes priority;
/// otherwise falls back to the `--log` / `REPLICORE_LOG` config value.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
