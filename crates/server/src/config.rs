// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "replicore-server")]
#[command(about = "Reactive Persistent Replication server", long_about = None)]
#[command(version)]
pub struct Config {
    /// Address to bind the HTTP + websocket listener to.
    #[arg(long, env = "REPLICORE_BIND_ADDR", default_value = "0.0.0.0:9999")]
    pub bind_addr: String,

    /// Path to the embedded SQLite database file.
    #[arg(long, env = "REPLICORE_DB_PATH", default_value = "./data/db.sqlite")]
    pub db_path: PathBuf,

    /// Number of worker threads for the tokio runtime (defaults to available cores).
    #[arg(long, env = "REPLICORE_WORKER_THREADS")]
    pub worker_threads: Option<usize>,

    /// Log verbosity filter, forwarded to `tracing_subscriber::EnvFilter` if `RUST_LOG` is unset.
    #[arg(long, env = "REPLICORE_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Config {
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get)
    }
}
