// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Process entry point. Mirrors the reference implementation's `main.go`:
//! parse config, init logging, open the store, run the two orchestrator
//! loops in the background, serve HTTP + websocket until a termination
//! signal arrives, then drain in-flight work before exiting.

mod config;
mod http;
mod logging;
mod orchestrator;
mod ws;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use replicore_core::CollectionRegistry;
use replicore_session::{ClientRequest, SessionManager};
use replicore_store::{StoreAdapter, DEFAULT_SETTLE_DELAY};

use crate::config::Config;
use crate::orchestrator::Shutdown;

/// Shared router state (axum `State` extractor, so it must be `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub store: StoreAdapter,
    pub sessions: SessionManager,
    pub read_tx: mpsc::Sender<ClientRequest>,
}

fn main() {
    let config = Config::parse();
    logging::init(&config.log_filter);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.effective_worker_threads())
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    runtime.block_on(async_main(config));
}

async fn async_main(config: Config) {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                panic!("failed to create database directory {}: {err}", parent.display());
            }
        }
    }

    let registry = CollectionRegistry::reference();
    let (store, events) = StoreAdapter::open(&config.db_path, registry, DEFAULT_SETTLE_DELAY)
        .await
        .expect("failed to open store");

    let sessions = SessionManager::new();
    let (read_tx, read_rx) = replicore_session::read_channel();

    let state = AppState { store: store.clone(), sessions: sessions.clone(), read_tx };

    let (shutdown, sync_signal) = Shutdown::new();
    let dispatch_signal = sync_signal.clone();

    let sync_handle = tokio::spawn(orchestrator::run_sync_loop(store.clone(), sessions.clone(), read_rx, sync_signal));
    let dispatch_handle = tokio::spawn(orchestrator::run_dispatch_loop(store.clone(), sessions.clone(), events, dispatch_signal));

    let app = Router::new().route("/ws", get(ws::upgrade)).merge(http::router()).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await.expect("failed to bind listener");
    info!(addr = %config.bind_addr, "replicore server listening");

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            serve_shutdown.fire();
        })
        .await
        .expect("server error");

    shutdown.fire();
    let _ = tokio::join!(sync_handle, dispatch_handle);
    sessions.clear().await;
    info!("replicore server stopped");
}
