// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The orchestrator (§4.E): two long-lived loops, each serialised on its
//! own input channel, torn down cooperatively on the process-wide
//! cancellation signal.

use tokio::sync::watch;
use tracing::{debug, info};

use replicore_session::{ClientRequest, SessionManager};
use replicore_store::{ChangeEvents, StoreAdapter};

/// Process-wide cancellation signal (§5 "Cancellation & timeouts").
/// Cloning shares the same underlying flag; `fire()` wakes every clone.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownSignal { rx })
    }

    pub fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once `Shutdown::fire` has been called.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// The inbound-request loop: reads `ReadCh` and hands each request to the
/// sync responder, one at a time (§4.E bullet 1).
pub async fn run_sync_loop(
    store: StoreAdapter,
    sessions: SessionManager,
    mut read_rx: tokio::sync::mpsc::Receiver<ClientRequest>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("sync loop shutting down");
                return;
            }
            request = read_rx.recv() => {
                let Some(request) = request else {
                    debug!("read channel closed, sync loop exiting");
                    return;
                };
                replicore_sync::handle_request(&store, &sessions, request).await;
            }
        }
    }
}

/// The CDC-event loop: reads `Store.ChangeEvents` and hands each event to
/// the change dispatcher, one at a time (§4.E bullet 2).
pub async fn run_dispatch_loop(store: StoreAdapter, sessions: SessionManager, mut events: ChangeEvents, mut shutdown: ShutdownSignal) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("dispatch loop shutting down");
                return;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("change event stream closed, dispatch loop exiting");
                    return;
                };
                replicore_dispatch::dispatch_event(&store, &sessions, event).await;
            }
        }
    }
}
