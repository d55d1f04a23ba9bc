// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The websocket subscription endpoint (§6). Wires one connected peer
//! into the session manager: a write task draining its outbound queue
//! and pinging on a period, and a read task forwarding decoded text
//! frames into the shared `ReadCh`, each enforcing its own deadline
//! (§4.B, mirroring the gorilla/websocket read/write-loop shape).

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use replicore_core::generate_id;
use replicore_session::{ClientRequest, MAX_INBOUND_FRAME_BYTES, PING_PERIOD, READ_DEADLINE, SESSION_QUEUE_CAPACITY, WRITE_DEADLINE};

use crate::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = generate_id();
    debug!(session_id = %id, "client connected");

    let (write_tx, write_rx) = mpsc::channel::<String>(SESSION_QUEUE_CAPACITY);
    state.sessions.add(id.clone(), write_tx).await;

    let (ws_tx, ws_rx) = socket.split();
    let writer_id = id.clone();
    let writer = tokio::spawn(run_write_task(writer_id, ws_tx, write_rx));

    let reader_id = id.clone();
    let reader = tokio::spawn(run_read_task(reader_id, ws_rx, state.read_tx.clone()));

    // Either task failing terminates the session (§4.B).
    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    state.sessions.remove(&id).await;
    debug!(session_id = %id, "client disconnected");
}

async fn run_write_task(id: String, mut sink: futures_util::stream::SplitSink<WebSocket, Message>, mut write_rx: mpsc::Receiver<String>) {
    let mut ping_ticker = tokio::time::interval(PING_PERIOD);
    ping_ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            frame = write_rx.recv() => {
                let Some(frame) = frame else {
                    debug!(session_id = %id, "write queue closed");
                    return;
                };
                if tokio::time::timeout(WRITE_DEADLINE, sink.send(Message::Text(frame.into()))).await.is_err() {
                    debug!(session_id = %id, "write deadline exceeded");
                    return;
                }
            }
            _ = ping_ticker.tick() => {
                if tokio::time::timeout(WRITE_DEADLINE, sink.send(Message::Ping(Vec::new().into()))).await.is_err() {
                    debug!(session_id = %id, "ping write deadline exceeded");
                    return;
                }
            }
        }
    }
}

async fn run_read_task(id: String, mut stream: futures_util::stream::SplitStream<WebSocket>, read_tx: mpsc::Sender<ClientRequest>) {
    loop {
        let next = match tokio::time::timeout(READ_DEADLINE, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                debug!(session_id = %id, "read deadline exceeded");
                return;
            }
        };

        let Some(message) = next else {
            return;
        };
        let message = match message {
            Ok(message) => message,
            Err(_) => return,
        };

        match message {
            Message::Text(text) => {
                if text.len() > MAX_INBOUND_FRAME_BYTES {
                    debug!(session_id = %id, size = text.len(), "dropping oversized frame");
                    continue;
                }
                let request = ClientRequest { session_id: id.clone(), payload: text.to_string() };
                if read_tx.send(request).await.is_err() {
                    return;
                }
            }
            Message::Close(_) => return,
            // Pong receipt simply lets the loop continue; the read
            // deadline is recomputed fresh on every iteration.
            Message::Pong(_) | Message::Ping(_) | Message::Binary(_) => {}
        }
    }
}
