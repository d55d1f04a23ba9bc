// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::constants::SESSION_QUEUE_CAPACITY;

/// Opaque, server-assigned subscriber id (§3 Session).
pub type SessionId = String;

/// One decoded inbound text frame, tagged with the session it arrived on
/// (§4.B `ReadCh`).
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub session_id: SessionId,
    pub payload: String,
}

/// The single bounded channel every session's read task funnels decoded
/// frames into (§4.B). A full channel makes inbound reads block,
/// providing backpressure to clients.
pub type ReadChannel = (mpsc::Sender<ClientRequest>, mpsc::Receiver<ClientRequest>);

/// Build the shared `ReadCh` with the recommended capacity.
pub fn read_channel() -> ReadChannel {
    mpsc::channel(SESSION_QUEUE_CAPACITY)
}

type SessionMap = RwLock<HashMap<SessionId, mpsc::Sender<String>>>;

/// Owns the live subscriber map (§4.B, §3 "Ownership": "The session
/// manager exclusively owns the session map and each session's write
/// queue"). Cheap to clone: every clone shares the same map.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<SessionMap>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Register a session's outbound write queue. The caller (the
    /// transport layer) retains the matching receiver and drains it on a
    /// dedicated write task.
    pub async fn add(&self, id: SessionId, write_tx: mpsc::Sender<String>) {
        self.sessions.write().await.insert(id, write_tx);
    }

    /// Remove a session. Idempotent: removing an already-absent id is a
    /// no-op, matching the teardown path being reachable from both the
    /// read and the write task of the same session.
    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Enqueue `frames` to a single session, in order. Used by the sync
    /// responder to hand a client its response (§4.C step 6). A queue
    /// that is full is treated exactly like a slow broadcast recipient:
    /// the session is torn down rather than allowed to block the caller.
    pub async fn send_one(&self, id: &str, frames: Vec<String>) {
        let sender = { self.sessions.read().await.get(id).cloned() };
        let Some(sender) = sender else {
            return;
        };
        for frame in frames {
            if sender.try_send(frame).is_err() {
                warn!(session_id = id, "session write queue full, tearing down session");
                self.remove(id).await;
                return;
            }
        }
    }

    /// Enqueue `frame` to every live session. Best-effort: a session
    /// whose queue is full is dropped from the map rather than allowed
    /// to stall delivery to everyone else (§9 "Broadcast fanout").
    pub async fn broadcast(&self, frame: String) {
        let senders: Vec<(SessionId, mpsc::Sender<String>)> =
            self.sessions.read().await.iter().map(|(id, tx)| (id.clone(), tx.clone())).collect();

        let mut overflowed = Vec::new();
        for (id, sender) in senders {
            if sender.try_send(frame.clone()).is_err() {
                warn!(session_id = %id, "session write queue full during broadcast, dropping session");
                overflowed.push(id);
            }
        }
        if !overflowed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in overflowed {
                sessions.remove(&id);
            }
        }
    }

    /// Drop every session, e.g. on process shutdown (§4.E).
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_tracks_membership() {
        let manager = SessionManager::new();
        let (tx, _rx) = mpsc::channel(4);
        manager.add("s1".to_string(), tx).await;
        assert!(manager.contains("s1").await);
        assert_eq!(manager.len().await, 1);

        manager.remove("s1").await;
        assert!(!manager.contains("s1").await);
    }

    #[tokio::test]
    async fn send_one_delivers_frames_in_order() {
        let manager = SessionManager::new();
        let (tx, mut rx) = mpsc::channel(4);
        manager.add("s1".to_string(), tx).await;

        manager.send_one("s1", vec!["a".to_string(), "b".to_string()]).await;

        assert_eq!(rx.recv().await.unwrap(), "a");
        assert_eq!(rx.recv().await.unwrap(), "b");
    }

    #[tokio::test]
    async fn broadcast_reaches_every_session() {
        let manager = SessionManager::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.add("s1".to_string(), tx1).await;
        manager.add("s2".to_string(), tx2).await;

        manager.broadcast("hello".to_string()).await;

        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn a_full_queue_tears_the_session_down_without_blocking() {
        let manager = SessionManager::new();
        let (tx, rx) = mpsc::channel(1);
        tx.try_send("filler".to_string()).unwrap();
        manager.add("slow".to_string(), tx).await;

        manager.broadcast("next".to_string()).await;

        assert!(!manager.contains("slow").await);
        drop(rx);
    }

    #[tokio::test]
    async fn send_one_to_unknown_session_is_a_no_op() {
        let manager = SessionManager::new();
        manager.send_one("ghost", vec!["x".to_string()]).await;
    }
}
