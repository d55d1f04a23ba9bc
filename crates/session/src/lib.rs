// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The session manager (§4.B): the live subscriber map, per-session
//! bounded write queues, and the single inbound request channel every
//! session funnels into. The wire itself — the websocket upgrade, the
//! ping/pong timers, the read/write deadlines — is transport plumbing
//! and lives with the server binary; this crate only owns the state a
//! slow or dead peer must never be allowed to corrupt for everyone else.

mod constants;
mod manager;

pub use constants::{MAX_INBOUND_FRAME_BYTES, PING_PERIOD, READ_DEADLINE, SESSION_QUEUE_CAPACITY, WRITE_DEADLINE};
pub use manager::{ClientRequest, ReadChannel, SessionId, SessionManager};
