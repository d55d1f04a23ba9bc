// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::time::Duration;

/// Deadline for a single wire write before the session is torn down (§5).
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline for a wire read, refreshed on each pong receipt (§5).
pub const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Period between outbound ping frames (§4.B). Chosen well under
/// `READ_DEADLINE` so a healthy peer's pong always lands in time.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Inbound frames larger than this are rejected outright (§6).
pub const MAX_INBOUND_FRAME_BYTES: usize = 512;

/// Depth of a session's outbound write queue, and of the shared inbound
/// request channel (§4.B).
pub const SESSION_QUEUE_CAPACITY: usize = 10_000;
