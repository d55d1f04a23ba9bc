// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the epoch, as used throughout the wire
/// protocol and the record/change timestamps (§3).
pub fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_millis() as i64
}
