// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use thiserror::Error;

/// The error kinds and handling policy laid out in §7. Each variant is
/// handled by its producing component according to that policy; none of
/// them, on their own, halts the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed client frame: {0}")]
    MalformedClientFrame(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("store read failed: {0}")]
    StoreRead(String),

    #[error("store write failed: {0}")]
    StoreWrite(String),

    #[error("change record not found for row {0}")]
    MissingChangeRow(i64),

    #[error("record missing while applying access change for id {0}")]
    MissingRecordOnAccessChange(String),

    #[error("write to peer failed: {0}")]
    WireWrite(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}
