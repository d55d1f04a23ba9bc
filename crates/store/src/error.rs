// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("invalid access state: {0}")]
    InvalidAccessState(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the store worker has shut down")]
    WorkerGone,
}

impl From<StoreError> for replicore_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownCollection(name) => replicore_core::Error::UnknownCollection(name),
            other => replicore_core::Error::StoreRead(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
