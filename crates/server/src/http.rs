// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! The writer HTTP endpoints (§6 "Writer interface", out of core scope
//! but specified at the boundary): `add`, `edit`, `remove`,
//! `remove-access`. CORS mirrors the permissive policy of the reference
//! implementation via `tower_http::cors::CorsLayer`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use replicore_core::generate_id;

use crate::AppState;

/// Application field payloads are capped well below the CDC settle path
/// (§6 "Payload size cap per record: 10 000 bytes").
const MAX_PAYLOAD_BYTES: usize = 10_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add))
        .route("/edit", post(edit))
        .route("/remove", post(remove))
        .route("/remove-access", post(remove_access))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
}

#[derive(Deserialize)]
struct AddRequest {
    #[serde(flatten)]
    fields: Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct AddResponse {
    id: String,
}

async fn add(State(state): State<AppState>, Json(req): Json<AddRequest>) -> impl IntoResponse {
    if encoded_len(&req.fields) > MAX_PAYLOAD_BYTES {
        return (StatusCode::BAD_REQUEST, "payload exceeds 10000 bytes").into_response();
    }

    let id = generate_id();
    match state.store.add_record("kv", &id, serde_json::Value::Object(req.fields)).await {
        Ok(()) => (StatusCode::OK, Json(AddResponse { id })).into_response(),
        Err(err) => {
            error!(error = %err, "error while writing to database");
            (StatusCode::INTERNAL_SERVER_ERROR, "error while writing to database").into_response()
        }
    }
}

#[derive(Deserialize)]
struct EditRequest {
    id: String,
    #[serde(flatten)]
    fields: Map<String, serde_json::Value>,
}

async fn edit(State(state): State<AppState>, Json(req): Json<EditRequest>) -> impl IntoResponse {
    if req.id.is_empty() {
        return (StatusCode::BAD_REQUEST, "id must not be empty").into_response();
    }
    if encoded_len(&req.fields) > MAX_PAYLOAD_BYTES {
        return (StatusCode::BAD_REQUEST, "payload exceeds 10000 bytes").into_response();
    }

    match state.store.edit_record("kv", &req.id, serde_json::Value::Object(req.fields)).await {
        Ok(0) => (StatusCode::NOT_FOUND, "id does not exist").into_response(),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!(error = %err, "error while writing to database");
            (StatusCode::INTERNAL_SERVER_ERROR, "error while writing to database").into_response()
        }
    }
}

#[derive(Deserialize)]
struct IdRequest {
    id: String,
}

async fn remove(State(state): State<AppState>, Json(req): Json<IdRequest>) -> impl IntoResponse {
    if req.id.is_empty() {
        return (StatusCode::BAD_REQUEST, "id must not be empty").into_response();
    }
    match state.store.remove_record("kv", &req.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!(error = %err, "error while writing to database");
            (StatusCode::INTERNAL_SERVER_ERROR, "error while writing to database").into_response()
        }
    }
}

async fn remove_access(State(state): State<AppState>, Json(req): Json<IdRequest>) -> impl IntoResponse {
    if req.id.is_empty() {
        return (StatusCode::BAD_REQUEST, "id must not be empty").into_response();
    }
    match state.store.revoke_access("kv", &req.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!(error = %err, "error while writing to database");
            (StatusCode::INTERNAL_SERVER_ERROR, "error while writing to database").into_response()
        }
    }
}

fn encoded_len(fields: &Map<String, serde_json::Value>) -> usize {
    serde_json::to_vec(fields).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}
