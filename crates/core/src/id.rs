// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

//! Record id generation (§6 "Writer interface": ids are opaque strings
//! generated by an external id source, 21-char collision-resistant).
//! We stay inside the teacher's own dependency stack rather than pull in
//! a dedicated id-generation crate: a v7 UUID (time-ordered, so ids sort
//! roughly with creation order) encoded with the same `bs58` alphabet the
//! teacher uses for its own identifiers.

const ID_LEN: usize = 21;

/// Generate a 21-character, base58-encoded, collision-resistant id.
pub fn generate_id() -> String {
    let uuid = uuid::Uuid::now_v7();
    let encoded = bs58::encode(uuid.as_bytes()).into_string();

    if encoded.len() >= ID_LEN {
        encoded[..ID_LEN].to_string()
    } else {
        // Base58 of a 16-byte uuid is occasionally shorter than 21 chars
        // when the leading bytes are zero; pad deterministically with a
        // second uuid rather than retrying.
        let mut encoded = encoded;
        while encoded.len() < ID_LEN {
            encoded.push_str(&bs58::encode(uuid::Uuid::now_v7().as_bytes()).into_string());
        }
        encoded[..ID_LEN].to_string()
    }
}
