// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::item::Item;

/// The single client→server request shape (§6): a `sync` asking for
/// every current collection at an optional per-collection watermark.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, rename = "collection_versions")]
    pub collection_versions: HashMap<String, i64>,
}

/// The kind of public change a subscriber is told about (§3/§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Remove,
}

/// Every server→client frame (§6). Tagged on `type` so each variant can
/// carry its own field set while still decoding/encoding as one flat
/// JSON object per the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "full_sync")]
    FullSync {
        collection_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        values: Option<Vec<Item>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        removed_ids: Option<HashMap<String, i64>>,
        version: i64,
    },
    #[serde(rename = "partial_sync")]
    PartialSync { collection_name: String, values: Vec<Item> },
    #[serde(rename = "change")]
    Change {
        collection_name: String,
        change_type: ChangeType,
        id: String,
        updated_at: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        before: Option<Item>,
        #[serde(skip_serializing_if = "Option::is_none")]
        after: Option<Item>,
    },
    #[serde(rename = "remove_collection")]
    RemoveCollection { collection_name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_message_parses_sync_with_versions() {
        let raw = json!({"type": "sync", "collection_versions": {"kv": 42}});
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.kind, "sync");
        assert_eq!(msg.collection_versions.get("kv"), Some(&42));
    }

    #[test]
    fn client_message_tolerates_missing_versions() {
        let raw = json!({"type": "sync"});
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert!(msg.collection_versions.is_empty());
    }

    #[test]
    fn full_sync_omits_null_fields() {
        let msg = ServerMessage::FullSync {
            collection_name: "kv".into(),
            values: None,
            removed_ids: None,
            version: 10,
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], json!("full_sync"));
        assert!(encoded.get("values").is_none());
        assert!(encoded.get("removed_ids").is_none());
    }

    #[test]
    fn change_message_tags_type_and_keeps_fields() {
        let msg = ServerMessage::Change {
            collection_name: "kv".into(),
            change_type: ChangeType::Remove,
            id: "abc".into(),
            updated_at: 5,
            before: None,
            after: None,
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], json!("change"));
        assert_eq!(encoded["change_type"], json!("remove"));
    }
}
