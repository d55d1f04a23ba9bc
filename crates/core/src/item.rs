// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Replicore Contributors

use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved field names. Application payloads must not carry these.
pub const ID_FIELD: &str = "id";
pub const CREATED_FIELD: &str = "created_at";
pub const UPDATED_FIELD: &str = "updated_at";

/// A record as seen by a subscriber: the reserved identity/timestamp
/// fields plus an open bag of application fields (§6 `Item`).
///
/// `Item` serialises as a single flat JSON object. Encoding fails if
/// `other` carries a key that collides with a reserved field; decoding
/// tolerates timestamps sent as floating point (common with generic JSON
/// decoders) and truncates them to whole milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub other: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>, created_at: i64, updated_at: i64, other: Map<String, Value>) -> Self {
        Self { id: id.into(), created_at, updated_at, other }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::with_capacity(self.other.len() + 3);
        map.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        map.insert(CREATED_FIELD.to_string(), Value::Number(self.created_at.into()));
        map.insert(UPDATED_FIELD.to_string(), Value::Number(self.updated_at.into()));

        for (name, value) in &self.other {
            if map.contains_key(name) {
                return Err(S::Error::custom(format!("field `{name}` collides with a reserved field")));
            }
            map.insert(name.clone(), value.clone());
        }

        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = Map::deserialize(deserializer)?;

        let id = take_string(&mut map, ID_FIELD).map_err(D::Error::custom)?;
        let created_at = take_timestamp(&mut map, CREATED_FIELD).map_err(D::Error::custom)?;
        let updated_at = take_timestamp(&mut map, UPDATED_FIELD).map_err(D::Error::custom)?;

        Ok(Item { id, created_at, updated_at, other: map })
    }
}

fn take_string(map: &mut Map<String, Value>, field: &str) -> Result<String, String> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("field `{field}` must be a string")),
        None => Err(format!("field `{field}` is missing")),
    }
}

/// Timestamps are canonically integers but accepted as floats so that
/// decoders which always represent JSON numbers as `f64` keep working.
fn take_timestamp(map: &mut Map<String, Value>, field: &str) -> Result<i64, String> {
    match map.remove(field) {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                Ok(f.trunc() as i64)
            } else {
                Err(format!("field `{field}` is not a valid number"))
            }
        }
        Some(_) => Err(format!("field `{field}` must be numeric")),
        None => Err(format!("field `{field}` is missing")),
    }
}
