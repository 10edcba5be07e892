//! ==============================================================================
//! sensor.rs - mutable sensor state container
//! ==============================================================================
//!
//! purpose:
//!     holds the latest known value of every field a remote sensor has
//!     reported. there is no schema: any json value can sit under any name.
//!
//! merge rule:
//!     each update is an object. its top-level keys overwrite the same keys
//!     in the held state, keys it does not mention are left alone. nested
//!     objects and arrays are replaced wholesale, never merged recursively.
//!
//! numbers:
//!     kept exactly as written on the wire (1.0 stays 1.0, 1e400 stays
//!     1e400). nesting deeper than serde_json's recursion limit (128) is
//!     rejected as a parse error.
//!
//! relationships:
//!     - used by: listener.rs (one container per watch session)
//!     - used by: server.rs (mirror of the broadcast stream behind a RwLock)
//!
//! ==============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StateError;

/// field name -> json value, kept in insertion order
pub type Fields = Map<String, Value>;

/// mutable container for the sensed state
///
/// there is no internal locking. a single owner mutates it; callers that
/// share one across tasks wrap it in a lock (see server.rs).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sensor {
    fields: Fields,
}

impl Sensor {
    /// empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// state seeded with a shallow copy of `seed`
    ///
    /// the caller keeps its own map; later changes to it do not reach us.
    pub fn with_seed(seed: &Fields) -> Self {
        Self {
            fields: seed.clone(),
        }
    }

    /// parse `raw` as json and shallow-merge it into the held state
    ///
    /// on any error the state is left exactly as it was.
    pub fn update(&mut self, raw: &str) -> Result<(), StateError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(patch) => {
                self.merge(patch);
                Ok(())
            }
            other => Err(StateError::NotAnObject {
                kind: kind_of(&other),
            }),
        }
    }

    /// shallow-merge an already parsed object
    pub fn merge(&mut self, patch: Fields) {
        for (name, value) in patch {
            self.fields.insert(name, value);
        }
    }

    /// defensive copy of the current mapping
    pub fn snapshot(&self) -> Fields {
        self.fields.clone()
    }

    /// independent container starting from the current mapping
    pub fn copy(&self) -> Sensor {
        self.clone()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// two-space indented json, the form handed to render targets
    pub fn to_pretty_json(&self) -> String {
        // a map of string keys to json values cannot fail to serialize
        serde_json::to_string_pretty(&self.fields).unwrap_or_else(|_| String::from("{}"))
    }
}

impl From<Fields> for Sensor {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
