//! The on-disk unit: one serialized wallet export

use serde_json::{Map, Value};
use std::fmt;

/// A serialized wallet export. Always a JSON object.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletRecord(String);

impl WalletRecord {
    /// Accept `text` only if it is a JSON object
    pub fn parse(text: impl Into<String>) -> Result<Self, String> {
        let text = text.into();
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(_)) => Ok(Self(text)),
            Ok(other) => Err(format!("expected a JSON object, found {}", kind(&other))),
            Err(e) => Err(e.to_string()),
        }
    }

    pub(crate) fn from_object(object: Map<String, Value>) -> Self {
        Self(Value::Object(object).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// Records hold key material; keep them out of logs and panics.
impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletRecord({} bytes)", self.0.len())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
