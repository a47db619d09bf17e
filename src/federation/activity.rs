//! Activity payloads
//!
//! An inbound activity is carried as raw JSON: the authentication
//! pipeline only reads a handful of fields (`id`, `actor`, the
//! embedded `signature` block) but must keep the full payload intact
//! for linked-data signature verification, so [`Activity`] wraps the
//! JSON value instead of projecting it into a struct.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A federation message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Activity(Value);

impl Activity {
    /// Wrap a parsed JSON payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The activity's own URI, if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// The actor identifier claimed by the activity.
    ///
    /// The `actor` field is either a bare URI string or an embedded
    /// actor reference object carrying an `id`.
    pub fn actor_id(&self) -> Option<&str> {
        match self.0.get("actor") {
            Some(Value::String(uri)) => Some(uri.as_str()),
            Some(reference) => reference.get("id").and_then(Value::as_str),
            None => None,
        }
    }

    /// The embedded linked-data signature block, if any.
    pub fn signature_block(&self) -> Option<LdSignatureBlock> {
        let block = self.0.get("signature")?;
        serde_json::from_value(block.clone()).ok()
    }

    /// The raw embedded signature value, if any.
    pub fn raw_signature(&self) -> Option<&Value> {
        self.0.get("signature")
    }

    /// The raw payload.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Copy of the payload with the given signature block attached.
    pub fn with_signature(&self, signature: Value) -> Self {
        let mut value = self.0.clone();
        if let Value::Object(map) = &mut value {
            map.insert("signature".to_string(), signature);
        }
        Self(value)
    }
}

impl From<Value> for Activity {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Embedded linked-data signature block
///
/// Parsed view of the `signature` field; unknown members are retained
/// in the raw payload and participate in canonicalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdSignatureBlock {
    #[serde(rename = "type")]
    pub signature_type: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_value: Option<String>,
}
