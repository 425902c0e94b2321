//! Value serialization
//!
//! Field values travel between the binding table and the store as text. The
//! default encoding is compact JSON.

use crate::binding::ValueKind;
use crate::error::{Error, Result};
use serde_json::Value;

/// Converts field values to and from their stored text form
pub trait ConfigSerializer: Send + Sync {
    /// Encode a value of the given kind. `Null` encodes as an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn serialize(&self, value: &Value, kind: ValueKind) -> Result<String>;

    /// Decode stored text for a field of the given kind.
    ///
    /// `Ok(None)` means "keep the field's default-constructed value".
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or does not match `kind`.
    fn deserialize(&self, text: &str, kind: ValueKind) -> Result<Option<Value>>;
}

/// Compact JSON serializer (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl ConfigSerializer for JsonSerializer {
    fn serialize(&self, value: &Value, _kind: ValueKind) -> Result<String> {
        if value.is_null() {
            return Ok(String::new());
        }
        serde_json::to_string(value).map_err(Error::from)
    }

    fn deserialize(&self, text: &str, kind: ValueKind) -> Result<Option<Value>> {
        if text.is_empty() {
            return Ok(empty_default(kind));
        }

        let value: Value = serde_json::from_str(text)?;
        check_kind(&value, kind)?;
        Ok(Some(value))
    }
}

/// Value used when a stored payload is empty
fn empty_default(kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::Bool => Some(Value::Bool(false)),
        ValueKind::Integer => Some(Value::from(0)),
        ValueKind::Float => Some(Value::from(0.0)),
        ValueKind::Text => Some(Value::String(String::new())),
        ValueKind::Optional(_) => Some(Value::Null),
        ValueKind::DateTime | ValueKind::List | ValueKind::Object => None,
    }
}

fn check_kind(value: &Value, kind: ValueKind) -> Result<()> {
    let matches = match kind {
        ValueKind::Bool => value.is_boolean(),
        ValueKind::Integer => value.is_i64() || value.is_u64(),
        ValueKind::Float => value.is_number(),
        ValueKind::Text => value.is_string(),
        ValueKind::List => value.is_array(),
        ValueKind::DateTime | ValueKind::Object => !value.is_null(),
        ValueKind::Optional(inner) => {
            return if value.is_null() {
                Ok(())
            } else {
                check_kind(value, *inner)
            };
        }
    };

    if matches {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected: kind.to_string(),
            actual: json_type_name(value).to_string(),
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
