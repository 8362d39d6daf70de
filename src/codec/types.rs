//! Codec trait

use crate::catalog::FieldType;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use std::cmp::Ordering;

/// Converts values of one field type to and from checkpoint form
pub trait ValueCodec: Send + Sync {
    /// Field type handled by this codec
    fn field_type(&self) -> FieldType;

    /// Canonicalize a non-null value
    fn canonicalize(&self, value: &JsonValue) -> Result<JsonValue>;

    /// Order two canonical values
    fn compare(&self, a: &JsonValue, b: &JsonValue) -> Option<Ordering>;

    /// Convert a row value into its checkpoint representation
    fn encode(&self, value: &JsonValue) -> Result<JsonValue> {
        if value.is_null() {
            return Ok(JsonValue::Null);
        }
        self.canonicalize(value)
    }

    /// Read a checkpoint value back
    fn decode(&self, value: &JsonValue) -> Result<JsonValue> {
        if value.is_null() {
            return Ok(JsonValue::Null);
        }
        let canonical = self.canonicalize(value)?;
        if json_kind(&canonical) != json_kind(value) {
            return Err(Error::codec(
                self.field_type(),
                value,
                format!("expected a JSON {}", json_kind(&canonical)),
            ));
        }
        Ok(canonical)
    }
}

/// Name of the JSON kind of a value
pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
