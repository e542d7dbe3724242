use serde::Serialize;

use crate::error::{Error, Result};
use crate::snapshot::FieldValue;

/// Encode a value as a JSON payload.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(Error::from)
}

/// Payload for a per-field sensor topic: the plain string form of the value.
pub fn field_payload(value: &FieldValue) -> Vec<u8> {
    value.to_string().into_bytes()
}
