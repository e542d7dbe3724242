use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Reserved field name carrying the snapshot timestamp.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One complete read of device state at a point in time.
///
/// A snapshot is built once per poll cycle, serialized, and dropped. There is
/// no mutable access after construction: the `with_field` builder consumes
/// `self`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// When the read completed.
    timestamp: DateTime<Utc>,

    /// Device fields, keyed by field name.
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    /// Create an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create an empty snapshot with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Add a device field to this snapshot.
    ///
    /// The reserved name `timestamp` is ignored so the stamp cannot be
    /// shadowed by a device field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let name = name.into();
        if name != TIMESTAMP_FIELD {
            self.fields.insert(name, value.into());
        }
        self
    }

    /// Add a field only when the device reported it.
    pub fn with_optional_field<V: Into<FieldValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_field(name, value),
            None => self,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// RFC 3339 timestamp with millisecond precision, as published on the bus.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Look up a device field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterate over device fields (the timestamp is not included).
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of device fields, excluding the timestamp.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp_string())?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Scalar value of a snapshot field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    /// Whole number (states, amps, seconds).
    Integer(i64),

    /// Floating point measurement (power, energy, voltage).
    Float(f64),

    /// Text value (firmware version, identifiers).
    Text(String),

    /// Boolean flag.
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            // Keep the fractional part so 1200.0 matches its JSON form
            FieldValue::Float(v) => write!(f, "{:?}", v),
            FieldValue::Text(v) => f.write_str(v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}
