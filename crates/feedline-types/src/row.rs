//! Append-only warehouse fact rows.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Datetime wire format shared by every destination (`YYYY-MM-DD HH:MM:SS`).
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One fact row destined for a warehouse table.
///
/// `row_id` is derived from the provider's epoch field so that replaying the
/// same observation always yields the same id; downstream de-duplication
/// relies on it. `ingestion_timestamp` is the only field that differs
/// between replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRow {
    #[serde(with = "utc_datetime")]
    pub ingestion_timestamp: DateTime<Utc>,
    #[serde(with = "naive_datetime")]
    pub observation_timestamp: NaiveDateTime,
    pub row_id: i64,
    /// Provider's per-observation record, serialized as JSON.
    pub payload: String,
    /// Extra top-level columns (normalized trends keywords). Empty for weather.
    #[serde(flatten, default)]
    pub columns: BTreeMap<String, Value>,
}

impl WarehouseRow {
    /// Render as a flat JSON object: the four fixed columns plus `columns`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(
            "ingestion_timestamp".into(),
            Value::String(self.ingestion_timestamp.format(DATETIME_FMT).to_string()),
        );
        object.insert(
            "observation_timestamp".into(),
            Value::String(self.observation_timestamp.format(DATETIME_FMT).to_string()),
        );
        object.insert("row_id".into(), Value::from(self.row_id));
        object.insert("payload".into(), Value::String(self.payload.clone()));
        for (name, value) in &self.columns {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

mod utc_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FMT;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(DATETIME_FMT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
            .map(|ndt| ndt.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

mod naive_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATETIME_FMT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(DATETIME_FMT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(serde::de::Error::custom)
    }
}
