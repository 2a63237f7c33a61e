//! Hourly weather forecast rows.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use feedline_types::{TransformError, WarehouseRow};
use serde_json::{json, Value};

/// Provider format for `location.localtime`.
const LOCALTIME_FMT: &str = "%Y-%m-%d %H:%M";

const HOURS_POINTER: &str = "/forecast/forecastday/0/hour";

/// One row per hourly entry.
///
/// Accepts the provider's raw document (`forecast.forecastday[0].hour`) or
/// the reshaped `{location, hour}` document produced by [`reshape`].
/// Every row shares the observation timestamp parsed from
/// `location.localtime`.
///
/// # Errors
///
/// Returns [`TransformError`] when `location.localtime` or any
/// `time_epoch` is missing or unparseable.
pub fn transform_weather(
    body: &Value,
    captured_at: DateTime<Utc>,
) -> Result<Vec<WarehouseRow>, TransformError> {
    let observed = observation_time(body)?;
    let hours = hourly_entries(body)?;

    hours
        .iter()
        .enumerate()
        .map(|(i, hour)| {
            let row_id = hour
                .get("time_epoch")
                .ok_or_else(|| TransformError::missing(format!("hour[{i}].time_epoch")))?
                .as_i64()
                .ok_or_else(|| {
                    TransformError::invalid(format!("hour[{i}].time_epoch"), "expected an integer")
                })?;
            Ok(WarehouseRow {
                ingestion_timestamp: captured_at,
                observation_timestamp: observed,
                row_id,
                payload: hour.to_string(),
                columns: BTreeMap::new(),
            })
        })
        .collect()
}

/// Reduce a raw provider document to `{location, hour}`.
///
/// # Errors
///
/// Returns [`TransformError`] when `location` or the hourly list is absent.
pub fn reshape(body: &Value) -> Result<Value, TransformError> {
    let location = body
        .get("location")
        .ok_or_else(|| TransformError::missing("location"))?;
    let hours = hourly_entries(body)?;
    Ok(json!({ "location": location, "hour": hours }))
}

fn observation_time(body: &Value) -> Result<NaiveDateTime, TransformError> {
    let localtime = body
        .get("location")
        .ok_or_else(|| TransformError::missing("location"))?
        .get("localtime")
        .ok_or_else(|| TransformError::missing("location.localtime"))?
        .as_str()
        .ok_or_else(|| TransformError::invalid("location.localtime", "expected a string"))?;
    NaiveDateTime::parse_from_str(localtime.trim(), LOCALTIME_FMT)
        .map_err(|e| TransformError::invalid("location.localtime", format!("'{localtime}': {e}")))
}

fn hourly_entries(body: &Value) -> Result<&Vec<Value>, TransformError> {
    if let Some(hour) = body.get("hour") {
        return hour
            .as_array()
            .ok_or_else(|| TransformError::invalid("hour", "expected an array"));
    }
    body.pointer(HOURS_POINTER)
        .ok_or_else(|| TransformError::missing("forecast.forecastday[0].hour"))?
        .as_array()
        .ok_or_else(|| TransformError::invalid("forecast.forecastday[0].hour", "expected an array"))
}
