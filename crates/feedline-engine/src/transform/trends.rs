//! Interest-over-time rows, one per timeline point.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use feedline_types::{TransformError, WarehouseRow};
use serde_json::Value;

use super::normalize::column_names;

pub const PARTIAL_COLUMN: &str = "isPartial";

/// Build rows from `{"keywords": [...], "timelineData": [...]}`.
///
/// `row_id` is the point's epoch `time`; the observation timestamp is that
/// epoch in UTC. Each keyword becomes a normalized column holding its
/// interest value, and the provider's `isPartial` flag is kept
/// (absent means `false`).
///
/// # Errors
///
/// Returns [`TransformError`] for missing keywords or timeline, keywords
/// that normalize to clashing columns, or a point whose `time` or `value`
/// is unusable.
pub fn transform_trends(
    body: &Value,
    captured_at: DateTime<Utc>,
) -> Result<Vec<WarehouseRow>, TransformError> {
    let keywords = keywords(body)?;
    let columns =
        column_names(&keywords).map_err(|reason| TransformError::invalid("keywords", reason))?;
    let timeline = body
        .get("timelineData")
        .ok_or_else(|| TransformError::missing("timelineData"))?
        .as_array()
        .ok_or_else(|| TransformError::invalid("timelineData", "expected an array"))?;

    timeline
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let row_id = point_time(point, i)?;
            let observed = DateTime::from_timestamp(row_id, 0)
                .ok_or_else(|| {
                    TransformError::invalid(
                        format!("timelineData[{i}].time"),
                        format!("{row_id} is out of range"),
                    )
                })?
                .naive_utc();

            let values = point
                .get("value")
                .ok_or_else(|| TransformError::missing(format!("timelineData[{i}].value")))?
                .as_array()
                .ok_or_else(|| {
                    TransformError::invalid(format!("timelineData[{i}].value"), "expected an array")
                })?;
            if values.len() != columns.len() {
                return Err(TransformError::invalid(
                    format!("timelineData[{i}].value"),
                    format!("{} value(s) for {} keyword(s)", values.len(), columns.len()),
                ));
            }

            let mut row_columns: BTreeMap<String, Value> = columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            let partial = point
                .get(PARTIAL_COLUMN)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            row_columns.insert(PARTIAL_COLUMN.to_string(), Value::Bool(partial));

            Ok(WarehouseRow {
                ingestion_timestamp: captured_at,
                observation_timestamp: observed,
                row_id,
                payload: point.to_string(),
                columns: row_columns,
            })
        })
        .collect()
}

fn keywords(body: &Value) -> Result<Vec<String>, TransformError> {
    body.get("keywords")
        .ok_or_else(|| TransformError::missing("keywords"))?
        .as_array()
        .ok_or_else(|| TransformError::invalid("keywords", "expected an array"))?
        .iter()
        .enumerate()
        .map(|(i, k)| {
            k.as_str()
                .map(str::to_string)
                .ok_or_else(|| TransformError::invalid(format!("keywords[{i}]"), "expected a string"))
        })
        .collect()
}

/// The provider sends `time` as a decimal string; accept integers too.
fn point_time(point: &Value, i: usize) -> Result<i64, TransformError> {
    let field = || format!("timelineData[{i}].time");
    match point.get("time") {
        None => Err(TransformError::missing(field())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| TransformError::invalid(field(), format!("'{s}': {e}"))),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| TransformError::invalid(field(), "expected an integer")),
        Some(_) => Err(TransformError::invalid(field(), "expected an epoch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    fn body() -> Value {
        json!({
            "keywords": ["jacka", "paraply", "storm", "mössa", "päls"],
            "timelineData": [
                {"time": "1709424000", "formattedTime": "3 mars 2024", "value": [61, 12, 4, 33, 9]},
                {"time": "1709510400", "formattedTime": "4 mars 2024", "value": [58, 10, 5, 30, 8]},
                {"time": "1709596800", "formattedTime": "5 mars 2024", "value": [55, 11, 3, 29, 7], "isPartial": true}
            ]
        })
    }

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn one_row_per_point_with_epoch_row_id() {
        let rows = transform_trends(&body(), captured()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row_id, 1_709_424_000);
        assert_eq!(
            rows[0].observation_timestamp,
            NaiveDate::from_ymd_opt(2024, 3, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(rows[2].ingestion_timestamp, captured());
    }

    #[test]
    fn keyword_columns_are_normalized() {
        let rows = transform_trends(&body(), captured()).unwrap();
        let columns = &rows[0].columns;
        assert_eq!(columns["jacka"], 61);
        assert_eq!(columns["mossa"], 33);
        assert_eq!(columns["pals"], 9);
        assert!(!columns.contains_key("mössa"));
    }

    #[test]
    fn partial_flag_is_kept() {
        let rows = transform_trends(&body(), captured()).unwrap();
        assert_eq!(rows[0].columns[PARTIAL_COLUMN], false);
        assert_eq!(rows[2].columns[PARTIAL_COLUMN], true);
    }

    #[test]
    fn numeric_time_is_accepted() {
        let body = json!({"keywords": ["glass"], "timelineData": [{"time": 1_709_424_000, "value": [40]}]});
        let rows = transform_trends(&body, captured()).unwrap();
        assert_eq!(rows[0].row_id, 1_709_424_000);
    }

    #[test]
    fn value_count_must_match_keywords() {
        let body = json!({"keywords": ["glass", "sill"], "timelineData": [{"time": "1", "value": [40]}]});
        let err = transform_trends(&body, captured()).unwrap_err();
        assert_eq!(err.field, "timelineData[0].value");
    }

    #[test]
    fn unparseable_time_is_a_transform_error() {
        let body = json!({"keywords": ["glass"], "timelineData": [{"time": "soon", "value": [40]}]});
        let err = transform_trends(&body, captured()).unwrap_err();
        assert_eq!(err.field, "timelineData[0].time");
    }

    #[test]
    fn clashing_keywords_are_rejected() {
        let body = json!({"keywords": ["mössa", "mossa"], "timelineData": []});
        let err = transform_trends(&body, captured()).unwrap_err();
        assert_eq!(err.field, "keywords");
    }

    #[test]
    fn missing_timeline_is_reported() {
        let err = transform_trends(&json!({"keywords": ["glass"]}), captured()).unwrap_err();
        assert_eq!(err.field, "timelineData");
    }
}
