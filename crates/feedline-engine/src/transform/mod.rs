//! Raw provider payloads to warehouse rows.
//!
//! Transforms are pure: the same payload and `captured_at` always produce
//! identical rows, and `row_id` depends only on the payload.

pub mod normalize;
pub mod trends;
pub mod weather;

use chrono::{DateTime, Utc};
use feedline_types::{RawPayload, SourceKind, TransformError, WarehouseRow};

pub use normalize::normalize_column;

/// Transform a payload according to its source.
///
/// # Errors
///
/// Returns [`TransformError`] when a required field is missing or
/// unparseable. Never retryable.
pub fn transform(
    payload: &RawPayload,
    captured_at: DateTime<Utc>,
) -> Result<Vec<WarehouseRow>, TransformError> {
    match payload.source() {
        SourceKind::Weather => weather::transform_weather(payload.body(), captured_at),
        SourceKind::Trends => trends::transform_trends(payload.body(), captured_at),
    }
}
