//! Search-interest provider client.
//!
//! Interest over time is a two-step exchange: an `explore` call returns a
//! set of widgets, and the `TIMESERIES` widget's token and request are then
//! replayed against the `multiline` endpoint. Both responses are prefixed
//! with an anti-hijacking preamble that is stripped before parsing.
//!
//! The body handed to the transformer is
//! `{"keywords": [...], "timelineData": [...]}` so that keyword order
//! travels with the values.

use std::time::Duration;

use feedline_types::{TrendsQuery, UpstreamError};
use reqwest::Client;
use serde_json::{json, Value};

use crate::client::{classify, read_json};

const EXPLORE_PATH: &str = "/trends/api/explore";
const MULTILINE_PATH: &str = "/trends/api/widgetdata/multiline";
const TIMESERIES_WIDGET: &str = "TIMESERIES";

/// Provider-wide request settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendsSettings {
    /// Base URL without trailing slash, e.g. `https://trends.google.com`.
    pub base_url: String,
    /// Interface language, e.g. `"sv"`.
    pub hl: String,
    /// Timezone offset in minutes as the provider expects it.
    pub tz: i32,
}

/// Widget handle returned by the explore step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TimeseriesWidget {
    pub(crate) token: String,
    pub(crate) request: Value,
}

#[derive(Clone, Debug)]
pub struct TrendsClient {
    http: Client,
    settings: TrendsSettings,
}

impl TrendsClient {
    #[must_use]
    pub fn new(http: Client, settings: TrendsSettings) -> Self {
        Self { http, settings }
    }

    /// Fetch the interest-over-time series for one keyword set.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if either step fails or the provider
    /// response lacks the timeseries widget or timeline.
    pub async fn interest_over_time(
        &self,
        query: &TrendsQuery,
        read_timeout: Duration,
    ) -> Result<Value, UpstreamError> {
        tracing::debug!(keywords = ?query.keywords, geo = query.geo, "Exploring trends widgets");
        let widget = self.explore(query, read_timeout).await?;
        let timeline = self.multiline(&widget, read_timeout).await?;
        tracing::info!(
            keywords = ?query.keywords,
            points = timeline.as_array().map_or(0, Vec::len),
            "Fetched trends timeline"
        );
        Ok(json!({
            "keywords": query.keywords,
            "timelineData": timeline,
        }))
    }

    async fn explore(
        &self,
        query: &TrendsQuery,
        read_timeout: Duration,
    ) -> Result<TimeseriesWidget, UpstreamError> {
        let req = explore_request(query).to_string();
        let tz = self.settings.tz.to_string();
        let response = self
            .http
            .get(format!("{}{EXPLORE_PATH}", self.settings.base_url))
            .query(&[
                ("hl", self.settings.hl.as_str()),
                ("tz", tz.as_str()),
                ("req", req.as_str()),
            ])
            .timeout(read_timeout)
            .send()
            .await
            .map_err(classify)?;
        let body = read_json(response, "trends explore", true).await?;
        find_timeseries_widget(&body)
    }

    async fn multiline(
        &self,
        widget: &TimeseriesWidget,
        read_timeout: Duration,
    ) -> Result<Value, UpstreamError> {
        let req = widget.request.to_string();
        let tz = self.settings.tz.to_string();
        let response = self
            .http
            .get(format!("{}{MULTILINE_PATH}", self.settings.base_url))
            .query(&[
                ("req", req.as_str()),
                ("token", widget.token.as_str()),
                ("tz", tz.as_str()),
            ])
            .timeout(read_timeout)
            .send()
            .await
            .map_err(classify)?;
        let body = read_json(response, "trends multiline", true).await?;
        extract_timeline(body)
    }
}

/// Build the explore `req` parameter: one comparison item per keyword.
pub(crate) fn explore_request(query: &TrendsQuery) -> Value {
    let items: Vec<Value> = query
        .keywords
        .iter()
        .map(|keyword| {
            json!({
                "keyword": keyword,
                "time": query.timeframe,
                "geo": query.geo,
            })
        })
        .collect();
    json!({
        "comparisonItem": items,
        "category": query.category,
        "property": query.property,
    })
}

pub(crate) fn find_timeseries_widget(body: &Value) -> Result<TimeseriesWidget, UpstreamError> {
    let widgets = body
        .get("widgets")
        .and_then(Value::as_array)
        .ok_or_else(|| UpstreamError::parse("trends explore response has no widgets"))?;

    let widget = widgets
        .iter()
        .find(|w| w.get("id").and_then(Value::as_str) == Some(TIMESERIES_WIDGET))
        .ok_or_else(|| UpstreamError::parse("trends explore response has no TIMESERIES widget"))?;

    let token = widget
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::parse("TIMESERIES widget has no token"))?;
    let request = widget
        .get("request")
        .cloned()
        .ok_or_else(|| UpstreamError::parse("TIMESERIES widget has no request"))?;

    Ok(TimeseriesWidget {
        token: token.to_string(),
        request,
    })
}

pub(crate) fn extract_timeline(mut body: Value) -> Result<Value, UpstreamError> {
    match body.pointer_mut("/default/timelineData") {
        Some(timeline) if timeline.is_array() => Ok(timeline.take()),
        _ => Err(UpstreamError::parse(
            "trends multiline response has no default.timelineData",
        )),
    }
}
