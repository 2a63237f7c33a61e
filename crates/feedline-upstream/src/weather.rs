//! Hourly forecast provider client.

use std::time::Duration;

use chrono::NaiveDate;
use feedline_types::UpstreamError;
use reqwest::Client;
use serde_json::Value;

use crate::client::{classify, read_json};

/// Forecast client: `GET <base_url>?key=<api_key>&q=<location>&date=<date>`.
#[derive(Clone)]
pub struct WeatherClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for WeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

impl WeatherClient {
    #[must_use]
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Fetch the forecast document for one location and day.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on transport failure, non-2xx status or a
    /// non-JSON body.
    pub async fn fetch_day(
        &self,
        location: &str,
        date: NaiveDate,
        read_timeout: Duration,
    ) -> Result<Value, UpstreamError> {
        let date = date.format("%Y-%m-%d").to_string();
        tracing::debug!(location, date, "Fetching weather forecast");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", location),
                ("date", date.as_str()),
            ])
            .timeout(read_timeout)
            .send()
            .await
            .map_err(classify)?;

        let body = read_json(response, "weather provider", false).await?;
        tracing::info!(location, date, "Fetched weather forecast");
        Ok(body)
    }
}
