//! Upstream provider clients for feedline.
//!
//! [`UpstreamClient`] is the fetch contract the engine depends on.
//! [`HttpUpstream`] routes a [`FetchRequest`] to the weather or trends
//! provider over one shared `reqwest::Client`. Clients never retry;
//! retrying is the engine's job.

pub mod client;
pub mod trends;
pub mod weather;

use async_trait::async_trait;
use feedline_types::{FetchRequest, QueryParams, RawPayload, SourceKind, UpstreamError};

pub use client::build_http_client;
pub use trends::{TrendsClient, TrendsSettings};
pub use weather::WeatherClient;

/// Fetch contract: one logical upstream call per invocation.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Issue the request and return the provider's structured body.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on timeout, connection failure, non-2xx
    /// status, or a body that is not the expected JSON document.
    async fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, UpstreamError>;
}

/// Routes requests by [`SourceKind`] to the configured provider client.
pub struct HttpUpstream {
    weather: Option<WeatherClient>,
    trends: Option<TrendsClient>,
}

impl HttpUpstream {
    #[must_use]
    pub fn new(weather: Option<WeatherClient>, trends: Option<TrendsClient>) -> Self {
        Self { weather, trends }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, UpstreamError> {
        let read_timeout = request.timeouts().read;
        match request.params() {
            QueryParams::Weather { location, date } => {
                let client = self.weather.as_ref().ok_or_else(|| {
                    UpstreamError::unsupported("weather upstream is not configured")
                })?;
                let body = client.fetch_day(location, *date, read_timeout).await?;
                Ok(RawPayload::new(SourceKind::Weather, body))
            }
            QueryParams::Trends(query) => {
                let client = self.trends.as_ref().ok_or_else(|| {
                    UpstreamError::unsupported("trends upstream is not configured")
                })?;
                let body = client.interest_over_time(query, read_timeout).await?;
                Ok(RawPayload::new(SourceKind::Trends, body))
            }
        }
    }
}
