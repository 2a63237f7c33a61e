//! Cohort orchestration: fetch with retry, transform, load.
//!
//! Each cohort runs the three stages in order. A failure is recorded in
//! the cohort's outcome and never stops other cohorts. Loads are not
//! retried: a failed load surfaces immediately so that the caller decides
//! whether to replay (replays are safe where the destination
//! de-duplicates on `row_id`).

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use feedline_sink::BatchLoader;
use feedline_types::{
    Cohort, CohortKind, FetchRequest, LoadResult, RawPayload, TableRef, Timeouts, TrendsQuery,
};
use feedline_upstream::UpstreamClient;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::FeedlineConfig;
use crate::errors::{CohortError, StageError};
use crate::result::{CohortFailure, CohortOutcome, CohortSuccess, OrchestrationReport};
use crate::retry::{with_retry, RetryPolicy};
use crate::transform::transform;

/// Where each kind of cohort lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub project: String,
    pub weather_dataset: String,
    pub weather_table: String,
    pub trends_dataset: String,
    pub trends_table_prefix: String,
}

impl Destinations {
    /// Weather shares one table; trends cohorts get `<prefix>_<suffix>`.
    #[must_use]
    pub fn resolve(&self, cohort: &Cohort) -> TableRef {
        match cohort.kind {
            CohortKind::Weather { .. } => {
                TableRef::new(&self.project, &self.weather_dataset, &self.weather_table)
            }
            CohortKind::Trends { .. } => TableRef::with_suffix(
                &self.project,
                &self.trends_dataset,
                &self.trends_table_prefix,
                cohort.table_suffix.as_deref(),
            ),
        }
    }

    #[must_use]
    pub fn weather(&self) -> TableRef {
        TableRef::new(&self.project, &self.weather_dataset, &self.weather_table)
    }
}

/// Query settings shared by every trends cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendsParams {
    pub timeframe: String,
    pub geo: String,
    pub category: u32,
    pub property: String,
}

impl Default for TrendsParams {
    fn default() -> Self {
        Self {
            timeframe: "today 3-m".to_string(),
            geo: "SE-AB".to_string(),
            category: 0,
            property: String::new(),
        }
    }
}

impl TrendsParams {
    fn query(&self, keywords: &[String]) -> TrendsQuery {
        TrendsQuery {
            keywords: keywords.to_vec(),
            timeframe: self.timeframe.clone(),
            geo: self.geo.clone(),
            category: self.category,
            property: self.property.clone(),
        }
    }
}

/// A completed cohort together with the rows it loaded.
#[derive(Debug, Clone)]
pub struct CohortRun {
    pub rows: Vec<feedline_types::WarehouseRow>,
    pub summary: CohortSuccess,
}

/// Drives cohorts through fetch, transform and load.
///
/// Holds shared read-only handles; cloning is cheap.
#[derive(Clone)]
pub struct Orchestrator {
    upstream: Arc<dyn UpstreamClient>,
    loader: Arc<dyn BatchLoader>,
    destinations: Destinations,
    retry: RetryPolicy,
    timeouts: Timeouts,
    trends: TrendsParams,
    parallelism: usize,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        loader: Arc<dyn BatchLoader>,
        destinations: Destinations,
    ) -> Self {
        Self {
            upstream,
            loader,
            destinations,
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            trends: TrendsParams::default(),
            parallelism: 1,
        }
    }

    /// Build from a validated config and pre-built handles.
    #[must_use]
    pub fn from_config(
        config: &FeedlineConfig,
        upstream: Arc<dyn UpstreamClient>,
        loader: Arc<dyn BatchLoader>,
    ) -> Self {
        let destinations = Destinations {
            project: config.warehouse.project.clone(),
            weather_dataset: config.weather.dataset.clone(),
            weather_table: config.weather.table.clone(),
            trends_dataset: config.trends.dataset.clone(),
            trends_table_prefix: config.trends.table_prefix.clone(),
        };
        let trends = &config.upstream.trends;
        Self::new(upstream, loader, destinations)
            .with_retry(config.retry_policy())
            .with_timeouts(config.timeouts())
            .with_trends_params(TrendsParams {
                timeframe: trends.timeframe.clone(),
                geo: trends.geo.clone(),
                category: trends.category,
                property: trends.property.clone(),
            })
            .with_parallelism(config.parallelism as usize)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_trends_params(mut self, trends: TrendsParams) -> Self {
        self.trends = trends;
        self
    }

    /// Maximum cohorts in flight. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    #[must_use]
    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    #[must_use]
    pub fn loader_name(&self) -> &'static str {
        self.loader.name()
    }

    fn fetch_request(&self, cohort: &Cohort) -> FetchRequest {
        match &cohort.kind {
            CohortKind::Weather { location, date } => {
                FetchRequest::weather(location.clone(), *date, self.timeouts)
            }
            CohortKind::Trends { keywords } => {
                FetchRequest::trends(self.trends.query(keywords), self.timeouts)
            }
        }
    }

    /// Run one cohort and keep the loaded rows.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError`] naming the stage that failed.
    pub async fn execute(&self, cohort: &Cohort) -> Result<CohortRun, CohortError> {
        let destination = self.destinations.resolve(cohort);
        let request = self.fetch_request(cohort);
        let started = Instant::now();
        tracing::info!(cohort = %cohort, destination = %destination, "Starting cohort");

        let fetched = with_retry(&self.retry, &cohort.name, || self.upstream.fetch(&request))
            .await
            .map_err(|e| {
                let attempts = e.attempts();
                CohortError::new(cohort.name.clone(), attempts, e)
            })?;
        let attempts = fetched.attempts;

        let rows = transform(&fetched.value, Utc::now())
            .map_err(|e| CohortError::new(cohort.name.clone(), attempts, e))?;

        let loaded = self
            .loader
            .load(&rows, &destination)
            .await
            .map_err(|e| CohortError::new(cohort.name.clone(), attempts, e))?;

        tracing::info!(
            cohort = %cohort,
            destination = %destination,
            attempts,
            rows = rows.len(),
            written = loaded.rows_written,
            duration_secs = started.elapsed().as_secs_f64(),
            "Cohort loaded"
        );
        Ok(CohortRun {
            summary: CohortSuccess {
                rows_loaded: loaded.rows_attempted,
                rows_written: loaded.rows_written,
                attempts,
            },
            rows,
        })
    }

    /// Run one cohort: fetch with retry, transform, load.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError`] naming the stage that failed.
    pub async fn run_cohort(&self, cohort: &Cohort) -> Result<CohortSuccess, CohortError> {
        self.execute(cohort).await.map(|run| run.summary)
    }

    /// Transform and load a payload that was fetched elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Transform`] or [`StageError::Load`].
    pub async fn load_payload(
        &self,
        payload: &RawPayload,
        destination: &TableRef,
    ) -> Result<LoadResult, StageError> {
        let rows = transform(payload, Utc::now())?;
        Ok(self.loader.load(&rows, destination).await?)
    }

    async fn outcome(&self, cohort: &Cohort) -> CohortOutcome {
        let destination = self.destinations.resolve(cohort);
        let result = self.run_cohort(cohort).await.map_err(|e| {
            tracing::error!(
                cohort = %cohort,
                stage = %e.stage(),
                attempts = e.attempts,
                error = %e.error,
                "Cohort failed"
            );
            CohortFailure::from(&e)
        });
        CohortOutcome {
            cohort: cohort.name.clone(),
            destination,
            result,
        }
    }

    /// Run every cohort, isolating failures.
    ///
    /// With parallelism 1 cohorts run one after another; otherwise up to
    /// `parallelism` cohorts are in flight. The report is always in input
    /// order.
    pub async fn run_all(&self, cohorts: &[Cohort]) -> OrchestrationReport {
        let outcomes = if self.parallelism <= 1 || cohorts.len() <= 1 {
            let mut outcomes = Vec::with_capacity(cohorts.len());
            for cohort in cohorts {
                outcomes.push(self.outcome(cohort).await);
            }
            outcomes
        } else {
            self.run_parallel(cohorts).await
        };

        let report = OrchestrationReport { outcomes };
        tracing::info!(
            cohorts = report.outcomes.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            rows_written = report.rows_written(),
            "Run finished"
        );
        report
    }

    async fn run_parallel(&self, cohorts: &[Cohort]) -> Vec<CohortOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut join_set = JoinSet::new();

        for (index, cohort) in cohorts.iter().cloned().enumerate() {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, this.outcome(&cohort).await)
            });
        }

        let mut slots: Vec<Option<CohortOutcome>> = vec![None; cohorts.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(join_err) => {
                    tracing::error!("Cohort task panicked: {join_err}");
                }
            }
        }

        slots
            .into_iter()
            .zip(cohorts)
            .map(|(slot, cohort)| {
                slot.unwrap_or_else(|| CohortOutcome {
                    cohort: cohort.name.clone(),
                    destination: self.destinations.resolve(cohort),
                    result: Err(CohortFailure {
                        stage: crate::errors::Stage::Fetch,
                        attempts: 0,
                        message: "cohort task panicked".to_string(),
                    }),
                })
            })
            .collect()
    }
}
