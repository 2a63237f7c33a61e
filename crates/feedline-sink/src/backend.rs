//! Batch loader trait definition.

use async_trait::async_trait;
use feedline_types::{LoadError, LoadResult, TableRef, WarehouseRow};

/// Append-only destination for warehouse rows.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn BatchLoader>`.
/// Callers go through [`BatchLoader::load`]; implementations provide
/// [`BatchLoader::append`].
#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Short backend name for logs (`"bigquery"`, `"postgres"`, `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Append `rows` to `destination`.
    ///
    /// An empty batch succeeds immediately without contacting the
    /// destination. Any row-level rejection fails the whole call, even when
    /// other rows were written.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the destination is unreachable, refuses the
    /// batch, or rejects any row.
    async fn load(
        &self,
        rows: &[WarehouseRow],
        destination: &TableRef,
    ) -> Result<LoadResult, LoadError> {
        if rows.is_empty() {
            tracing::debug!(destination = %destination, "Empty batch, nothing to load");
            return Ok(LoadResult::empty(destination.clone()));
        }

        let result = self.append(rows, destination).await?;
        tracing::info!(
            backend = self.name(),
            destination = %destination,
            attempted = result.rows_attempted,
            written = result.rows_written,
            rejected = result.rows_rejected(),
            "Batch appended"
        );
        result.into_outcome()
    }

    /// Backend-specific append of a non-empty batch.
    ///
    /// Row-level rejections are reported inside the returned [`LoadResult`];
    /// batch-level failures as [`LoadError`].
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] on batch-level failure.
    async fn append(
        &self,
        rows: &[WarehouseRow],
        destination: &TableRef,
    ) -> Result<LoadResult, LoadError>;
}
