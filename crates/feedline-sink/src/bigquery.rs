//! Analytical warehouse loader using the BigQuery streaming insert API.
//!
//! Rows are sent to `tabledata.insertAll` in chunks. Each row carries
//! `insertId = row_id`, which lets the warehouse drop replays on a
//! best-effort basis; delivery is otherwise at-least-once.

use async_trait::async_trait;
use feedline_types::{LoadError, LoadResult, RowRejection, TableRef, WarehouseRow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::BatchLoader;
use crate::error::SinkError;

pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Rows per `insertAll` request (provider recommendation).
const INSERT_ALL_CHUNK_SIZE: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrors>,
}

#[derive(Debug, Deserialize)]
struct InsertErrors {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

/// Streaming-insert loader.
#[derive(Clone)]
pub struct BigQueryLoader {
    http: Client,
    api_base: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for BigQueryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryLoader")
            .field("api_base", &self.api_base)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl BigQueryLoader {
    /// `access_token` is a pre-provisioned bearer token; `None` sends no
    /// `Authorization` header (e.g. behind an authenticating proxy).
    #[must_use]
    pub fn new(http: Client, api_base: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn insert_all_url(&self, destination: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.api_base, destination.project, destination.dataset, destination.table
        )
    }

    async fn insert_chunk(
        &self,
        url: &str,
        chunk: &[WarehouseRow],
    ) -> Result<InsertAllResponse, SinkError> {
        let mut request = self.http.post(url).json(&insert_all_body(chunk));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(SinkError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(InsertAllResponse::default());
        }
        serde_json::from_str(&text).map_err(|e| SinkError::Api {
            status: status.as_u16(),
            message: format!("unreadable insertAll response: {e}"),
        })
    }
}

/// Request body for one chunk.
fn insert_all_body(rows: &[WarehouseRow]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "insertId": row.row_id.to_string(),
                "json": row.to_json(),
            })
        })
        .collect();
    json!({
        "kind": "bigquery#tableDataInsertAllRequest",
        "skipInvalidRows": false,
        "ignoreUnknownValues": false,
        "rows": rows,
    })
}

/// Translate chunk-relative insert errors into batch-relative rejections.
fn rejections_for_chunk(
    response: InsertAllResponse,
    chunk: &[WarehouseRow],
    offset: usize,
) -> Vec<RowRejection> {
    response
        .insert_errors
        .into_iter()
        .map(|entry| {
            let reason = entry
                .errors
                .iter()
                .map(|e| {
                    if e.message.is_empty() {
                        e.reason.clone()
                    } else {
                        format!("{}: {}", e.reason, e.message)
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            RowRejection {
                index: offset + entry.index,
                row_id: chunk.get(entry.index).map(|row| row.row_id),
                reason,
            }
        })
        .collect()
}

#[async_trait]
impl BatchLoader for BigQueryLoader {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    async fn append(
        &self,
        rows: &[WarehouseRow],
        destination: &TableRef,
    ) -> Result<LoadResult, LoadError> {
        let url = self.insert_all_url(destination);
        let attempted = rows.len() as u64;
        let mut written = 0u64;
        let mut rejections = Vec::new();

        for (chunk_index, chunk) in rows.chunks(INSERT_ALL_CHUNK_SIZE).enumerate() {
            let offset = chunk_index * INSERT_ALL_CHUNK_SIZE;
            let response = self.insert_chunk(&url, chunk).await.map_err(|e| LoadError {
                destination: destination.clone(),
                errors: vec![e.to_string()],
                rows_attempted: attempted,
                rows_written: written,
            })?;

            let chunk_rejections = rejections_for_chunk(response, chunk, offset);
            // skipInvalidRows=false: one bad row stops the whole chunk.
            if chunk_rejections.is_empty() {
                written += chunk.len() as u64;
            } else {
                tracing::warn!(
                    destination = %destination,
                    offset,
                    rejected = chunk_rejections.len(),
                    "Warehouse rejected rows in chunk"
                );
                rejections.extend(chunk_rejections);
            }
        }

        Ok(LoadResult {
            destination: destination.clone(),
            rows_attempted: attempted,
            rows_written: written,
            rejections,
        })
    }
}
