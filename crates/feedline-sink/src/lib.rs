//! Batch loaders for feedline warehouse rows.
//!
//! Provides the [`BatchLoader`] trait and three implementations: the
//! analytical warehouse ([`BigQueryLoader`]) and two relational stores
//! ([`PostgresLoader`], [`SqliteLoader`]). Loaders append only; they never
//! update or delete.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod bigquery;
pub mod error;
pub mod identifier;
pub mod postgres;
pub mod sqlite;

pub use backend::BatchLoader;
pub use bigquery::BigQueryLoader;
pub use error::SinkError;
pub use postgres::{PostgresConfig, PostgresLoader};
pub use sqlite::SqliteLoader;
