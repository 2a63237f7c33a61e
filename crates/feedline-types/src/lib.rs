//! Shared feedline data model and error taxonomy.
//!
//! Kept free of I/O dependencies so the upstream, sink and engine crates can
//! all share it without circular dependencies.

pub mod cohort;
pub mod error;
pub mod load;
pub mod payload;
pub mod request;
pub mod row;

pub use cohort::{Cohort, CohortKind, TableRef};
pub use error::{LoadError, TransformError, UpstreamError, UpstreamErrorKind};
pub use load::{LoadResult, RowRejection};
pub use payload::RawPayload;
pub use request::{FetchRequest, QueryParams, SourceKind, Timeouts, TrendsQuery};
pub use row::WarehouseRow;
