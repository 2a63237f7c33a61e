//! Sink error types.

/// Errors produced while connecting to or writing into a destination.
///
/// Surfaced to callers as [`LoadError`](feedline_types::LoadError) with the
/// destination attached; kept typed here so constructors can report them.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Underlying `PostgreSQL` failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Transport failure talking to the warehouse API.
    #[error("warehouse request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Warehouse API answered with a non-2xx status.
    #[error("warehouse returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Table or dataset name is not a safe identifier.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("loader lock poisoned")]
    LockPoisoned,

    /// Blocking task was cancelled or panicked.
    #[error("loader task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        // Strip URLs so tokens in query strings never reach logs.
        Self::Http(err.without_url())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_displays_context() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = SinkError::Sqlite(inner);
        let msg = err.to_string();
        assert!(msg.contains("sqlite"), "got: {msg}");
    }

    #[test]
    fn lock_poisoned_displays() {
        let err = SinkError::LockPoisoned;
        assert_eq!(err.to_string(), "loader lock poisoned");
    }

    #[test]
    fn api_error_carries_status() {
        let err = SinkError::Api {
            status: 404,
            message: "Not found: Table team-god:weather_data.missing".into(),
        };
        assert!(err.to_string().starts_with("warehouse returned 404"));
    }

    #[test]
    fn invalid_identifier_names_value() {
        let err = SinkError::InvalidIdentifier("drop table".into());
        assert_eq!(err.to_string(), "invalid identifier 'drop table'");
    }
}
