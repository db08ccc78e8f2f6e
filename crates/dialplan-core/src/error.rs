//! Error types for dialplan operations

use thiserror::Error;

/// SQLSTATE raised by PostgreSQL for a unique constraint violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE raised by PostgreSQL when a referenced table does not exist.
const PG_UNDEFINED_TABLE: &str = "42P01";

/// Dialplan service errors
#[derive(Error, Debug)]
pub enum DialplanError {
    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Generic backing store failure (connection, query, pool exhaustion)
    #[error("Backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    /// A table the service depends on is missing. This is a provisioning
    /// defect rather than a query-time failure.
    #[error("Backing table missing: {0}")]
    BackingTableMissing(String),

    /// Malformed input on a write path
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The identity service could not be reached or answered with a failure
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The call-leg deadline elapsed
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DialplanError {
    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new BackingStoreUnavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::BackingStoreUnavailable(msg.into())
    }

    /// Create a new InvalidArgument error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new UpstreamUnavailable error
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BackingStoreUnavailable(_) => "backing_store_unavailable",
            Self::BackingTableMissing(_) => "backing_table_missing",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status used when the error crosses the REST surface
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::BackingStoreUnavailable(_) | Self::BackingTableMissing(_) => 503,
            Self::InvalidArgument(_) => 400,
            Self::UpstreamUnavailable(_) => 502,
            Self::Timeout(_) => 504,
            Self::Config(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<sqlx::Error> for DialplanError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(PG_UNIQUE_VIOLATION) => Self::Conflict(db_err.message().to_string()),
                Some(PG_UNDEFINED_TABLE) => Self::BackingTableMissing(db_err.message().to_string()),
                _ => Self::BackingStoreUnavailable(err.to_string()),
            },
            _ => Self::BackingStoreUnavailable(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for DialplanError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for dialplan operations
pub type Result<T> = std::result::Result<T, DialplanError>;
