//! Unified error types for webctx.
//!
//! Per-URL fetch failures are not errors: the orchestrator records them as
//! outcomes. These variants cover admin operations, the cache backend and
//! the fetch pipeline's internal plumbing.

use std::fmt;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Description of a rejected context set document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProblem {
    pub message: String,
    /// 1-based line, when the JSON parser could locate the problem.
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// Path of the offending entry, e.g. `gastronomie.urls[2]`.
    pub field: Option<String>,
}

impl ParseProblem {
    pub fn at_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { message: message.into(), line: None, column: None, field: Some(field.into()) }
    }
}

impl From<serde_json::Error> for ParseProblem {
    fn from(err: serde_json::Error) -> Self {
        let line = err.line();
        let column = err.column();
        Self {
            message: err.to_string(),
            line: (line > 0).then_some(line),
            column: (column > 0).then_some(column),
            field: None,
        }
    }
}

impl fmt::Display for ParseProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{field}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let (Some(line), Some(column)) = (self.line, self.column)
            && !self.message.contains(" at line ")
        {
            write!(f, " (line {line}, column {column})")?;
        }
        Ok(())
    }
}

/// Unified error types for webctx.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty message and no tags).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Content extraction failed.
    #[error("EXTRACT_FAILED: {0}")]
    ExtractFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cache policy rejected (zero or negative TTL).
    #[error("CACHE_ERROR: invalid policy: {0}")]
    InvalidPolicy(String),

    /// Context set document could not be parsed; the previous registry stays active.
    #[error("REGISTRY_PARSE: {0}")]
    RegistryParse(ParseProblem),

    /// Context set document could not be read.
    #[error("REGISTRY_IO: {0}")]
    RegistryIo(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// Robots.txt disallowed access.
    #[error("ROBOTS_DISALLOWED: {0}")]
    RobotsDisallowed(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::ExtractFailed(_) => -32000,
            Error::Database(_) | Error::MigrationFailed(_) | Error::InvalidPolicy(_) => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::SsrfBlocked(_) => -32004,
            Error::RobotsDisallowed(_) => -32005,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::HttpError(_) => -32008,
            Error::RegistryParse(_) => -32013,
            Error::RegistryIo(_) => -32014,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
