//! Error types for the points dashboard.
//!
//! This module defines a small hierarchy of error types:
//!
//! - [`ParseError`] - Upload parsing errors (the only errors meant to reach
//!   the uploading user)
//! - [`StoreError`] - State persistence errors (logged, never propagated to
//!   callers of the store)
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while parsing an uploaded file.
///
/// Only [`ParseError::Structural`] and [`ParseError::NoValidRows`] are
/// user-facing upload failures; row-level defects are silently normalized or
/// dropped by the parser and never escalate.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read the file at all.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// File extension is neither `.csv` nor `.xlsx`/`.xls`.
    #[error("Unsupported file format '{0}'. Please upload a .csv, .xlsx or .xls file.")]
    UnsupportedFormat(String),

    /// The decoder rejected the file wholesale.
    #[error("Failed to parse file. Please ensure it matches the template format.")]
    Structural(String),

    /// The file parsed but yielded zero admissible rows.
    #[error("No valid data found in file")]
    NoValidRows,
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors while persisting or rehydrating the data store state.
///
/// These never cross the store boundary: write failures are logged and the
/// in-memory state stays authoritative, read failures reset the store to
/// empty/unpublished defaults.
#[derive(Debug, Error)]
pub enum StoreError {
    /// State file read/write failed.
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state did not deserialize.
    #[error("State JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted last-update timestamp is not valid RFC 3339.
    #[error("Invalid persisted timestamp: {0}")]
    InvalidTimestamp(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Upload parsing error.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Malformed request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A second upload arrived while one was still being ingested.
    #[error("Another upload is already in progress")]
    UploadInProgress,

    /// Publish requested before any data was uploaded.
    #[error("No data uploaded yet")]
    NoRecords,

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for store persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_conversion() {
        // ParseError -> ServerError
        let parse_err = ParseError::NoValidRows;
        let server_err: ServerError = parse_err.into();
        assert!(server_err.to_string().contains("No valid data"));
    }

    #[test]
    fn test_structural_message_is_generic() {
        // The decoder detail stays out of the user-facing message.
        let err = ParseError::Structural("zip header mismatch".into());
        let msg = err.to_string();
        assert!(msg.contains("template format"));
        assert!(!msg.contains("zip header"));
    }

    #[test]
    fn test_unsupported_format_names_extension() {
        let err = ParseError::UnsupportedFormat("pdf".into());
        assert!(err.to_string().contains("pdf"));
    }
}
