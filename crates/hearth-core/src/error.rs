//! Error types module
//!
//! Every failure the media pipeline can report is unified under [`AppError`].
//! The variants follow the pipeline's taxonomy: validation happens before any
//! bytes are touched, compression and upload failures abort a batch, and
//! deletion failures are logged by the coordinator rather than returned.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is on and
//! falls back to a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like cleanup failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// by whatever routing layer sits in front of the pipeline.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPLOAD_FAILURE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Compression failure: {0}")]
    CompressionFailure(String),

    #[error("Upload failure: {0}")]
    UploadFailure(String),

    #[error("Deletion failure: {0}")]
    DeletionFailure(String),

    /// A create/update batch failed after the parent row was handled.
    ///
    /// No media rows were written for the batch; objects uploaded before the
    /// failure stay in the object store. `file` is the file that failed, or
    /// `None` when every upload succeeded but the rows could not be recorded.
    #[error("Media batch failed for parent {parent_id}: {reason}")]
    MediaBatchFailed {
        parent_id: Uuid,
        parent_retained: bool,
        file: Option<String>,
        reason: String,
    },

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Upload image files within the size and count limits"),
            false,
            LogLevel::Debug,
        ),
        AppError::CompressionFailure(_) => (
            422,
            "COMPRESSION_FAILURE",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::UploadFailure(_) => (
            502,
            "UPLOAD_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::DeletionFailure(_) => (
            502,
            "DELETION_FAILURE",
            true,
            None,
            true,
            LogLevel::Warn,
        ),
        AppError::MediaBatchFailed { .. } => (
            502,
            "MEDIA_BATCH_FAILED",
            true,
            Some("Re-attach the media to the existing record"),
            false,
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Config(_) => (
            500,
            "CONFIGURATION_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::CompressionFailure(_) => "CompressionFailure",
            AppError::UploadFailure(_) => "UploadFailure",
            AppError::DeletionFailure(_) => "DeletionFailure",
            AppError::MediaBatchFailed { .. } => "MediaBatchFailed",
            AppError::Database(_) => "Database",
            AppError::NotFound(_) => "NotFound",
            AppError::Config(_) => "Config",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ref msg) => msg.clone(),
            AppError::CompressionFailure(ref msg) => {
                format!("Image could not be processed: {}", msg)
            }
            AppError::UploadFailure(_) => "Failed to store media".to_string(),
            AppError::DeletionFailure(_) => "Failed to remove media from storage".to_string(),
            AppError::MediaBatchFailed {
                parent_id,
                parent_retained,
                file,
                ..
            } => {
                let cause = match file {
                    Some(file) => format!("'{}' could not be stored", file),
                    None => "media could not be recorded".to_string(),
                };
                if *parent_retained {
                    format!("Record {} was saved without its media: {}", parent_id, cause)
                } else {
                    format!("Record was not saved: {}", cause)
                }
            }
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Config(_) => "Service misconfigured".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_validation() {
        let err = AppError::Validation("content type text/plain is not an image".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "content type text/plain is not an image");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_media_batch_failed_message_mentions_retained_parent() {
        let parent_id = Uuid::new_v4();
        let err = AppError::MediaBatchFailed {
            parent_id,
            parent_retained: true,
            file: Some("poster.png".to_string()),
            reason: "connection reset".to_string(),
        };
        let message = err.client_message();
        assert!(message.contains(&parent_id.to_string()));
        assert!(message.contains("without its media"));
        assert!(message.contains("poster.png"));
        assert_eq!(err.error_code(), "MEDIA_BATCH_FAILED");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_media_batch_failed_message_when_parent_removed() {
        let err = AppError::MediaBatchFailed {
            parent_id: Uuid::new_v4(),
            parent_retained: false,
            file: Some("poster.png".to_string()),
            reason: "boom".to_string(),
        };
        assert!(err.client_message().starts_with("Record was not saved"));
    }

    #[test]
    fn test_media_batch_failed_message_when_rows_not_recorded() {
        let parent_id = Uuid::new_v4();
        let err = AppError::MediaBatchFailed {
            parent_id,
            parent_retained: true,
            file: None,
            reason: "pool timed out".to_string(),
        };
        assert_eq!(
            err.client_message(),
            format!("Record {} was saved without its media: media could not be recorded", parent_id)
        );
        assert!(err.to_string().contains("pool timed out"));
    }

    #[test]
    fn test_deletion_failure_is_only_a_warning() {
        let err = AppError::DeletionFailure("503 from provider".to_string());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert!(err.suggested_action().is_none());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("socket closed").context("upload to bucket"));
        let details = err.detailed_message();
        assert!(details.contains("Caused by"));
        assert_eq!(err.error_type(), "Internal");
    }
}
