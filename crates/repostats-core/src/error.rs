//! Error types for repostats-core

use thiserror::Error;

/// Errors raised while fetching traffic reports from the REST API.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The API answered with a non-2xx status.
    #[error("{report} request failed with HTTP {status}: {message}")]
    Status {
        report: &'static str,
        status: u16,
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("{report} request timed out")]
    Timeout { report: &'static str },

    /// Connection, TLS or body transfer failure.
    #[error("{report} request failed: {message}")]
    Transport {
        report: &'static str,
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// Writing a report body to local storage failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// HTTP status code, when the failure came from an API response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while packaging reports into the run archive.
#[derive(Error, Debug)]
pub enum PackagingError {
    /// An input report file does not exist.
    #[error("input file missing: {0}")]
    MissingInput(String),

    /// An input path exists but is not a regular file.
    #[error("input is not a regular file: {0}")]
    NotAFile(String),

    /// A component of the archive name is empty after normalisation.
    #[error("invalid archive name component {field}: {value:?}")]
    InvalidName { field: &'static str, value: String },

    /// An archive with the same name already exists in the output directory.
    #[error("archive already exists: {0}")]
    AlreadyExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip encoder error
    #[error("zip error: {0}")]
    Zip(String),
}

impl From<zip::result::ZipError> for PackagingError {
    fn from(err: zip::result::ZipError) -> Self {
        PackagingError::Zip(err.to_string())
    }
}

/// Errors raised while assembling the run configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Repository must be given as `owner/name`.
    #[error("invalid repository {0:?}: expected owner/name")]
    InvalidRepository(String),

    /// A setting held a value outside its accepted range.
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_includes_status() {
        let err = FetchError::Status {
            report: "views",
            status: 401,
            message: "Bad credentials".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("views"));
        assert!(msg.contains("401"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_timeout_has_no_status() {
        let err = FetchError::Timeout { report: "clones" };
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_packaging_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PackagingError = io.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidRepository("widget".to_string());
        assert!(err.to_string().contains("owner/name"));
        assert_eq!(
            ConfigError::Missing("GITHUB_TOKEN").to_string(),
            "missing required setting: GITHUB_TOKEN"
        );
    }
}
