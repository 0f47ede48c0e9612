/*!
 * Error types for the boundary pipeline
 */

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// No ancestor of the start directory holds a `data-config` folder
    #[error("Could not locate repository root from working dir: {}", .start.display())]
    RepoRootNotFound { start: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A layer record lacks a key the current stage needs
    #[error("Missing required key '{field}' in layer config: {layer}")]
    MissingField { field: &'static str, layer: String },

    /// The split attribute does not exist in the source table
    #[error("{file} is missing columns: [{column}] (available: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        file: String,
        available: Vec<String>,
    },

    /// YAML layer file could not be parsed
    #[error("Error parsing YAML file {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Archive download failed (transport, status or write)
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Archive extraction failed
    #[error("Failed to extract {}: {message}", .path.display())]
    Archive { path: PathBuf, message: String },

    /// Geometry file could not be read or decoded
    #[error("Could not read {}: {message}", .path.display())]
    GeoRead { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal error
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl PipelineError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::RepoRootNotFound { .. }
            | PipelineError::Config(_)
            | PipelineError::MissingField { .. }
            | PipelineError::MissingColumn { .. }
            | PipelineError::Yaml { .. } => ErrorCategory::Configuration,
            PipelineError::Download { .. } => ErrorCategory::Network,
            PipelineError::Archive { .. } => ErrorCategory::Archive,
            PipelineError::GeoRead { .. } => ErrorCategory::Geometry,
            PipelineError::Io(_) | PipelineError::WalkDir(_) => ErrorCategory::IoError,
            PipelineError::Json(_) => ErrorCategory::Codec,
        }
    }

    pub(crate) fn geo_read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        PipelineError::GeoRead {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Layer files, settings, repository layout
    Configuration,
    /// Download failures
    Network,
    /// Corrupt or unreadable archives
    Archive,
    /// Unreadable shapefiles or GeoJSON
    Geometry,
    /// Filesystem errors
    IoError,
    /// Serialization errors
    Codec,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Archive => write!(f, "archive"),
            ErrorCategory::Geometry => write!(f, "geometry"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Codec => write!(f, "codec"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err = PipelineError::MissingField {
            field: "url",
            layer: "ranger_districts".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.exit_code(), EXIT_FATAL);

        let err = PipelineError::RepoRootNotFound {
            start: PathBuf::from("/tmp"),
        };
        assert_eq!(err.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_runtime_errors_are_partial() {
        let err = PipelineError::Download {
            url: "https://example.invalid/a.zip".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.exit_code(), EXIT_PARTIAL);

        let err = PipelineError::Io(io::Error::other("disk full"));
        assert_eq!(err.exit_code(), EXIT_PARTIAL);
    }

    #[test]
    fn test_missing_column_lists_available() {
        let err = PipelineError::MissingColumn {
            column: "FORESTNAME".to_string(),
            file: "S_USA.AdministrativeForest.shp".to_string(),
            available: vec!["ADMINFORES".to_string(), "REGION".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "S_USA.AdministrativeForest.shp is missing columns: [FORESTNAME] (available: ADMINFORES, REGION)"
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
        assert_eq!(ErrorCategory::Geometry.to_string(), "geometry");
    }
}
