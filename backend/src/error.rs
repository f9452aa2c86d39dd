//! Error types for the scheduler core.
//!
//! Only setup paths are fallible: loading configuration, validating a
//! location or building a job from a definition. Time searches and scores
//! report "nothing found" through `Option` and sentinel scores instead.

use thiserror::Error;

/// Result type for scheduler setup operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur while configuring the scheduler or building jobs
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Observer location is out of range
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Job definition cannot produce a consistent job
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::InvalidJob("declination 95 out of range".to_string());
        assert_eq!(err.to_string(), "Invalid job: declination 95 out of range");
    }

    #[test]
    fn test_toml_error_conversion() {
        let parsed: Result<toml::Value, _> = toml::from_str("[limits\nenabled = true");
        let err: SchedulerError = parsed.unwrap_err().into();
        assert!(matches!(err, SchedulerError::Toml(_)));
        assert!(err.to_string().starts_with("TOML error"));
    }
}
