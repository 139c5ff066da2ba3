//! Error types.
//!
//! Adapter errors are recovered by the aggregator, generation errors are
//! terminal for clustering and isolated per narrative during enrichment,
//! validation errors stop the program before a run starts.

use thiserror::Error;

/// Errors raised by a signal source.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),

    #[error("All {0} requests failed")]
    AllRequestsFailed(usize),

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdapterError::Parse(e.to_string())
        } else {
            AdapterError::Http(e.to_string())
        }
    }
}

/// The generator answered, but not with the JSON shape we asked for.
#[derive(Debug, Error)]
#[error("Malformed generation: {reason}")]
pub struct MalformedGenerationError {
    pub reason: String,
}

impl MalformedGenerationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the generative backend or while reading its output.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Cannot connect to generator at {0}")]
    Connect(String),

    #[error("Generation request timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to send generation request: {0}")]
    Request(String),

    #[error("Generator API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Malformed(#[from] MalformedGenerationError),
}

impl GenerationError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        GenerationError::Malformed(MalformedGenerationError::new(reason))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, GenerationError::Malformed(_))
    }
}

/// Invalid command-line arguments or configuration values.
#[derive(Debug, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Narrative clustering failed: {0}")]
    Clustering(#[source] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_transparent() {
        let err = GenerationError::malformed("no JSON value found");
        assert!(err.is_malformed());
        assert_eq!(err.to_string(), "Malformed generation: no JSON value found");
    }

    #[test]
    fn test_clustering_error_message() {
        let err = PipelineError::Clustering(GenerationError::Api {
            status: 500,
            body: "model not loaded".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Narrative clustering failed: Generator API error 500: model not loaded"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("min_confidence", "must be between 0 and 100");
        assert_eq!(err.to_string(), "min_confidence: must be between 0 and 100");
    }
}
