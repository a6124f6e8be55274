//! Error types for the Travlog application.

use thiserror::Error;

/// A shared error type for the entire Travlog application.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone)]
pub enum TravlogError {
    /// The orchestration graph exceeded its per-turn step limit.
    ///
    /// This is an expected failure mode of the cyclic rewrite/retry loops,
    /// not a crash. The turn boundary maps it to a fixed fallback message.
    #[error("recursion limit of {limit} steps exceeded")]
    RecursionLimit { limit: usize },

    /// An external port call (grading, generation or retrieval) failed.
    #[error("{capability} port call failed: {message}")]
    Port {
        capability: &'static str,
        message: String,
    },

    /// A grader response that is neither a structured yes/no nor parseable
    /// JSON containing one. Treated as a hard backend contract violation.
    #[error("malformed grader judgment: {raw}")]
    MalformedJudgment { raw: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TravlogError {
    /// Creates a RecursionLimit error
    pub fn recursion_limit(limit: usize) -> Self {
        Self::RecursionLimit { limit }
    }

    /// Creates a Port error
    pub fn port(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Port {
            capability,
            message: message.into(),
        }
    }

    /// Creates a MalformedJudgment error
    pub fn malformed_judgment(raw: impl Into<String>) -> Self {
        Self::MalformedJudgment { raw: raw.into() }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Serialization error
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a RecursionLimit error
    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. })
    }

    /// Check if this is a Port error
    pub fn is_port(&self) -> bool {
        matches!(self, Self::Port { .. })
    }

    /// Check if this is a MalformedJudgment error
    pub fn is_malformed_judgment(&self) -> bool {
        matches!(self, Self::MalformedJudgment { .. })
    }
}

impl From<std::io::Error> for TravlogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for TravlogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, TravlogError>`.
pub type Result<T> = std::result::Result<T, TravlogError>;
