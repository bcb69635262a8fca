//! Error types for deploy-warden

use std::io;

use thiserror::Error;

/// Result type alias for deploy-warden
pub type Result<T> = std::result::Result<T, Error>;

/// Policy engine errors
///
/// Configuration and upstream variants are fatal to an evaluation and are
/// surfaced to the caller; they are never mapped to a deny decision.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (malformed policy document, invalid field)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule reference names no rule in the policy
    #[error("Unknown approval rule: {0}")]
    UnknownRule(String),

    /// The named-rule reference graph contains a cycle
    #[error("Cyclic approval rule reference: {0}")]
    CyclicRule(String),

    /// A pattern failed to compile as either regex or glob
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern as written in the policy
        pattern: String,
        /// Compiler diagnostic
        reason: String,
    },

    /// A roster lookup against the hosting provider failed
    #[error("Roster lookup failed for {key}: {reason}")]
    RosterFetch {
        /// Cache key of the failed lookup (`org` or `org/slug`)
        key: String,
        /// Underlying failure
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns `true` for errors the caller may retry (transient upstream
    /// failures), `false` for configuration errors that need a policy fix.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RosterFetch { .. } | Self::Io(_))
    }
}
