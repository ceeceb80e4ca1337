// src/error.rs

//! Error types for the smelt core
//!
//! Parse and concretization errors abort the whole operation; build errors
//! are scoped to a single node and propagated to its dependents by the
//! installer rather than through this type.

use crate::concretize::ConflictReport;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed spec string; no partial spec is produced
    #[error("parse error at byte {offset} in {text:?}: {message}")]
    Parse {
        text: String,
        offset: usize,
        message: String,
    },

    /// No assignment satisfies all constraints (UNSAT)
    #[error("concretization failed: {0}")]
    Concretization(ConflictReport),

    /// A virtual dependency has no known provider
    #[error("no provider known for virtual package '{virtual_name}' (required by {requester})")]
    MissingProvider {
        virtual_name: String,
        requester: String,
    },

    /// A build lock could not be acquired within the configured timeout
    #[error("could not acquire build lock for {hash} after {waited_ms} ms")]
    LockTimeout { hash: String, waited_ms: u64 },

    /// The build executor reported failure for a node
    #[error("build of {spec} failed: {message}")]
    Build { spec: String, message: String },

    /// An install database record is unreadable or inconsistent
    #[error("install record for {hash} is corrupt: {message}")]
    DatabaseCorruption { hash: String, message: String },

    /// The dependency relation is not a DAG
    #[error("dependency cycle: {cycle}")]
    CyclicDependency { cycle: String },

    /// Package metadata is missing or inconsistent
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Configuration file problem
    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for parse errors
    pub fn parse(text: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            text: text.into(),
            offset,
            message: message.into(),
        }
    }
}
