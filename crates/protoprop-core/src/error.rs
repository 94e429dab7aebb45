//! Error types for the protoprop-core library.
//!
//! This module provides error handling using the `thiserror` crate. One variant,
//! [`Error::NotYetResolvable`], is a scheduling signal rather than a failure: it is
//! raised while a referenced type has no strategy yet and is consumed by the module
//! loader's fixed-point loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for protoprop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all protoprop operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A referenced enum or message type has no strategy in the table yet
    #[error("type '{type_name}' has not been resolved yet")]
    NotYetResolvable {
        /// Fully-qualified name of the missing type
        type_name: String,
    },

    /// The schema uses a feature the compiler does not handle
    #[error("unsupported schema at '{field}': {reason}")]
    UnsupportedSchema {
        /// Fully-qualified name of the offending field or type
        field: String,
        /// What is unsupported about it
        reason: String,
    },

    /// Message types that never converged to a strategy
    #[error("could not resolve message types: {}", types.join(", "))]
    Unresolvable {
        /// Fully-qualified names of the unresolved types
        types: Vec<String>,
    },

    /// Modules whose dependencies can never be satisfied
    #[error("cyclic or missing module dependencies: {}", modules.join(", "))]
    DependencyCycle {
        /// File names of the modules that could not be scheduled
        modules: Vec<String>,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode or link a file descriptor set
    #[error("failed to build descriptor pool: {0}")]
    DescriptorDecode(#[from] prost_reflect::DescriptorError),
}

impl Error {
    /// Creates a new not-yet-resolvable signal
    pub fn not_yet_resolvable(type_name: impl Into<String>) -> Self {
        Self::NotYetResolvable {
            type_name: type_name.into(),
        }
    }

    /// Creates a new unsupported schema error
    pub fn unsupported(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSchema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns true if resolution should be retried once more types are loaded
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::NotYetResolvable { .. })
    }

    /// Returns true if the error only concerns the type being resolved
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedSchema { .. })
    }
}
