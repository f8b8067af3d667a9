//! Error types
//!
//! Discovery errors are batched into the `LoadReport` rather than aborting
//! a scan; execution failures are folded into the normalized
//! `ExecutionResult`. These types cover the remaining structured cases.

use std::path::PathBuf;

/// A single manifest failing to load. Non-fatal: the skill is simply
/// excluded from the index and the error string is batched.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid manifest {path:?}: {reasons}")]
    Schema { path: PathBuf, reasons: String },

    #[error("category mismatch in {path:?}: expected '{expected}', got '{found}'")]
    CategoryMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("empty run command in manifest '{name}'")]
    EmptyCommand { name: String },
}
