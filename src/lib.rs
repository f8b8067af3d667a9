//! Skillbox
//!
//! Sandboxed skill registry: discovers independently-authored executable
//! "skills", validates their manifests, indexes them for search, and runs
//! them as isolated child processes under hard time, output, and
//! privilege bounds.
//!
//! # Architecture
//!
//! ```text
//! skills root ──► Discovery ──► Skill Index ──► Search
//!   (scan)        (validate)      (snapshot)      │
//!                                     │           │
//!                                     └──► Execution Sandbox
//!                                              │
//!                                        Normalized result
//! ```
//!
//! # Skill Format
//!
//! Each skill lives in a category directory under the skills root and is
//! described by a `manifest.json`:
//!
//! ```json
//! {
//!   "name": "csv-summarizer",
//!   "version": "1.0.0",
//!   "category": "transformer",
//!   "description": "Summarize CSV files",
//!   "tags": ["csv", "data"],
//!   "input": { "type": "json", "required": ["file"] },
//!   "output": { "type": "json" },
//!   "run": "node run.js",
//!   "timeout": 30,
//!   "tokenSavings": "~2k tokens per call"
//! }
//! ```
//!
//! # Security
//!
//! Skill execution is sandboxed:
//! - each child runs in its own process group; timeouts SIGKILL the
//!   whole group, so forked grandchildren cannot dodge cancellation
//! - when the host runs as root, children drop to an unprivileged
//!   account (configurable, `nobody`/65534 by default)
//! - the child environment is `PATH` plus a mode flag, nothing else
//! - captured output is bounded by a hard byte ceiling

pub mod config;
pub mod discovery;
pub mod error;
pub mod index;
pub mod manifest;
pub mod registry;
pub mod sandbox;
pub mod schema;
pub mod search;

pub use config::RegistryConfig;
pub use discovery::{CategoryReport, LoadReport};
pub use error::ManifestError;
pub use index::{RegistryStats, SkillIndex};
pub use manifest::{Category, InputKind, InputSpec, OutputSpec, RunCommand, SkillManifest, SkillSummary};
pub use registry::{ExecutionResult, FailureKind, RunOptions, SkillRegistry};
pub use sandbox::{PrivilegeDrop, Sandbox, SandboxConfig, SandboxResult};
pub use schema::{ManifestSchema, ValidationReport};
pub use search::SearchHit;
