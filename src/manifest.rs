//! Skill Manifest Definitions
//!
//! Core data structures for the skill registry. A skill is an external
//! executable described by a `manifest.json` file; the raw file shape is
//! `RawManifest`, and `SkillManifest` is the loaded in-memory descriptor
//! with the run command pre-parsed and the timeout resolved.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ManifestError;

/// Fixed skill categories. The manifest carries the singular form; the
/// registry scans the plural directory names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Generator,
    Transformer,
    Analyzer,
    Connector,
    Builder,
    Validator,
}

impl Category {
    /// All categories, in discovery scan order.
    pub const ALL: [Category; 6] = [
        Category::Generator,
        Category::Transformer,
        Category::Analyzer,
        Category::Connector,
        Category::Builder,
        Category::Validator,
    ];

    /// Singular form used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Transformer => "transformer",
            Self::Analyzer => "analyzer",
            Self::Connector => "connector",
            Self::Builder => "builder",
            Self::Validator => "validator",
        }
    }

    /// Plural directory name scanned during discovery.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Generator => "generators",
            Self::Transformer => "transformers",
            Self::Analyzer => "analyzers",
            Self::Connector => "connectors",
            Self::Builder => "builders",
            Self::Validator => "validators",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared input contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    /// How the skill parses stdin
    #[serde(rename = "type")]
    pub kind: InputKind,
    /// Top-level keys the payload must contain
    #[serde(default)]
    pub required: Vec<String>,
    /// Opaque nested schema; carried through, never inspected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// Input payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Json,
    Text,
}

/// Declared output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Run command parsed once at load time: executable plus argument list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl RunCommand {
    /// Split a `run` string on whitespace. Empty commands are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Exact shape of a `manifest.json` file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    pub name: String,
    pub version: String,
    pub category: Category,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub input: InputSpec,
    pub output: OutputSpec,
    pub run: String,
    /// Seconds; absent or non-positive falls back to the registry default
    pub timeout: Option<i64>,
    #[serde(rename = "tokenSavings")]
    pub token_savings: Option<String>,
}

/// A loaded skill descriptor. Created only during a discovery pass and
/// immutable for the lifetime of its index snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SkillManifest {
    pub name: String,
    pub version: String,
    pub category: Category,
    pub description: String,
    pub tags: Vec<String>,
    pub input: InputSpec,
    pub output: OutputSpec,
    /// Pre-parsed run command
    pub command: RunCommand,
    /// Effective timeout, always positive
    #[serde(skip)]
    pub timeout: Duration,
    #[serde(rename = "tokenSavings")]
    pub token_savings: Option<String>,
    /// Directory containing the manifest; run commands resolve here
    pub dir: PathBuf,
}

impl SkillManifest {
    /// Build a descriptor from the raw file shape.
    pub fn from_raw(
        raw: RawManifest,
        dir: &Path,
        default_timeout: Duration,
    ) -> Result<Self, ManifestError> {
        let command = RunCommand::parse(&raw.run)
            .ok_or_else(|| ManifestError::EmptyCommand { name: raw.name.clone() })?;

        let timeout = match raw.timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => default_timeout,
        };

        Ok(Self {
            name: raw.name,
            version: raw.version,
            category: raw.category,
            description: raw.description,
            tags: raw.tags,
            input: raw.input,
            output: raw.output,
            command,
            timeout,
            token_savings: raw.token_savings,
            dir: dir.to_path_buf(),
        })
    }
}

/// Summary row returned by `list()`.
#[derive(Debug, Clone, Serialize)]
pub struct SkillSummary {
    pub name: String,
    pub version: String,
    pub category: Category,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "tokenSavings")]
    pub token_savings: Option<String>,
}

impl From<&SkillManifest> for SkillSummary {
    fn from(m: &SkillManifest) -> Self {
        Self {
            name: m.name.clone(),
            version: m.version.clone(),
            category: m.category,
            description: m.description.clone(),
            tags: m.tags.clone(),
            token_savings: m.token_savings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(run: &str, timeout: Option<i64>) -> RawManifest {
        serde_json::from_value(serde_json::json!({
            "name": "csv-summarizer",
            "version": "1.2.0",
            "category": "transformer",
            "description": "Summarize CSV files",
            "tags": ["csv", "data"],
            "input": { "type": "json", "required": ["file"] },
            "output": { "type": "json" },
            "run": run,
            "timeout": timeout,
        }))
        .unwrap()
    }

    #[test]
    fn test_run_command_parsed_at_load() {
        let m = SkillManifest::from_raw(
            raw("node run.js --fast", None),
            Path::new("/skills/transformers/csv"),
            Duration::from_secs(60),
        )
        .unwrap();

        assert_eq!(m.command.program, "node");
        assert_eq!(m.command.args, vec!["run.js", "--fast"]);
    }

    #[test]
    fn test_empty_run_command_rejected() {
        let err = SkillManifest::from_raw(
            raw("   ", None),
            Path::new("/skills"),
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert!(err.to_string().contains("csv-summarizer"));
    }

    #[test]
    fn test_timeout_defaults() {
        let default = Duration::from_secs(60);
        let m = SkillManifest::from_raw(raw("node run.js", None), Path::new("/s"), default).unwrap();
        assert_eq!(m.timeout, default);

        // Non-positive timeouts fall back too
        let m = SkillManifest::from_raw(raw("node run.js", Some(0)), Path::new("/s"), default).unwrap();
        assert_eq!(m.timeout, default);

        let m = SkillManifest::from_raw(raw("node run.js", Some(5)), Path::new("/s"), default).unwrap();
        assert_eq!(m.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Generator.as_str(), "generator");
        assert_eq!(Category::Generator.dir_name(), "generators");
        let cat: Category = serde_json::from_str("\"validator\"").unwrap();
        assert_eq!(cat, Category::Validator);
    }
}
