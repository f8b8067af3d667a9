//! Manifest Schema Validation
//!
//! Loads `manifest-schema.json` from the skills root and checks raw
//! manifest documents against it: required top-level fields, category enum
//! membership, and semantic-version grammar.
//!
//! If the schema file is missing or unreadable, validation degrades to
//! "always valid" with a diagnostic entry. That fail-open posture is
//! intentional for a locally-run tool and is logged loudly at load time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Full semver grammar: major.minor.patch with optional pre-release and
/// build metadata.
static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("semver regex is valid")
});

/// Returns true if `version` is a well-formed semantic version.
pub fn is_valid_semver(version: &str) -> bool {
    SEMVER_RE.is_match(version)
}

/// Outcome of validating one manifest document.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn ok() -> Self {
        Self { valid: true, errors: Vec::new() }
    }
}

/// The parts of the schema document this registry actually enforces.
#[derive(Debug, Clone)]
struct SchemaRules {
    required: Vec<String>,
    category_enum: Vec<String>,
}

/// Manifest schema, loaded once per registry.
#[derive(Debug, Clone)]
pub struct ManifestSchema {
    rules: Option<SchemaRules>,
}

impl ManifestSchema {
    /// Load `manifest-schema.json` from the skills root. A missing or
    /// malformed schema yields the fail-open validator.
    pub fn load(root: &Path) -> Self {
        let path = root.join("manifest-schema.json");
        let rules = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(doc) => {
                    debug!(path = %path.display(), "loaded manifest schema");
                    Some(Self::extract_rules(&doc))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not parse manifest schema; validation is fail-open");
                    None
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load manifest schema; validation is fail-open");
                None
            }
        };
        Self { rules }
    }

    /// A validator that never loads a schema file. Used by hosts that
    /// embed their rules, and by tests.
    pub fn unavailable() -> Self {
        Self { rules: None }
    }

    fn extract_rules(doc: &serde_json::Value) -> SchemaRules {
        let required = doc["required"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let category_enum = doc["properties"]["category"]["enum"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        SchemaRules { required, category_enum }
    }

    /// Validate a raw manifest document.
    ///
    /// With no schema available this reports valid with a single
    /// diagnostic entry, never a failure.
    pub fn validate(&self, manifest: &serde_json::Value) -> ValidationReport {
        let Some(rules) = &self.rules else {
            return ValidationReport {
                valid: true,
                errors: vec!["schema not available".to_string()],
            };
        };

        let mut errors = Vec::new();

        for field in &rules.required {
            if manifest.get(field).is_none() {
                errors.push(format!("missing required field: {field}"));
            }
        }

        if let Some(category) = manifest.get("category").and_then(|v| v.as_str()) {
            if !rules.category_enum.is_empty()
                && !rules.category_enum.iter().any(|c| c == category)
            {
                errors.push(format!("invalid category: {category}"));
            }
        }

        if let Some(version) = manifest.get("version").and_then(|v| v.as_str()) {
            if !is_valid_semver(version) {
                errors.push(format!("invalid semantic version: {version}"));
            }
        }

        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport { valid: false, errors }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ManifestSchema {
        ManifestSchema {
            rules: Some(SchemaRules {
                required: ["name", "version", "category", "description", "run", "input", "output"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                category_enum: ["generator", "transformer", "analyzer", "connector", "builder", "validator"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }

    fn valid_manifest() -> serde_json::Value {
        json!({
            "name": "csv-summarizer",
            "version": "1.0.0",
            "category": "transformer",
            "description": "Summarize CSV files",
            "tags": ["csv"],
            "input": { "type": "json" },
            "output": { "type": "json" },
            "run": "node run.js"
        })
    }

    #[test]
    fn test_valid_manifest_passes_clean() {
        let report = schema().validate(&valid_manifest());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_missing_field_named_in_errors() {
        let mut m = valid_manifest();
        m.as_object_mut().unwrap().remove("description");
        let report = schema().validate(&m);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("description")));
    }

    #[test]
    fn test_bad_category_rejected() {
        let mut m = valid_manifest();
        m["category"] = json!("widget");
        let report = schema().validate(&m);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("widget")));
    }

    #[test]
    fn test_bad_semver_rejected() {
        let mut m = valid_manifest();
        m["version"] = json!("1.0");
        let report = schema().validate(&m);
        assert!(!report.valid);
    }

    #[test]
    fn test_semver_grammar() {
        assert!(is_valid_semver("0.1.0"));
        assert!(is_valid_semver("1.2.3-alpha.1"));
        assert!(is_valid_semver("1.2.3+build.42"));
        assert!(is_valid_semver("1.2.3-rc.1+sha.abc"));
        assert!(!is_valid_semver("1.2"));
        assert!(!is_valid_semver("01.2.3"));
        assert!(!is_valid_semver("v1.2.3"));
    }

    #[test]
    fn test_fail_open_without_schema() {
        let report = ManifestSchema::unavailable().validate(&json!({}));
        assert!(report.valid);
        assert_eq!(report.errors, vec!["schema not available".to_string()]);
    }
}
