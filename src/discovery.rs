//! Skill Discovery
//!
//! Scans the fixed category directories under the skills root for
//! `manifest.json` files, parses and validates each one, and collects
//! per-file errors without aborting the scan. One bad manifest never
//! takes down discovery; it is recorded and the skill is left out.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ManifestError;
use crate::manifest::{Category, RawManifest, SkillManifest};
use crate::schema::ManifestSchema;

/// Per-category slice of a discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub loaded: usize,
    pub errors: Vec<String>,
}

/// Aggregate result of a discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total: usize,
    /// Keyed by plural category directory name
    #[serde(rename = "byCategory")]
    pub by_category: BTreeMap<String, CategoryReport>,
    pub errors: Vec<String>,
}

/// Scan every category directory and load all valid manifests, in
/// discovery order. Later entries overwrite earlier ones when names
/// collide; the index build is where that resolution happens.
pub fn scan(
    root: &Path,
    schema: &ManifestSchema,
    default_timeout: Duration,
) -> (Vec<SkillManifest>, LoadReport) {
    let mut manifests = Vec::new();
    let mut report = LoadReport::default();

    for category in Category::ALL {
        let dir = root.join(category.dir_name());
        let mut cat_report = CategoryReport::default();

        if !dir.is_dir() {
            warn!(dir = %dir.display(), "category directory not found");
            report.by_category.insert(category.dir_name().to_string(), cat_report);
            continue;
        }

        let mut paths = Vec::new();
        find_manifests(&dir, &mut paths);

        for path in paths {
            match load_manifest(&path, category, schema, default_timeout) {
                Ok(manifest) => {
                    debug!(skill = %manifest.name, path = %path.display(), "loaded skill");
                    manifests.push(manifest);
                    cat_report.loaded += 1;
                    report.total += 1;
                }
                Err(e) => {
                    let msg = e.to_string();
                    warn!(path = %path.display(), "skipping manifest: {msg}");
                    cat_report.errors.push(msg.clone());
                    report.errors.push(msg);
                }
            }
        }

        report.by_category.insert(category.dir_name().to_string(), cat_report);
    }

    (manifests, report)
}

/// Recursively collect `manifest.json` paths. Entries are visited in
/// name order so a scan is deterministic across runs.
fn find_manifests(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "could not read directory");
        return;
    };

    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            find_manifests(&path, out);
        } else if entry.file_name() == "manifest.json" {
            out.push(path);
        }
    }
}

/// Parse and validate a single manifest file.
fn load_manifest(
    path: &Path,
    category: Category,
    schema: &ManifestSchema,
    default_timeout: Duration,
) -> Result<SkillManifest, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let doc: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let report = schema.validate(&doc);
    if !report.valid {
        return Err(ManifestError::Schema {
            path: path.to_path_buf(),
            reasons: report.errors.join(", "),
        });
    }

    // The manifest's category must match its containing directory
    let declared = doc.get("category").and_then(|v| v.as_str()).unwrap_or("");
    if declared != category.as_str() {
        return Err(ManifestError::CategoryMismatch {
            path: path.to_path_buf(),
            expected: category.as_str().to_string(),
            found: declared.to_string(),
        });
    }

    let raw: RawManifest =
        serde_json::from_value(doc).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let dir = path.parent().unwrap_or(Path::new("."));
    SkillManifest::from_raw(raw, dir, default_timeout)
}
