//! Skill Registry
//!
//! The facade a host links against: discovery, lookup, search, and
//! sandboxed execution. `run()` always resolves to a normalized
//! `ExecutionResult`: validation failures, spawn errors, timeouts, and
//! non-zero exits are all folded into the result rather than raised, so
//! any host layer can serialize the outcome without exception handling.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::RegistryConfig;
use crate::discovery::{self, LoadReport};
use crate::index::{RegistryStats, SkillIndex};
use crate::manifest::{Category, InputKind, InputSpec, SkillManifest, SkillSummary};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::schema::{ManifestSchema, ValidationReport};
use crate::search::{self, SearchHit};

/// How an execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No skill registered under the requested name
    NotFound,
    /// Payload missing a required field; no process was spawned
    Validation,
    /// The OS could not create the process
    Spawn,
    /// Execution exceeded its bound; the process group was killed
    Timeout,
    /// The skill exited non-zero
    Runtime,
}

/// Normalized outcome of one `run()` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Wall-clock seconds, sub-second resolution
    pub duration: f64,
    pub exit_code: i32,
    pub token_savings: Option<String>,
    pub timed_out: bool,
}

impl ExecutionResult {
    fn failure(kind: FailureKind, error: String, start: Instant) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error),
            kind: Some(kind),
            duration: start.elapsed().as_secs_f64(),
            exit_code: -1,
            token_savings: None,
            timed_out: kind == FailureKind::Timeout,
        }
    }
}

/// Execution options for `run()`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the manifest's declared timeout
    pub timeout: Option<Duration>,
}

/// The skill registry.
///
/// The index is an immutable snapshot behind an `RwLock<Arc<_>>`:
/// `load_all()` builds a fresh index and swaps it in atomically, so a
/// reader racing a reload observes either the old or the new index,
/// never a partially-built one. Execution imposes no serialization: N
/// concurrent `run()` calls spawn N independent children; a host facing
/// untrusted callers puts its own semaphore in front.
pub struct SkillRegistry {
    config: RegistryConfig,
    schema: ManifestSchema,
    sandbox: Sandbox,
    index: RwLock<Arc<SkillIndex>>,
}

impl SkillRegistry {
    /// Create a registry for the configured skills root. No scan happens
    /// until `load_all()` is called.
    pub fn new(config: RegistryConfig) -> Self {
        let schema = ManifestSchema::load(&config.root);
        let sandbox = Sandbox::new(SandboxConfig {
            max_output_bytes: config.max_output_bytes,
            env_mode: config.env_mode.clone(),
            privilege_drop: config.privilege_drop.clone(),
        });
        Self {
            config,
            schema,
            sandbox,
            index: RwLock::new(Arc::new(SkillIndex::default())),
        }
    }

    /// Create a registry and run an initial discovery pass.
    pub fn open(config: RegistryConfig) -> (Self, LoadReport) {
        let registry = Self::new(config);
        let report = registry.load_all();
        (registry, report)
    }

    /// Discover and load all skills, replacing the index wholesale.
    pub fn load_all(&self) -> LoadReport {
        let (manifests, report) = discovery::scan(
            &self.config.root,
            &self.schema,
            self.config.default_timeout,
        );
        let fresh = Arc::new(SkillIndex::build(manifests));
        *self.index.write() = fresh;
        info!(
            total = report.total,
            errors = report.errors.len(),
            root = %self.config.root.display(),
            "skill discovery pass complete"
        );
        report
    }

    fn snapshot(&self) -> Arc<SkillIndex> {
        self.index.read().clone()
    }

    /// All skills, sorted by name.
    pub fn list(&self) -> Vec<SkillSummary> {
        self.snapshot().list()
    }

    /// Skills in one category, sorted by name.
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<SkillManifest>> {
        self.snapshot().list_by_category(category)
    }

    /// Look up a skill by its unique name.
    pub fn get(&self, name: &str) -> Option<Arc<SkillManifest>> {
        self.snapshot().get(name)
    }

    /// Relevance search; see `search::search` for scoring and ordering.
    pub fn search(&self, query: &str, tags: &[String]) -> Vec<SearchHit> {
        search::search(&self.snapshot(), query, tags)
    }

    /// Validate a raw manifest document against the loaded schema.
    pub fn validate(&self, manifest: &serde_json::Value) -> ValidationReport {
        self.schema.validate(manifest)
    }

    /// Counts over the current snapshot.
    pub fn stats(&self) -> RegistryStats {
        self.snapshot().stats()
    }

    /// Execute a skill with the given payload. At-most-once: there are
    /// no retries here, and every expected failure category comes back
    /// as a normalized result.
    pub async fn run(
        &self,
        name: &str,
        input: serde_json::Value,
        opts: RunOptions,
    ) -> ExecutionResult {
        let start = Instant::now();

        let Some(skill) = self.get(name) else {
            return ExecutionResult::failure(
                FailureKind::NotFound,
                format!("skill '{name}' not found"),
                start,
            );
        };

        // Presence-only payload check; nested schemas are never inspected.
        let violations = validate_input(&skill.input, &input);
        if !violations.is_empty() {
            return ExecutionResult::failure(
                FailureKind::Validation,
                format!("invalid input: {}", violations.join(", ")),
                start,
            );
        }

        let timeout = opts.timeout.unwrap_or(skill.timeout);
        let payload = match serde_json::to_vec(&input) {
            Ok(bytes) => bytes,
            Err(e) => {
                return ExecutionResult::failure(
                    FailureKind::Validation,
                    format!("unserializable input: {e}"),
                    start,
                );
            }
        };

        let outcome = self
            .sandbox
            .execute(&skill.command, &skill.dir, &payload, timeout)
            .await;

        match outcome {
            Err(e) => ExecutionResult::failure(
                FailureKind::Spawn,
                format!("failed to spawn '{}': {e}", skill.command.program),
                start,
            ),
            Ok(res) if res.timed_out => {
                let mut error = format!("skill timed out after {} seconds", timeout.as_secs());
                if !res.group_killed {
                    error.push_str(" (best-effort cancellation; process group kill unavailable)");
                }
                ExecutionResult {
                    success: false,
                    output: None,
                    error: Some(error),
                    kind: Some(FailureKind::Timeout),
                    duration: start.elapsed().as_secs_f64(),
                    exit_code: -1,
                    token_savings: None,
                    timed_out: true,
                }
            }
            Ok(res) if res.success => ExecutionResult {
                success: true,
                output: Some(res.stdout.trim().to_string()),
                error: None,
                kind: None,
                duration: start.elapsed().as_secs_f64(),
                exit_code: res.exit_code,
                token_savings: skill.token_savings.clone(),
                timed_out: false,
            },
            Ok(res) => ExecutionResult {
                success: false,
                output: None,
                error: Some(format!(
                    "skill exited with code {}: {}",
                    res.exit_code,
                    res.stderr.trim()
                )),
                kind: Some(FailureKind::Runtime),
                duration: start.elapsed().as_secs_f64(),
                exit_code: res.exit_code,
                token_savings: None,
                timed_out: false,
            },
        }
    }
}

/// Check the payload against the declared input contract: a `json` skill
/// needs an object carrying every required key; a `text` skill needs a
/// string. Presence only; declared nested schemas are opaque here.
fn validate_input(spec: &InputSpec, input: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    match spec.kind {
        InputKind::Json => match input.as_object() {
            Some(map) => {
                for field in &spec.required {
                    if !map.contains_key(field) {
                        errors.push(format!("missing required field: {field}"));
                    }
                }
            }
            None => errors.push("input must be a JSON object".to_string()),
        },
        InputKind::Text => {
            if !input.is_string() {
                errors.push("input must be a string".to_string());
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: InputKind, required: &[&str]) -> InputSpec {
        InputSpec {
            kind,
            required: required.iter().map(|s| s.to_string()).collect(),
            schema: None,
        }
    }

    #[test]
    fn test_required_fields_checked() {
        let errors = validate_input(&spec(InputKind::Json, &["x", "y"]), &json!({"x": 1}));
        assert_eq!(errors, vec!["missing required field: y".to_string()]);
    }

    #[test]
    fn test_json_input_must_be_object() {
        let errors = validate_input(&spec(InputKind::Json, &[]), &json!([1, 2]));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_text_input_must_be_string() {
        assert!(validate_input(&spec(InputKind::Text, &[]), &json!("hello")).is_empty());
        assert_eq!(validate_input(&spec(InputKind::Text, &[]), &json!({})).len(), 1);
    }

    #[test]
    fn test_nested_schema_not_inspected() {
        let mut s = spec(InputKind::Json, &["x"]);
        s.schema = Some(json!({"properties": {"x": {"type": "number"}}}));
        // x is a string, not the declared number; presence is all we check
        assert!(validate_input(&s, &json!({"x": "not-a-number"})).is_empty());
    }

    #[test]
    fn test_execution_result_serializes_camel_case() {
        let result = ExecutionResult::failure(
            FailureKind::Timeout,
            "skill timed out after 1 seconds".to_string(),
            Instant::now(),
        );
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["success"], json!(false));
        assert_eq!(v["exitCode"], json!(-1));
        assert_eq!(v["timedOut"], json!(true));
        assert_eq!(v["kind"], json!("timeout"));
        assert!(v.get("output").is_none());
    }
}
