//! Skill Index
//!
//! Immutable name-to-descriptor snapshot. A discovery pass builds a fresh
//! index which the registry swaps in atomically; readers holding the old
//! snapshot keep a consistent view until they drop it.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::manifest::{Category, SkillManifest, SkillSummary};

/// Registry statistics over one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    /// Keyed by singular category name
    #[serde(rename = "byCategory")]
    pub by_category: BTreeMap<String, usize>,
}

/// One immutable snapshot of the registry contents.
#[derive(Debug, Default)]
pub struct SkillIndex {
    skills: HashMap<String, Arc<SkillManifest>>,
}

impl SkillIndex {
    /// Build an index from manifests in discovery order. Name collisions
    /// resolve last-write-wins, logged so operators can spot them.
    pub fn build(manifests: Vec<SkillManifest>) -> Self {
        let mut skills: HashMap<String, Arc<SkillManifest>> = HashMap::new();
        for manifest in manifests {
            if let Some(previous) = skills.get(&manifest.name) {
                warn!(
                    skill = %manifest.name,
                    kept = %manifest.dir.display(),
                    dropped = %previous.dir.display(),
                    "duplicate skill name; later manifest wins"
                );
            }
            skills.insert(manifest.name.clone(), Arc::new(manifest));
        }
        Self { skills }
    }

    pub fn get(&self, name: &str) -> Option<Arc<SkillManifest>> {
        self.skills.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SkillManifest>> {
        self.skills.values()
    }

    /// All skills as summaries, sorted by name.
    pub fn list(&self) -> Vec<SkillSummary> {
        let mut out: Vec<SkillSummary> =
            self.skills.values().map(|m| SkillSummary::from(m.as_ref())).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Skills in one category, sorted by name.
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<SkillManifest>> {
        let mut out: Vec<Arc<SkillManifest>> = self
            .skills
            .values()
            .filter(|m| m.category == category)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_category = BTreeMap::new();
        for manifest in self.skills.values() {
            *by_category
                .entry(manifest.category.as_str().to_string())
                .or_insert(0) += 1;
        }
        RegistryStats {
            total: self.skills.len(),
            by_category,
        }
    }
}
