//! Skill Search
//!
//! Token-based relevance scoring over an index snapshot. The query is
//! split on whitespace; each token scores +3 for a name match, +2 for a
//! description match, and +1 for any tag match (all case-insensitive
//! substring checks). An optional tag filter is applied before scoring:
//! a skill must contain every requested tag to be considered.
//!
//! Results are ordered by descending score, then ascending name.

use serde::Serialize;
use std::sync::Arc;

use crate::index::SkillIndex;
use crate::manifest::SkillManifest;

const NAME_WEIGHT: u32 = 3;
const DESCRIPTION_WEIGHT: u32 = 2;
const TAG_WEIGHT: u32 = 1;

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub skill: Arc<SkillManifest>,
    pub score: u32,
}

pub fn search(index: &SkillIndex, query: &str, tags: &[String]) -> Vec<SearchHit> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();

    let mut hits = Vec::new();

    for skill in index.iter() {
        if !matches_tag_filter(skill, tags) {
            continue;
        }

        let score = score_skill(skill, &terms);
        if score > 0 {
            hits.push(SearchHit {
                skill: skill.clone(),
                score,
            });
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.skill.name.cmp(&b.skill.name))
    });
    hits
}

/// Every requested tag must substring-match some skill tag.
fn matches_tag_filter(skill: &SkillManifest, tags: &[String]) -> bool {
    tags.iter().all(|wanted| {
        let wanted = wanted.to_lowercase();
        skill.tags.iter().any(|t| t.to_lowercase().contains(&wanted))
    })
}

fn score_skill(skill: &SkillManifest, terms: &[String]) -> u32 {
    let name = skill.name.to_lowercase();
    let description = skill.description.to_lowercase();

    let mut score = 0;
    for term in terms {
        if name.contains(term.as_str()) {
            score += NAME_WEIGHT;
        }
        if description.contains(term.as_str()) {
            score += DESCRIPTION_WEIGHT;
        }
        if skill.tags.iter().any(|t| t.to_lowercase().contains(term.as_str())) {
            score += TAG_WEIGHT;
        }
    }
    score
}
