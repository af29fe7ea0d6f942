//! Recommendation scoring.
//!
//! Pure functions shared by the suggestion ranking and the analytics report.
//! Nothing here touches storage.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constants::{
    GOOD_SKILL_SCORE, HIGH_SKILL_SCORE, MUTUAL_CONNECTION_WEIGHT, SKILL_SCORE_SCALE,
};
use crate::types::UserId;

/// Skill compatibility between two users, in `0.0..=10.0`.
///
/// Skills are compared as lowercase sets. Either side being empty scores 0.
pub fn skill_overlap_score<A, B>(viewer: &[A], candidate: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let viewer = lowercase_set(viewer);
    let candidate = lowercase_set(candidate);

    let denominator = viewer.len().max(candidate.len());
    if viewer.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let common = viewer.intersection(&candidate).count();
    SKILL_SCORE_SCALE * common as f64 / denominator as f64
}

fn lowercase_set<S: AsRef<str>>(skills: &[S]) -> HashSet<String> {
    skills
        .iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn connection_strength_score(mutual_count: usize) -> f64 {
    MUTUAL_CONNECTION_WEIGHT * mutual_count as f64
}

/// Round to one decimal place, the precision scores are reported with.
pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

/// Ids present in both connection lists, in the candidate's list order.
pub fn mutual_connections(viewer: &[UserId], candidate: &[UserId]) -> Vec<UserId> {
    let viewer: HashSet<&UserId> = viewer.iter().collect();
    let mut seen = HashSet::new();
    candidate
        .iter()
        .filter(|id| viewer.contains(id) && seen.insert(**id))
        .copied()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillTier {
    High,
    Good,
    Low,
}

impl SkillTier {
    pub fn of(skill_score: f64) -> Self {
        if skill_score > HIGH_SKILL_SCORE {
            Self::High
        } else if skill_score > GOOD_SKILL_SCORE {
            Self::Good
        } else {
            Self::Low
        }
    }
}

/// Explanation shown next to a recommendation that has no pending or
/// connected state of its own.
pub fn recommendation_reason(mutual_count: usize, skill_score: f64) -> String {
    if mutual_count > 0 {
        let plural = if mutual_count == 1 { "" } else { "s" };
        return format!("{mutual_count} mutual connection{plural}");
    }
    match SkillTier::of(skill_score) {
        SkillTier::High => "High skill compatibility".to_string(),
        SkillTier::Good => "Good skill match".to_string(),
        SkillTier::Low => "Suggested for you".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Weak,
}

impl Strength {
    pub fn from_mutual_count(mutual_count: usize) -> Self {
        if mutual_count > 0 {
            Self::Strong
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

/// Most frequent skills, count descending. Ties keep the order in which the
/// skill was first encountered.
pub fn top_skills<'a, I>(skills: I, limit: usize) -> Vec<SkillCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for skill in skills {
        match counts.get_mut(skill) {
            Some(count) => *count += 1,
            None => {
                counts.insert(skill.to_string(), 1);
                order.push(skill.to_string());
            }
        }
    }

    let mut ranked: Vec<SkillCount> = order
        .into_iter()
        .map(|skill| {
            let count = counts.get(&skill).copied().unwrap_or_default();
            SkillCount { skill, count }
        })
        .collect();
    // stable: equal counts stay in first-encountered order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}
