#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub const FALLBACK_TITLE: &str = "Untitled job";
pub const FALLBACK_COMPANY: &str = "Unknown company";
pub const FALLBACK_ANALYSIS: &str = "No analysis available yet.";

/// Job summary as it appears inside a match. The upstream schema has
/// drifted across versions: the title may arrive as `title` or `job_title`
/// and the company as `company_name` or `company`, so both shapes are
/// captured here and resolved once by [`MatchRecord::normalize`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobInMatch {
    pub title: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    #[serde(default)]
    pub job: JobInMatch,
    pub similarity_score: Option<f64>,
    pub analysis: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchListResponse {
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub total: u64,
}

/// Canonical record shape after normalization. Display logic never sees the
/// upstream field ambiguity.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchView {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    /// Present only for finite scores; a corrupted score suppresses the
    /// badge instead of rendering garbage.
    pub score_badge: Option<String>,
    pub analysis: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn normalize(self) -> MatchView {
        MatchView {
            id: self.id,
            title: pick(self.job.title, self.job.job_title, FALLBACK_TITLE),
            company: pick(self.job.company_name, self.job.company, FALLBACK_COMPANY),
            score_badge: format_score(self.similarity_score),
            analysis: self
                .analysis
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| FALLBACK_ANALYSIS.to_string()),
            created_at: self.created_at,
        }
    }
}

fn pick(primary: Option<String>, alternate: Option<String>, fallback: &str) -> String {
    primary
        .filter(|value| !value.is_empty())
        .or_else(|| alternate.filter(|value| !value.is_empty()))
        .unwrap_or_else(|| fallback.to_string())
}

/// Formats a similarity score as a percentage badge, e.g. `0.873` into
/// `87.3%`. Non-finite or missing scores yield no badge.
pub fn format_score(score: Option<f64>) -> Option<String> {
    match score {
        Some(value) if value.is_finite() => Some(format!("{:.1}%", value * 100.0)),
        _ => None,
    }
}
