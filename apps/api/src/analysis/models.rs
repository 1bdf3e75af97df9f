use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Model payload (after schema validation)
// ────────────────────────────────────────────────────────────────────────────

/// The model's analysis once it has passed the strict schema.
/// Numbers are still as the model sent them; `finalize` turns them into integers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnalysis {
    pub candidate_name: String,
    pub overall_score: f64,
    pub scores: ModelScores,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Experience,
    pub education: Vec<ModelEducation>,
    #[serde(default)]
    pub key_highlights: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub multi_language_data: Option<ModelMultiLanguage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelScores {
    pub technical: f64,
    pub experience: f64,
    pub communication: f64,
    pub culture_fit: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEducation {
    pub degree: String,
    pub institution: String,
    pub year: YearValue,
}

/// An education year exactly as the model wrote it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum YearValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelMultiLanguage {
    pub en: LocaleSnapshot,
    #[serde(default)]
    pub de: Option<LocaleSnapshot>,
    #[serde(default)]
    pub fr: Option<LocaleSnapshot>,
}

// ────────────────────────────────────────────────────────────────────────────
// Response record
// ────────────────────────────────────────────────────────────────────────────

/// Narrative fields of an analysis in one language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleSnapshot {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub skills: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub candidate_name: String,
}

/// Always carries all three locales; missing ones are empty snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLanguageData {
    pub en: LocaleSnapshot,
    pub de: LocaleSnapshot,
    pub fr: LocaleSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub technical: u8,
    pub experience: u8,
    pub communication: u8,
    pub culture_fit: u8,
    /// Additional named sub-scores the model chose to include.
    #[serde(flatten)]
    pub extra: BTreeMap<String, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Kept as the model wrote it, so `12` stays `12` and `2.5` stays `2.5`.
    pub years: Number,
    pub positions: Vec<String>,
    pub companies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: i32,
}

/// Canonical, fully-populated analysis of one uploaded resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub upload_date: DateTime<Utc>,
    pub analysis_date: DateTime<Utc>,
    pub candidate_name: String,
    pub overall_score: u8,
    pub scores: Scores,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Experience,
    pub education: Vec<Education>,
    pub key_highlights: Vec<String>,
    pub red_flags: Vec<String>,
    pub raw_text: String,
    pub multi_language_data: MultiLanguageData,
    pub primary_language: String,
}

/// Server-side facts about an upload, stamped onto the result.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub upload_date: DateTime<Utc>,
    pub analysis_date: DateTime<Utc>,
    pub raw_text: String,
}
