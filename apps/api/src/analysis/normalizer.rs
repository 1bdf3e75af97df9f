//! AnalysisNormalizer — turns an untrusted model payload into a complete `AnalysisResult`.
//!
//! Strict validation first; on failure, every field is rebuilt independently via
//! the schema's coerce mode and validated again. The second validation cannot
//! fail unless the schema's coerce and strict modes disagree, which is reported
//! as an internal error rather than a panic.

use chrono::Datelike;
use serde_json::{Map, Value};
use tracing::warn;

use crate::analysis::models::{
    AnalysisResult, Education, LocaleSnapshot, ModelAnalysis, ModelEducation, ModelScores,
    MultiLanguageData, Provenance, Scores, YearValue,
};
use crate::analysis::schema::{self, Violation, ANALYSIS_PAYLOAD, LOCALE_BLOCK};
use crate::errors::AppError;
use crate::llm_client::strip_json_fences;

pub const PRIMARY_LANGUAGE: &str = "en";

/// Which path produced the validated analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationPath {
    Strict,
    Reconstructed,
}

impl NormalizationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationPath::Strict => "strict",
            NormalizationPath::Reconstructed => "reconstructed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub analysis: ModelAnalysis,
    pub path: NormalizationPath,
}

/// Parses model text as JSON, tolerating markdown fences and prose around a single object.
pub fn parse_model_json(text: &str) -> Result<Value, serde_json::Error> {
    let unfenced = strip_json_fences(text);
    match serde_json::from_str(unfenced) {
        Ok(value) => Ok(value),
        Err(e) => match outermost_object(unfenced) {
            Some(inner) => serde_json::from_str(inner).map_err(|_| e),
            None => Err(e),
        },
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Validates `payload` strictly, falling back to per-field reconstruction.
pub fn normalize(payload: &Value) -> Result<Normalized, AppError> {
    let (validated, path) = match schema::validate(payload, &ANALYSIS_PAYLOAD) {
        Ok(valid) => (valid, NormalizationPath::Strict),
        Err(violations) => {
            warn!(
                "Model output failed strict validation ({} issue(s): {}); reconstructing",
                violations.len(),
                summarize(&violations)
            );
            let rebuilt = schema::coerce(Some(&with_english_source(payload)), &ANALYSIS_PAYLOAD);
            let valid = schema::validate(&rebuilt, &ANALYSIS_PAYLOAD).map_err(|violations| {
                AppError::Normalization(format!(
                    "reconstructed analysis failed validation: {}",
                    summarize(&violations)
                ))
            })?;
            (valid, NormalizationPath::Reconstructed)
        }
    };

    let analysis: ModelAnalysis = serde_json::from_value(validated)
        .map_err(|e| AppError::Normalization(format!("validated analysis did not deserialize: {e}")))?;

    Ok(Normalized { analysis, path })
}

/// Builds the source for `multiLanguageData.en`: the top-level narrative fields,
/// overridden by any non-null field of an upstream English block.
fn with_english_source(payload: &Value) -> Value {
    let mut bag = payload.as_object().cloned().unwrap_or_default();

    let mut en = Map::new();
    for field in LOCALE_BLOCK.fields {
        if let Some(v) = bag.get(field.name).filter(|v| !v.is_null()) {
            en.insert(field.name.to_string(), v.clone());
        }
    }
    if let Some(upstream) = bag
        .get("multiLanguageData")
        .and_then(|m| m.get("en"))
        .and_then(Value::as_object)
    {
        for (key, v) in upstream.iter().filter(|(_, v)| !v.is_null()) {
            en.insert(key.clone(), v.clone());
        }
    }

    let languages = bag
        .entry("multiLanguageData")
        .or_insert_with(|| Value::Object(Map::new()));
    if !languages.is_object() {
        *languages = Value::Object(Map::new());
    }
    if let Some(languages) = languages.as_object_mut() {
        languages.insert("en".to_string(), Value::Object(en));
    }

    Value::Object(bag)
}

fn summarize(violations: &[Violation]) -> String {
    const SHOWN: usize = 5;
    let mut parts: Vec<String> = violations.iter().take(SHOWN).map(|v| v.to_string()).collect();
    if violations.len() > SHOWN {
        parts.push(format!("and {} more", violations.len() - SHOWN));
    }
    parts.join("; ")
}

// ────────────────────────────────────────────────────────────────────────────
// Finalization
// ────────────────────────────────────────────────────────────────────────────

/// Attaches provenance and fills the response-only guarantees:
/// integer scores and years, and all three locale snapshots.
pub fn finalize(analysis: ModelAnalysis, provenance: Provenance) -> AnalysisResult {
    let current_year = provenance.analysis_date.year();

    let education = analysis
        .education
        .into_iter()
        .map(|e| finalize_education(e, current_year))
        .collect();

    let english_fallback = LocaleSnapshot {
        summary: analysis.summary.clone(),
        strengths: analysis.strengths.clone(),
        weaknesses: analysis.weaknesses.clone(),
        recommendations: analysis.recommendations.clone(),
        skills: analysis.skills.clone(),
        red_flags: analysis.red_flags.clone(),
        candidate_name: analysis.candidate_name.clone(),
    };
    let multi_language_data = match analysis.multi_language_data {
        Some(languages) => MultiLanguageData {
            en: languages.en,
            de: languages.de.unwrap_or_default(),
            fr: languages.fr.unwrap_or_default(),
        },
        None => MultiLanguageData {
            en: english_fallback,
            de: LocaleSnapshot::default(),
            fr: LocaleSnapshot::default(),
        },
    };

    AnalysisResult {
        id: provenance.id,
        file_name: provenance.file_name,
        file_size: provenance.file_size,
        upload_date: provenance.upload_date,
        analysis_date: provenance.analysis_date,
        candidate_name: analysis.candidate_name,
        overall_score: to_score(analysis.overall_score),
        scores: finalize_scores(analysis.scores),
        summary: analysis.summary,
        strengths: analysis.strengths,
        weaknesses: analysis.weaknesses,
        recommendations: analysis.recommendations,
        skills: analysis.skills,
        experience: analysis.experience,
        education,
        key_highlights: analysis.key_highlights,
        red_flags: analysis.red_flags,
        raw_text: provenance.raw_text,
        multi_language_data,
        primary_language: PRIMARY_LANGUAGE.to_string(),
    }
}

fn finalize_scores(scores: ModelScores) -> Scores {
    Scores {
        technical: to_score(scores.technical),
        experience: to_score(scores.experience),
        communication: to_score(scores.communication),
        culture_fit: to_score(scores.culture_fit),
        extra: scores
            .extra
            .into_iter()
            .map(|(name, value)| (name, to_score(value)))
            .collect(),
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn finalize_education(entry: ModelEducation, current_year: i32) -> Education {
    Education {
        year: year_or(&entry.year, current_year),
        degree: entry.degree,
        institution: entry.institution,
    }
}

/// Converts a model-supplied year to an integer. Unparsable text (including an
/// empty string) becomes `current_year`.
pub fn year_or(year: &YearValue, current_year: i32) -> i32 {
    let parsed = match year {
        YearValue::Number(n) => Some(*n),
        YearValue::Text(raw) => schema::parse_number(raw),
    };
    match parsed {
        Some(n) => n.round() as i32,
        None => {
            warn!("Unparsable education year {year:?}; substituting {current_year}");
            current_year
        }
    }
}
