//! Structured suggestion generation: request/response types, prompt building,
//! and validation of the model's answer into installable `Suggestion`s.
//!
//! A response is either installed whole or rejected whole. Nothing from a
//! response that fails validation ever reaches a session.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::prompts::SUGGEST_PROMPT_TEMPLATE;
use crate::llm_client::prompts::HONESTY_INSTRUCTION;
use crate::patch::normalize::ARRAY_FIELDS;
use crate::patch::path::{self, AddressError, FieldPath};
use crate::patch::Suggestion;

/// Job context for a suggestion run.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    pub job_title: String,
    pub company: String,
    pub job_description: String,
}

/// A suggestion as returned by the model, before ids and original values are attached.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuggestion {
    pub field_path: String,
    pub suggested_value: Value,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// The model's full answer as parsed from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuggestionSet {
    pub suggestions: Vec<RawSuggestion>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub keywords_matched: Option<Vec<String>>,
    #[serde(default)]
    pub keywords_missing: Option<Vec<String>>,
}

/// A validated suggestion set, ready to install into a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionSet {
    pub suggestions: Vec<Suggestion>,
    pub match_score: Option<f64>,
    pub keywords_matched: Vec<String>,
    pub keywords_missing: Vec<String>,
}

/// Summary of a generation run kept on the session (everything but the suggestions).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub suggestion_count: usize,
    pub match_score: Option<f64>,
    pub keywords_matched: Vec<String>,
    pub keywords_missing: Vec<String>,
}

impl SuggestionSet {
    pub fn report(&self) -> GenerationReport {
        GenerationReport {
            suggestion_count: self.suggestions.len(),
            match_score: self.match_score,
            keywords_matched: self.keywords_matched.clone(),
            keywords_missing: self.keywords_missing.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("match_score {0} is outside 0-100")]
    MatchScoreOutOfRange(f64),

    #[error("confidence {value} for '{field_path}' is outside 0-1")]
    ConfidenceOutOfRange { field_path: String, value: f64 },

    #[error("invalid field_path: {0}")]
    BadFieldPath(#[from] AddressError),

    #[error("more than one suggestion for '{0}'")]
    DuplicateFieldPath(String),

    #[error("suggested_value for '{0}' must be a string or an array of strings")]
    UnsupportedValue(String),
}

fn is_string_or_string_list(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Validates a raw model answer against `document` and mints suggestion ids.
///
/// `original_value` is taken from the document as it is right now, not from
/// the model, so undo always restores what the user actually had.
pub fn validate_suggestion_set(
    raw: RawSuggestionSet,
    document: &Value,
) -> Result<SuggestionSet, ValidationError> {
    if let Some(score) = raw.match_score {
        if !(0.0..=100.0).contains(&score) {
            return Err(ValidationError::MatchScoreOutOfRange(score));
        }
    }

    let mut seen = HashSet::new();
    let mut suggestions = Vec::with_capacity(raw.suggestions.len());

    for item in raw.suggestions {
        let field_path = FieldPath::parse(&item.field_path)?;
        path::check_write(document, &field_path)?;

        if !seen.insert(item.field_path.clone()) {
            return Err(ValidationError::DuplicateFieldPath(item.field_path));
        }
        if let Some(confidence) = item.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ValidationError::ConfidenceOutOfRange {
                    field_path: item.field_path,
                    value: confidence,
                });
            }
        }
        if !is_string_or_string_list(&item.suggested_value) {
            return Err(ValidationError::UnsupportedValue(item.field_path));
        }

        let original_value = path::read(document, &field_path).cloned();
        suggestions.push(Suggestion {
            id: Uuid::new_v4(),
            field_path: item.field_path,
            original_value,
            suggested_value: item.suggested_value,
            explanation: item.explanation,
            confidence: item.confidence,
        });
    }

    Ok(SuggestionSet {
        suggestions,
        match_score: raw.match_score,
        keywords_matched: raw.keywords_matched.unwrap_or_default(),
        keywords_missing: raw.keywords_missing.unwrap_or_default(),
    })
}

/// Builds the suggestion prompt by filling the template with the job and profile.
pub fn build_suggest_prompt(request: &SuggestRequest, document: &Value) -> Result<String, AppError> {
    let profile_json = serde_json::to_string_pretty(document)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize profile: {e}")))?;

    let array_fields = ARRAY_FIELDS
        .iter()
        .map(|f| format!("\"{f}\""))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(SUGGEST_PROMPT_TEMPLATE
        .replace("{job_title}", &request.job_title)
        .replace("{company}", &request.company)
        .replace("{job_description}", &request.job_description)
        .replace("{array_fields}", &array_fields)
        .replace("{honesty_instruction}", HONESTY_INSTRUCTION)
        .replace("{profile_json}", &profile_json))
}
