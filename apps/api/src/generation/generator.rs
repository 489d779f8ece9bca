//! Content generator — the pluggable seam between sessions and the model.
//!
//! Default: `LlmGenerator` (Claude via `LlmClient`).
//! `AppState` holds an `Arc<dyn ContentGenerator>`, so tests swap in a scripted fake.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::generation::cover_letter::{build_cover_letter_prompt, CoverLetterRequest};
use crate::generation::prompts::{COVER_LETTER_SYSTEM, SUGGEST_SYSTEM};
use crate::generation::suggestions::{
    build_suggest_prompt, validate_suggestion_set, RawSuggestionSet, SuggestRequest,
    SuggestionSet,
};
use crate::llm_client::{LlmClient, LlmError};
use crate::patch::ChunkReader;

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces a validated suggestion set for `document`. Fails whole or not at all.
    async fn suggest(
        &self,
        request: &SuggestRequest,
        document: &Value,
    ) -> Result<SuggestionSet, AppError>;

    /// Opens a text stream for a cover letter about `document`.
    async fn stream_cover_letter(
        &self,
        request: &CoverLetterRequest,
        document: &Value,
    ) -> Result<ChunkReader, AppError>;
}

pub struct LlmGenerator(pub LlmClient);

fn map_llm_error(context: &str, e: LlmError) -> AppError {
    if e.is_malformed_output() {
        AppError::InvalidGeneration(format!("{context}: {e}"))
    } else {
        AppError::Llm(format!("{context}: {e}"))
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn suggest(
        &self,
        request: &SuggestRequest,
        document: &Value,
    ) -> Result<SuggestionSet, AppError> {
        let prompt = build_suggest_prompt(request, document)?;

        let raw: RawSuggestionSet = self
            .0
            .call_json(&prompt, SUGGEST_SYSTEM)
            .await
            .map_err(|e| map_llm_error("Suggestion generation failed", e))?;

        let set = validate_suggestion_set(raw, document)?;
        info!(
            "Generated {} suggestions (match_score={:?})",
            set.suggestions.len(),
            set.match_score
        );
        Ok(set)
    }

    async fn stream_cover_letter(
        &self,
        request: &CoverLetterRequest,
        document: &Value,
    ) -> Result<ChunkReader, AppError> {
        let prompt = build_cover_letter_prompt(request, document)?;
        self.0
            .call_stream(&prompt, COVER_LETTER_SYSTEM)
            .await
            .map_err(|e| map_llm_error("Cover letter stream failed", e))
    }
}
