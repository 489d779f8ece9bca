//! Cover letter generation — free text streamed chunk by chunk.
//!
//! The finished letter is a plain field value; it is written straight into the
//! document and never goes through the suggestion ledger.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::generation::prompts::COVER_LETTER_PROMPT_TEMPLATE;
use crate::llm_client::prompts::HONESTY_INSTRUCTION;

/// Field the letter is written to when the request does not name one.
pub const DEFAULT_COVER_LETTER_PATH: &str = "coverLetter";

fn default_field_path() -> String {
    DEFAULT_COVER_LETTER_PATH.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverLetterRequest {
    pub job_title: String,
    pub company: String,
    pub job_description: String,
    #[serde(default = "default_field_path")]
    pub field_path: String,
}

/// Builds the cover letter prompt from the job context and current profile.
pub fn build_cover_letter_prompt(
    request: &CoverLetterRequest,
    document: &Value,
) -> Result<String, AppError> {
    let profile_json = serde_json::to_string_pretty(document)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize profile: {e}")))?;

    Ok(COVER_LETTER_PROMPT_TEMPLATE
        .replace("{job_title}", &request.job_title)
        .replace("{company}", &request.company)
        .replace("{job_description}", &request.job_description)
        .replace("{honesty_instruction}", HONESTY_INSTRUCTION)
        .replace("{profile_json}", &profile_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_path_defaults_to_cover_letter() {
        let request: CoverLetterRequest = serde_json::from_value(json!({
            "job_title": "Platform Engineer",
            "company": "Acme",
            "job_description": "Run our Kubernetes fleet."
        }))
        .unwrap();
        assert_eq!(request.field_path, "coverLetter");
    }

    #[test]
    fn test_prompt_is_fully_substituted() {
        let request = CoverLetterRequest {
            job_title: "Platform Engineer".to_string(),
            company: "Acme".to_string(),
            job_description: "Run our Kubernetes fleet.".to_string(),
            field_path: "letters.0.body".to_string(),
        };
        let prompt =
            build_cover_letter_prompt(&request, &json!({ "profile": { "name": "Ada" } })).unwrap();

        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("\"Ada\""));
        assert!(!prompt.contains("{job_title}"));
        assert!(!prompt.contains("{profile_json}"));
    }
}
