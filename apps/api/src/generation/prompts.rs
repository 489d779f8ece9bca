// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for field-level profile suggestions — enforces JSON-only output.
pub const SUGGEST_SYSTEM: &str =
    "You are an expert resume editor who tailors a candidate profile to a specific job. \
    You propose precise, field-level edits to an existing profile document. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Suggestion prompt template. Replace `{job_title}`, `{company}`, `{job_description}`,
/// `{array_fields}`, `{honesty_instruction}` and `{profile_json}` before sending.
pub const SUGGEST_PROMPT_TEMPLATE: &str = r#"Tailor the candidate profile below to the target job by proposing field-level edits.

TARGET JOB:
Title: {job_title}
Company: {company}
Description:
{job_description}

CANDIDATE PROFILE (JSON):
{profile_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "suggestions": [
    {
      "field_path": "workExperiences.0.description",
      "suggested_value": "Rewritten text for this field",
      "explanation": "Why this edit helps for the target job",
      "confidence": 0.85
    }
  ],
  "match_score": 72,
  "keywords_matched": ["Rust", "distributed systems"],
  "keywords_missing": ["Kubernetes"]
}

RULES:
1. field_path addresses a field in the profile with dot notation; array positions are numeric
   segments (e.g. "projects.1.description"). Use paths that exist in the profile, or that
   are a natural new field of an existing object.
2. At most ONE suggestion per field_path.
3. These fields hold lists of strings and must be suggested as JSON arrays of strings:
   {array_fields}. Every other field is suggested as a single string.
4. confidence is a number between 0 and 1. match_score is a number between 0 and 100.
5. Only suggest edits that improve the fit for this job. Leave good fields alone.
6. {honesty_instruction}"#;

/// System prompt for streamed cover letters — plain prose, no JSON.
pub const COVER_LETTER_SYSTEM: &str =
    "You are an expert career writer. \
    Write concise, specific cover letters grounded only in the candidate's profile. \
    Respond with the letter text only: no subject line, no markdown, no commentary.";

/// Cover letter prompt template. Replace `{job_title}`, `{company}`, `{job_description}`,
/// `{honesty_instruction}` and `{profile_json}` before sending.
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter for the job below.

TARGET JOB:
Title: {job_title}
Company: {company}
Description:
{job_description}

CANDIDATE PROFILE (JSON):
{profile_json}

RULES:
1. Three to four short paragraphs, under 350 words.
2. Open with the role and company by name.
3. Cite two or three concrete achievements from the profile that match the job.
4. {honesty_instruction}"#;
