// Generation: structured profile suggestions and streamed cover letters.
// All LLM calls go through llm_client — no direct Anthropic calls here.

pub mod cover_letter;
pub mod generator;
pub mod prompts;
pub mod suggestions;
