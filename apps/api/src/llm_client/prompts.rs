// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction that keeps generated content traceable to the profile.
pub const HONESTY_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the candidate profile. \
    Do NOT invent employers, titles, dates, metrics, or technologies. \
    Rephrase and reorder; never fabricate.";
