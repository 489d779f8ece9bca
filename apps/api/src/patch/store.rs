use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A field-level edit proposed by the generator. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub field_path: String,
    /// Value observed at `field_path` when the suggestion was generated.
    /// `None` when the field did not exist yet.
    pub original_value: Option<Value>,
    pub suggested_value: Value,
    pub explanation: Option<String>,
    pub confidence: Option<f64>,
}

/// A suggestion currently reflected in the document, carrying what is needed to revert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedSuggestion {
    pub id: Uuid,
    pub field_path: String,
    pub original_value: Option<Value>,
    pub suggested_value: Value,
    pub explanation: Option<String>,
    pub confidence: Option<f64>,
}

impl From<&Suggestion> for AppliedSuggestion {
    fn from(s: &Suggestion) -> Self {
        Self {
            id: s.id,
            field_path: s.field_path.clone(),
            original_value: s.original_value.clone(),
            suggested_value: s.suggested_value.clone(),
            explanation: s.explanation.clone(),
            confidence: s.confidence,
        }
    }
}

impl From<&AppliedSuggestion> for Suggestion {
    fn from(a: &AppliedSuggestion) -> Self {
        Self {
            id: a.id,
            field_path: a.field_path.clone(),
            original_value: a.original_value.clone(),
            suggested_value: a.suggested_value.clone(),
            explanation: a.explanation.clone(),
            confidence: a.confidence,
        }
    }
}

/// Ledger of candidate and applied suggestions for one editing session.
///
/// The store does not guard against duplicate applied paths; `PatchEngine`
/// checks `is_applied` before calling `add_applied`.
#[derive(Debug, Clone, Default)]
pub struct SuggestionStore {
    candidates: Vec<Suggestion>,
    applied: Vec<AppliedSuggestion>,
}

impl SuggestionStore {
    pub fn new(candidates: Vec<Suggestion>) -> Self {
        Self {
            candidates,
            applied: Vec::new(),
        }
    }

    /// Candidates in generation order.
    pub fn candidates(&self) -> &[Suggestion] {
        &self.candidates
    }

    /// Applied entries in application order.
    pub fn applied(&self) -> &[AppliedSuggestion] {
        &self.applied
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn is_applied(&self, field_path: &str) -> bool {
        self.applied.iter().any(|a| a.field_path == field_path)
    }

    pub fn applied_at(&self, field_path: &str) -> Option<&AppliedSuggestion> {
        self.applied.iter().find(|a| a.field_path == field_path)
    }

    pub fn add_applied(&mut self, entry: AppliedSuggestion) {
        self.applied.push(entry);
    }

    pub fn remove_applied_by_path(&mut self, field_path: &str) -> Option<AppliedSuggestion> {
        let pos = self.applied.iter().position(|a| a.field_path == field_path)?;
        Some(self.applied.remove(pos))
    }

    pub fn find_candidate(&self, id: Uuid) -> Option<&Suggestion> {
        self.candidates.iter().find(|s| s.id == id)
    }

    pub fn find_applied(&self, id: Uuid) -> Option<&AppliedSuggestion> {
        self.applied.iter().find(|a| a.id == id)
    }

    /// Installs a fresh generation. Applied entries are kept so they can still be reverted.
    pub fn replace_candidates(&mut self, candidates: Vec<Suggestion>) {
        self.candidates = candidates;
    }
}
