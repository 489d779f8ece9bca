//! Patch Engine — applies and reverts suggestions against a caller-owned document.
//!
//! There is no undo log. Whether a path is Applied or Unapplied is read off the
//! store's applied list, and every applied entry carries the original value it
//! needs to revert itself.
//!
//! The engine never holds the document; every operation borrows it for the
//! duration of the call and touches it only through `patch::path`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::patch::normalize::{normalize, normalize_opt};
use crate::patch::path::{self, AddressError, FieldPath};
use crate::patch::store::{AppliedSuggestion, Suggestion, SuggestionStore};

/// What `undo` does when the suggestion has no original value to restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoPolicy {
    /// Leave whatever `apply` wrote in place.
    #[default]
    KeepSuggested,
    /// Delete the field so the document looks like it did before generation.
    RemoveField,
}

impl FromStr for UndoPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "keep_suggested" => Ok(UndoPolicy::KeepSuggested),
            "remove" | "remove_field" => Ok(UndoPolicy::RemoveField),
            other => Err(format!("unknown undo policy '{other}' (expected 'keep' or 'remove')")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    store: SuggestionStore,
    policy: UndoPolicy,
}

impl PatchEngine {
    pub fn new(store: SuggestionStore, policy: UndoPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &SuggestionStore {
        &self.store
    }

    pub fn policy(&self) -> UndoPolicy {
        self.policy
    }

    /// Installs a new candidate list. See [`SuggestionStore::replace_candidates`].
    ///
    /// Each candidate's `original_value` is re-derived against `doc` at install
    /// time. A path that is still applied keeps the original recorded by its
    /// applied entry, so undoing the new candidate restores the pre-suggestion
    /// value rather than the earlier suggestion.
    pub fn install(&mut self, doc: &Value, candidates: Vec<Suggestion>) {
        let candidates = candidates
            .into_iter()
            .map(|mut s| {
                s.original_value = self.original_at(doc, &s.field_path, s.original_value.take());
                s
            })
            .collect();
        self.store.replace_candidates(candidates);
    }

    fn original_at(&self, doc: &Value, field_path: &str, fallback: Option<Value>) -> Option<Value> {
        if let Some(entry) = self.store.applied_at(field_path) {
            return entry.original_value.clone();
        }
        match FieldPath::parse(field_path) {
            Ok(parsed) => path::read(doc, &parsed).cloned(),
            Err(_) => fallback,
        }
    }

    /// Writes the normalized suggested value and records it as applied.
    /// Applying an already-applied path is a silent no-op.
    ///
    /// Returns the applied count.
    pub fn apply(&mut self, doc: &mut Value, suggestion: &Suggestion) -> Result<usize, AddressError> {
        if self.store.is_applied(&suggestion.field_path) {
            debug!("Skipping apply: {} already applied", suggestion.field_path);
            return Ok(self.store.applied_count());
        }

        let field_path = FieldPath::parse(&suggestion.field_path)?;
        let value = normalize(&suggestion.field_path, &suggestion.suggested_value);
        path::write(doc, &field_path, value)?;

        self.store.add_applied(AppliedSuggestion::from(suggestion));
        debug!(
            "Applied suggestion {} at {}",
            suggestion.id, suggestion.field_path
        );

        Ok(self.store.applied_count())
    }

    /// Restores the original value at the suggestion's path and drops the applied entry.
    /// The applied entry is matched by path, not id. Undoing an unapplied path is a no-op.
    ///
    /// Returns the applied count.
    pub fn undo(&mut self, doc: &mut Value, suggestion: &Suggestion) -> Result<usize, AddressError> {
        self.revert(
            doc,
            &suggestion.field_path,
            suggestion.original_value.as_ref(),
        )
    }

    /// Applies every candidate in generation order, skipping applied paths.
    ///
    /// Stops at the first address error; suggestions applied before it stay applied.
    pub fn apply_all(&mut self, doc: &mut Value) -> Result<usize, AddressError> {
        let candidates = self.store.candidates().to_vec();
        for suggestion in &candidates {
            self.apply(doc, suggestion)?;
        }
        Ok(self.store.applied_count())
    }

    /// Reverts every applied entry, most recently applied first.
    ///
    /// Stops at the first address error; entries reverted before it stay reverted.
    pub fn undo_all(&mut self, doc: &mut Value) -> Result<usize, AddressError> {
        while let Some(entry) = self.store.applied().last().cloned() {
            self.revert(doc, &entry.field_path, entry.original_value.as_ref())?;
        }
        Ok(self.store.applied_count())
    }

    fn revert(
        &mut self,
        doc: &mut Value,
        field_path: &str,
        original: Option<&Value>,
    ) -> Result<usize, AddressError> {
        if !self.store.is_applied(field_path) {
            debug!("Skipping undo: {field_path} is not applied");
            return Ok(self.store.applied_count());
        }

        let parsed = FieldPath::parse(field_path)?;
        match original {
            Some(value) if !value.is_null() => {
                path::write(doc, &parsed, normalize_opt(field_path, Some(value)))?;
            }
            _ => match self.policy {
                UndoPolicy::KeepSuggested => {
                    debug!("No original value for {field_path}; leaving current value in place");
                }
                UndoPolicy::RemoveField => {
                    path::remove(doc, &parsed)?;
                }
            },
        }

        self.store.remove_applied_by_path(field_path);
        debug!("Reverted {field_path}");

        Ok(self.store.applied_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn suggestion(path: &str, original: Option<Value>, suggested: Value) -> Suggestion {
        Suggestion {
            id: Uuid::new_v4(),
            field_path: path.to_string(),
            original_value: original,
            suggested_value: suggested,
            explanation: Some("Sharper wording".to_string()),
            confidence: Some(0.9),
        }
    }

    fn read<'a>(doc: &'a Value, raw: &str) -> Option<&'a Value> {
        path::read(doc, &FieldPath::parse(raw).unwrap())
    }

    fn profile() -> Value {
        json!({
            "profile": {
                "name": "Ada Lovelace",
                "headline": "Engineer",
                "technologies": ["Rust"]
            },
            "workExperiences": [
                { "company": "Analytical Engines", "description": "Built stuff" },
                { "company": "Babbage & Co", "description": "Wrote notes" }
            ]
        })
    }

    fn candidates(doc: &Value) -> Vec<Suggestion> {
        vec![
            suggestion(
                "workExperiences.0.description",
                read(doc, "workExperiences.0.description").cloned(),
                json!("Built scalable distributed systems"),
            ),
            suggestion(
                "profile.headline",
                read(doc, "profile.headline").cloned(),
                json!("Staff Engineer"),
            ),
            suggestion(
                "profile.technologies",
                read(doc, "profile.technologies").cloned(),
                json!("Rust, Tokio, ,Axum"),
            ),
            suggestion(
                "workExperiences.1.description",
                read(doc, "workExperiences.1.description").cloned(),
                json!("Published the first algorithm"),
            ),
        ]
    }

    #[test]
    fn test_apply_then_undo_scenario() {
        let mut doc = json!({ "workExperiences": [{ "description": "Built stuff" }] });
        let s = suggestion(
            "workExperiences.0.description",
            Some(json!("Built stuff")),
            json!("Built scalable distributed systems"),
        );
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![s.clone()]), UndoPolicy::default());

        assert_eq!(engine.apply(&mut doc, &s).unwrap(), 1);
        assert_eq!(
            read(&doc, "workExperiences.0.description"),
            Some(&json!("Built scalable distributed systems"))
        );
        assert!(engine.store().is_applied(&s.field_path));

        assert_eq!(engine.undo(&mut doc, &s).unwrap(), 0);
        assert_eq!(
            read(&doc, "workExperiences.0.description"),
            Some(&json!("Built stuff"))
        );
        assert!(!engine.store().is_applied(&s.field_path));
    }

    #[test]
    fn test_apply_normalizes_array_fields() {
        let mut doc = profile();
        let list = candidates(&doc);
        let mut engine = PatchEngine::new(SuggestionStore::new(list.clone()), UndoPolicy::default());

        engine.apply(&mut doc, &list[2]).unwrap();
        assert_eq!(
            read(&doc, "profile.technologies"),
            Some(&json!(["Rust", "Tokio", "Axum"]))
        );
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let mut doc = profile();
        let list = candidates(&doc);
        let mut engine = PatchEngine::new(SuggestionStore::new(list.clone()), UndoPolicy::default());

        engine.apply(&mut doc, &list[1]).unwrap();
        let once = doc.clone();
        assert_eq!(engine.apply(&mut doc, &list[1]).unwrap(), 1);

        assert_eq!(doc, once);
        assert_eq!(engine.store().applied_count(), 1);
    }

    #[test]
    fn test_apply_guard_is_by_path() {
        let mut doc = profile();
        let first = suggestion("profile.headline", Some(json!("Engineer")), json!("Staff Engineer"));
        let rival = suggestion("profile.headline", Some(json!("Engineer")), json!("Principal"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![first.clone()]), UndoPolicy::default());

        engine.apply(&mut doc, &first).unwrap();
        engine.apply(&mut doc, &rival).unwrap();

        assert_eq!(read(&doc, "profile.headline"), Some(&json!("Staff Engineer")));
        assert_eq!(engine.store().applied_count(), 1);
    }

    #[test]
    fn test_undo_unapplied_is_noop() {
        let mut doc = profile();
        let list = candidates(&doc);
        let mut engine = PatchEngine::new(SuggestionStore::new(list.clone()), UndoPolicy::default());
        let before = doc.clone();

        assert_eq!(engine.undo(&mut doc, &list[0]).unwrap(), 0);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_undo_matches_applied_entry_by_path() {
        let mut doc = profile();
        let applied = suggestion("profile.headline", Some(json!("Engineer")), json!("Staff Engineer"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![applied.clone()]), UndoPolicy::default());
        engine.apply(&mut doc, &applied).unwrap();

        // A fresh object for the same path, e.g. rebuilt by the UI, still undoes it.
        let fresh = Suggestion {
            id: Uuid::new_v4(),
            ..applied.clone()
        };
        assert_eq!(engine.undo(&mut doc, &fresh).unwrap(), 0);
        assert_eq!(read(&doc, "profile.headline"), Some(&json!("Engineer")));
    }

    #[test]
    fn test_undo_restores_normalized_original() {
        let mut doc = json!({ "skills": ["Rust"] });
        let s = suggestion("skills", Some(json!("Rust, Go")), json!(["Rust", "Go", "Zig"]));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![s.clone()]), UndoPolicy::default());

        engine.apply(&mut doc, &s).unwrap();
        engine.undo(&mut doc, &s).unwrap();
        assert_eq!(doc, json!({ "skills": ["Rust", "Go"] }));
    }

    #[test]
    fn test_undo_without_original_keeps_suggested_by_default() {
        let mut doc = json!({ "profile": { "name": "Ada" } });
        let s = suggestion("profile.summary", None, json!("Pioneer of computing"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![s.clone()]), UndoPolicy::KeepSuggested);

        engine.apply(&mut doc, &s).unwrap();
        engine.undo(&mut doc, &s).unwrap();

        assert_eq!(read(&doc, "profile.summary"), Some(&json!("Pioneer of computing")));
        assert!(!engine.store().is_applied("profile.summary"));
    }

    #[test]
    fn test_undo_without_original_removes_field_when_configured() {
        let mut doc = json!({ "profile": { "name": "Ada" } });
        let s = suggestion("profile.summary", Some(Value::Null), json!("Pioneer of computing"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![s.clone()]), UndoPolicy::RemoveField);

        engine.apply(&mut doc, &s).unwrap();
        engine.undo(&mut doc, &s).unwrap();

        assert_eq!(doc, json!({ "profile": { "name": "Ada" } }));
        assert!(!engine.store().is_applied("profile.summary"));
    }

    #[test]
    fn test_apply_all_then_undo_all_restores_document() {
        let original = profile();
        let mut doc = original.clone();
        let mut engine = PatchEngine::new(SuggestionStore::new(candidates(&doc)), UndoPolicy::default());

        assert_eq!(engine.apply_all(&mut doc).unwrap(), 4);
        assert_ne!(doc, original);
        assert_eq!(engine.undo_all(&mut doc).unwrap(), 0);

        assert_eq!(doc, original);
        assert!(engine.store().applied().is_empty());
    }

    #[test]
    fn test_round_trip_is_order_independent() {
        let original = profile();
        let base = candidates(&original);
        let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];

        for order in orders {
            let permuted: Vec<_> = order.iter().map(|&i| base[i].clone()).collect();
            let mut doc = original.clone();
            let mut engine = PatchEngine::new(SuggestionStore::new(permuted), UndoPolicy::default());

            engine.apply_all(&mut doc).unwrap();
            engine.undo_all(&mut doc).unwrap();
            assert_eq!(doc, original, "order {order:?} did not round-trip");
        }
    }

    #[test]
    fn test_interleaved_apply_and_undo() {
        let original = profile();
        let mut doc = original.clone();
        let list = candidates(&doc);
        let mut engine = PatchEngine::new(SuggestionStore::new(list.clone()), UndoPolicy::default());

        engine.apply(&mut doc, &list[1]).unwrap();
        engine.apply(&mut doc, &list[0]).unwrap();
        engine.undo(&mut doc, &list[1]).unwrap();
        engine.apply_all(&mut doc).unwrap();
        assert_eq!(engine.store().applied_count(), 4);
        assert_eq!(engine.store().applied()[0].field_path, "workExperiences.0.description");

        engine.undo(&mut doc, &list[3]).unwrap();
        engine.undo_all(&mut doc).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_undo_all_runs_in_reverse_application_order() {
        // Parent applied before child: unwinding child first restores both.
        let mut doc = json!({ "profile": { "summary": "old" } });
        let parent = suggestion("profile", Some(json!({ "summary": "old" })), json!({ "summary": "new" }));
        let child = suggestion("profile.summary", Some(json!("new")), json!("newer"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![parent, child]), UndoPolicy::default());

        engine.apply_all(&mut doc).unwrap();
        assert_eq!(doc, json!({ "profile": { "summary": "newer" } }));

        engine.undo_all(&mut doc).unwrap();
        assert_eq!(doc, json!({ "profile": { "summary": "old" } }));
    }

    #[test]
    fn test_apply_all_stops_at_address_error_keeping_prefix() {
        let mut doc = json!({ "profile": { "headline": "Engineer" }, "projects": "none" });
        let ok = suggestion("profile.headline", Some(json!("Engineer")), json!("Staff Engineer"));
        let bad = suggestion("projects.0.name", None, json!("Tailor"));
        let never = suggestion("profile.summary", None, json!("Unreached"));
        let mut engine =
            PatchEngine::new(SuggestionStore::new(vec![ok, bad, never]), UndoPolicy::default());

        let err = engine.apply_all(&mut doc).unwrap_err();
        assert!(matches!(err, AddressError::NotAContainer { .. }));

        assert_eq!(engine.store().applied_count(), 1);
        assert!(engine.store().is_applied("profile.headline"));
        assert_eq!(read(&doc, "profile.headline"), Some(&json!("Staff Engineer")));
        assert_eq!(read(&doc, "profile.summary"), None);
    }

    #[test]
    fn test_failed_apply_leaves_ledger_untouched() {
        let mut doc = json!({ "projects": 3 });
        let bad = suggestion("projects.0.name", None, json!("Tailor"));
        let mut engine = PatchEngine::new(SuggestionStore::new(vec![bad.clone()]), UndoPolicy::default());

        assert!(engine.apply(&mut doc, &bad).is_err());
        assert!(!engine.store().is_applied("projects.0.name"));
        assert_eq!(doc, json!({ "projects": 3 }));
    }

    #[test]
    fn test_install_over_applied_path_keeps_true_original() {
        let mut doc = json!({ "profile": { "headline": "Engineer" } });
        let mut engine = PatchEngine::default();

        let first = suggestion("profile.headline", Some(json!("Engineer")), json!("Staff Engineer"));
        engine.install(&doc, vec![first.clone()]);
        engine.apply(&mut doc, &first).unwrap();

        // Observed while the first suggestion was applied.
        let second = suggestion(
            "profile.headline",
            Some(json!("Staff Engineer")),
            json!("Principal Engineer"),
        );
        engine.install(&doc, vec![second.clone()]);
        let installed = engine.store().find_candidate(second.id).unwrap().clone();
        assert_eq!(installed.original_value, Some(json!("Engineer")));

        assert_eq!(engine.undo(&mut doc, &installed).unwrap(), 0);
        assert_eq!(doc["profile"]["headline"], json!("Engineer"));
    }

    #[test]
    fn test_install_rebases_originals_on_live_document() {
        let mut doc = json!({ "profile": { "headline": "Engineer" } });
        let mut engine = PatchEngine::default();

        // Generated against a snapshot, then the user edited the field meanwhile.
        let stale = suggestion("profile.headline", Some(json!("Old")), json!("Staff Engineer"));
        let fresh = suggestion("profile.summary", Some(json!("Old summary")), json!("Rustacean"));
        engine.install(&doc, vec![stale.clone(), fresh.clone()]);

        let store = engine.store();
        assert_eq!(
            store.find_candidate(stale.id).unwrap().original_value,
            Some(json!("Engineer"))
        );
        assert_eq!(store.find_candidate(fresh.id).unwrap().original_value, None);

        engine.apply_all(&mut doc).unwrap();
        engine.undo_all(&mut doc).unwrap();
        assert_eq!(doc["profile"]["headline"], json!("Engineer"));
    }

    #[test]
    fn test_undo_policy_from_str() {
        assert_eq!("keep".parse::<UndoPolicy>().unwrap(), UndoPolicy::KeepSuggested);
        assert_eq!(" Remove ".parse::<UndoPolicy>().unwrap(), UndoPolicy::RemoveField);
        assert!("delete".parse::<UndoPolicy>().is_err());
    }
}
