//! Editing sessions — one profile document plus its suggestion ledger.
//!
//! The document lives here and nowhere else. Each session sits behind its own
//! mutex, so apply/undo calls for one document are serialized while different
//! sessions proceed independently. Locks are never held across a model call.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::suggestions::{GenerationReport, SuggestionSet};
use crate::patch::path::{self, FieldPath};
use crate::patch::{AppliedSuggestion, PatchEngine, Suggestion, SuggestionStore, UndoPolicy};

pub struct EditSession {
    pub id: Uuid,
    document: Value,
    engine: PatchEngine,
    last_report: Option<GenerationReport>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A candidate suggestion together with its current state.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    pub applied: bool,
}

/// Read-only view of a session returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub document: Value,
    pub candidates: Vec<CandidateView>,
    pub applied: Vec<AppliedSuggestion>,
    pub applied_count: usize,
    pub last_report: Option<GenerationReport>,
    pub undo_policy: UndoPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EditSession {
    pub fn new(document: Value, policy: UndoPolicy) -> Result<Self, AppError> {
        if !document.is_object() {
            return Err(AppError::Validation(
                "document must be a JSON object".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            document,
            engine: PatchEngine::new(SuggestionStore::default(), policy),
            last_report: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn applied_count(&self) -> usize {
        self.engine.store().applied_count()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replaces the candidate list with a freshly validated generation and
    /// returns the candidates as installed, with originals taken from the live document.
    pub fn install(&mut self, set: SuggestionSet) -> &[Suggestion] {
        self.last_report = Some(set.report());
        self.engine.install(&self.document, set.suggestions);
        self.touch();
        self.engine.store().candidates()
    }

    /// Resolves a suggestion id against the candidates, falling back to applied
    /// entries from an earlier generation.
    fn resolve(&self, suggestion_id: Uuid) -> Result<Suggestion, AppError> {
        let store = self.engine.store();
        store
            .find_candidate(suggestion_id)
            .cloned()
            .or_else(|| store.find_applied(suggestion_id).map(Suggestion::from))
            .ok_or_else(|| AppError::NotFound(format!("Suggestion {suggestion_id} not found")))
    }

    pub fn apply(&mut self, suggestion_id: Uuid) -> Result<usize, AppError> {
        let suggestion = self.resolve(suggestion_id)?;
        let count = self.engine.apply(&mut self.document, &suggestion)?;
        self.touch();
        Ok(count)
    }

    pub fn undo(&mut self, suggestion_id: Uuid) -> Result<usize, AppError> {
        let suggestion = self.resolve(suggestion_id)?;
        let count = self.engine.undo(&mut self.document, &suggestion)?;
        self.touch();
        Ok(count)
    }

    pub fn apply_all(&mut self) -> Result<usize, AppError> {
        let result = self.engine.apply_all(&mut self.document);
        self.touch();
        Ok(result?)
    }

    pub fn undo_all(&mut self) -> Result<usize, AppError> {
        let result = self.engine.undo_all(&mut self.document);
        self.touch();
        Ok(result?)
    }

    /// Writes a finished free-text value directly into the document.
    pub fn commit_text(&mut self, field_path: &str, text: String) -> Result<(), AppError> {
        let parsed = FieldPath::parse(field_path)?;
        path::write(&mut self.document, &parsed, Value::String(text))?;
        self.touch();
        Ok(())
    }

    pub fn view(&self) -> SessionView {
        let store = self.engine.store();
        SessionView {
            id: self.id,
            document: self.document.clone(),
            candidates: store
                .candidates()
                .iter()
                .map(|s| CandidateView {
                    suggestion: s.clone(),
                    applied: store.is_applied(&s.field_path),
                })
                .collect(),
            applied: store.applied().to_vec(),
            applied_count: store.applied_count(),
            last_report: self.last_report.clone(),
            undo_policy: self.engine.policy(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub type SessionHandle = Arc<Mutex<EditSession>>;

/// All open sessions, keyed by id.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    max_sessions: usize,
    policy: UndoPolicy,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, policy: UndoPolicy) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
            policy,
        }
    }

    pub async fn open(&self, document: Value) -> Result<SessionHandle, AppError> {
        let session = EditSession::new(document, self.policy)?;
        let id = session.id;

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            return Err(AppError::Validation(format!(
                "Too many open sessions (max {})",
                self.max_sessions
            )));
        }
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, handle.clone());

        info!("Opened editing session {id} ({} open)", sessions.len());
        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    }

    /// Ends a session; its suggestion lists are discarded with it.
    pub async fn close(&self, id: Uuid) -> Result<(), AppError> {
        let removed = self.sessions.write().await.remove(&id);
        match removed {
            Some(_) => {
                info!("Closed editing session {id}");
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Session {id} not found"))),
        }
    }
}
