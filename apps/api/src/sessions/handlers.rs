//! Axum route handlers for the Sessions API.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::cover_letter::CoverLetterRequest;
use crate::generation::suggestions::{GenerationReport, SuggestRequest};
use crate::patch::path::{self, FieldPath};
use crate::patch::{StreamAccumulator, Suggestion};
use crate::sessions::{SessionHandle, SessionView};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub document: Value,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
    pub report: GenerationReport,
}

#[derive(Debug, Serialize)]
pub struct PatchResponse {
    pub applied_count: usize,
    pub document: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_open_session(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let session = state.sessions.open(request.document).await?;
    let view = session.lock().await.view();
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let view = session.lock().await.view();
    Ok(Json(view))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/suggestions
///
/// Generates a fresh suggestion set for the session's current document and
/// installs it as the candidate list. A rejected generation leaves the session untouched.
pub async fn handle_generate_suggestions(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SuggestRequest>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let session = state.sessions.get(session_id).await?;
    let document = session.lock().await.document().clone();

    let set = state.generator.suggest(&request, &document).await?;
    let report = set.report();

    // Originals are re-derived under the lock; the document may have changed
    // while the generator was running.
    let suggestions = session.lock().await.install(set).to_vec();
    info!(
        "Installed {} suggestions into session {session_id}",
        report.suggestion_count
    );

    Ok(Json(SuggestionsResponse {
        suggestions,
        report,
    }))
}

/// POST /api/v1/sessions/:id/suggestions/:sid/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Path((session_id, suggestion_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PatchResponse>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    let applied_count = session.apply(suggestion_id)?;
    Ok(Json(PatchResponse {
        applied_count,
        document: session.document().clone(),
    }))
}

/// POST /api/v1/sessions/:id/suggestions/:sid/undo
pub async fn handle_undo(
    State(state): State<AppState>,
    Path((session_id, suggestion_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PatchResponse>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    let applied_count = session.undo(suggestion_id)?;
    Ok(Json(PatchResponse {
        applied_count,
        document: session.document().clone(),
    }))
}

/// POST /api/v1/sessions/:id/apply-all
pub async fn handle_apply_all(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PatchResponse>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    let applied_count = session.apply_all()?;
    Ok(Json(PatchResponse {
        applied_count,
        document: session.document().clone(),
    }))
}

/// POST /api/v1/sessions/:id/undo-all
pub async fn handle_undo_all(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PatchResponse>, AppError> {
    let session = state.sessions.get(session_id).await?;
    let mut session = session.lock().await;
    let applied_count = session.undo_all()?;
    Ok(Json(PatchResponse {
        applied_count,
        document: session.document().clone(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Cover letter streaming
// ────────────────────────────────────────────────────────────────────────────

/// In-flight cover letter. Dropping it (client disconnect) drops the
/// accumulator and with it the upstream reader.
struct CoverLetterStream {
    acc: StreamAccumulator,
    session: SessionHandle,
    field_path: String,
}

fn error_event(message: &str, partial: &str) -> Event {
    Event::default()
        .event("error")
        .data(json!({ "message": message, "partial": partial }).to_string())
}

/// Produces the next SSE event. Empty deltas are skipped; a final chunk's
/// text is folded into the `done` payload rather than sent as its own `chunk`.
async fn next_event(
    stream: Option<CoverLetterStream>,
) -> Option<(Result<Event, Infallible>, Option<CoverLetterStream>)> {
    let mut st = stream?;
    loop {
        match st.acc.pull().await {
            Ok(Some(delta)) if !st.acc.is_complete() => {
                if delta.is_empty() {
                    continue;
                }
                let event = Event::default().event("chunk").data(delta.replace('\r', ""));
                return Some((Ok(event), Some(st)));
            }
            Ok(_) => {
                let CoverLetterStream {
                    acc,
                    session,
                    field_path,
                } = st;
                let text = acc.into_text();

                let committed = session.lock().await.commit_text(&field_path, text.clone());
                let event = match committed {
                    Ok(()) => {
                        info!("Committed {} bytes of cover letter to '{field_path}'", text.len());
                        Event::default().event("done").data(
                            json!({ "field_path": field_path, "text": text }).to_string(),
                        )
                    }
                    Err(e) => {
                        warn!("Failed to commit cover letter to '{field_path}': {e}");
                        error_event(&e.to_string(), &text)
                    }
                };
                return Some((Ok(event), None));
            }
            Err(error) => {
                let failure = st.acc.into_failure(error);
                warn!("Cover letter stream failed: {failure}");
                let event = error_event(&failure.error.to_string(), &failure.partial);
                return Some((Ok(event), None));
            }
        }
    }
}

/// POST /api/v1/sessions/:id/cover-letter
///
/// Streams a generated cover letter as SSE and writes the finished text into
/// `field_path` (default `coverLetter`). Nothing is written if the stream fails.
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CoverLetterRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }
    let field_path =
        FieldPath::parse(&request.field_path).map_err(|e| AppError::Validation(e.to_string()))?;

    let session = state.sessions.get(session_id).await?;
    let document = session.lock().await.document().clone();
    path::check_write(&document, &field_path).map_err(|e| AppError::Validation(e.to_string()))?;

    let reader = state
        .generator
        .stream_cover_letter(&request, &document)
        .await?;
    info!("Streaming cover letter for session {session_id}");

    let initial = CoverLetterStream {
        acc: StreamAccumulator::new(reader),
        session,
        field_path: request.field_path,
    };
    let events = futures::stream::unfold(Some(initial), next_event);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
