//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Each operation locates (or creates) the session, takes its lock for the
//! whole operation, and drives the assessor against it.

use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::assessment::{AssessmentError, Turn};
use crate::protocol::{to_out, StartIn, TurnOut};
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("unknown session: {0}")]
  NotFound(Uuid),
  #[error(transparent)]
  Assessment(#[from] AssessmentError),
}

fn turn_label(turn: &Turn) -> &'static str {
  match turn {
    Turn::Question { .. } => "question",
    Turn::Report(_) => "report",
  }
}

/// Fresh session with its first question. A known `sessionId` restarts that session.
#[instrument(level = "info", skip(state, req), fields(preference = req.question_preference.as_str(), restart = req.session_id.is_some()))]
pub async fn start_session(state: &AppState, req: StartIn) -> TurnOut {
  let id = req.session_id.unwrap_or_else(Uuid::new_v4);
  let (session, turn) = state
    .assessor()
    .start(id, req.profile(), req.question_preference)
    .await;
  state.put_session(session).await;
  info!(target: "assessment", %id, outcome = turn_label(&turn), "Session started");
  to_out(id, turn)
}

#[instrument(level = "info", skip(state, answer), fields(%id, answer_len = answer.len()))]
pub async fn submit_answer(state: &AppState, id: Uuid, answer: &str) -> Result<TurnOut, SessionError> {
  let handle = state.session(id).await.ok_or(SessionError::NotFound(id))?;
  let mut session = handle.lock().await;
  let turn = state.assessor().submit(&mut session, answer).await.map_err(|e| {
    warn!(target: "assessment", %id, error = %e, "Answer rejected");
    e
  })?;
  info!(target: "assessment", %id, outcome = turn_label(&turn), count = session.question_count(), phase = ?session.phase(), "Answer processed");
  Ok(to_out(id, turn))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn view_session(state: &AppState, id: Uuid) -> Result<TurnOut, SessionError> {
  let handle = state.session(id).await.ok_or(SessionError::NotFound(id))?;
  let mut session = handle.lock().await;
  let turn = state.assessor().view(&mut session).await;
  Ok(to_out(id, turn))
}
