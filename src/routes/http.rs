//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and log include parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::assessment::AssessmentError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// Error body `{"error": .., "code": ..}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
  NotFound(String),
  BadRequest(String),
  Conflict(String),
}

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self {
    match e {
      SessionError::NotFound(_) => ApiError::NotFound(e.to_string()),
      SessionError::Assessment(AssessmentError::EmptyAnswer) => ApiError::BadRequest(e.to_string()),
      SessionError::Assessment(AssessmentError::NoPendingQuestion) => ApiError::Conflict(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, message) = match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", m),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, "CONFLICT", m),
    };
    (status, Json(json!({ "error": message, "code": code }))).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, sessions: state.session_count().await, documents: state.kb.len() })
}

#[instrument(level = "info", skip(state, body), fields(preference = body.question_preference.as_str()))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartIn>,
) -> impl IntoResponse {
  let out = start_session(&state, body).await;
  info!(target: "explorer_backend", "HTTP start_session served");
  (StatusCode::CREATED, Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_view_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<TurnOut>, ApiError> {
  Ok(Json(view_session(&state, id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<TurnOut>, ApiError> {
  let out = submit_answer(&state, id, &body.answer).await?;
  info!(target: "explorer_backend", %id, "HTTP submit_answer processed");
  Ok(Json(out))
}
