//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::assessment::AssessmentError;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "explorer_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "explorer_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "explorer_backend", len = txt.len(), "WS message received");
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { code: "BAD_REQUEST".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "code": "INTERNAL", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "explorer_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "explorer_backend", "WebSocket disconnected");
}

fn error_message(e: SessionError) -> ServerWsMessage {
  let code = match &e {
    SessionError::NotFound(_) => "NOT_FOUND",
    SessionError::Assessment(AssessmentError::EmptyAnswer) => "BAD_REQUEST",
    SessionError::Assessment(AssessmentError::NoPendingQuestion) => "CONFLICT",
  };
  ServerWsMessage::Error { code: code.into(), message: e.to_string() }
}

#[instrument(level = "info", skip(msg, state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession(req) => {
      let out = start_session(state, req).await;
      info!(target: "explorer_backend", "WS start_session served");
      out.into()
    }

    ClientWsMessage::SubmitAnswer { session_id, answer } => {
      match submit_answer(state, session_id, &answer).await {
        Ok(out) => out.into(),
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::ViewSession { session_id } => {
      match view_session(state, session_id).await {
        Ok(out) => out.into(),
        Err(e) => error_message(e),
      }
    }
  }
}
