//! Capability ports: the external engines the assessment core depends on.
//!
//! The OpenAI client (`openai`) and the offline implementations (`local`)
//! both plug in here, so the controller never talks to a concrete provider.
//! Every call goes through `bounded`, which maps an expired deadline to
//! `CapabilityError::Timeout` so callers can treat it like any other failure.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{AnswerRecord, QuestionPreference, UserProfile};

#[derive(Debug, Error)]
pub enum CapabilityError {
  #[error("capability unavailable: {0}")]
  Unavailable(String),
  #[error("upstream call failed: {0}")]
  Upstream(String),
  #[error("malformed response: {0}")]
  Malformed(String),
  #[error("call timed out after {0:?}")]
  Timeout(Duration),
}

/// Unvalidated question as a generator returns it. Field names follow the JSON
/// schema requested from the model.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawQuestion {
  #[serde(default)]
  pub question: Option<String>,
  #[serde(default, rename = "type")]
  pub kind: Option<String>,
  #[serde(default)]
  pub options: Option<Vec<String>>,
  #[serde(default)]
  pub intelligence_indicators: Option<Vec<String>>,
  #[serde(default)]
  pub rationale: Option<String>,
}

/// Everything a generator may condition the next question on.
#[derive(Clone, Copy, Debug)]
pub struct QuestionContext<'a> {
  pub profile: &'a UserProfile,
  pub preference: QuestionPreference,
  pub history: &'a [AnswerRecord],
  pub documents: &'a [String],
}

impl QuestionContext<'_> {
  /// History as the JSON array handed to the model ("None" before the first answer).
  pub fn serialized_history(&self) -> String {
    if self.history.is_empty() {
      return "None".into();
    }
    serde_json::to_string(self.history).unwrap_or_else(|_| "None".into())
  }
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
  async fn generate_question(&self, ctx: &QuestionContext<'_>) -> Result<RawQuestion, CapabilityError>;
}

#[async_trait]
pub trait ChoiceDisambiguator: Send + Sync {
  /// Map a free-form answer onto one of `options`. The reply is free text and
  /// is checked against `options` by the caller.
  async fn disambiguate(
    &self,
    question: &str,
    options: &[String],
    answer: &str,
  ) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
  async fn narrate(&self, transcript: &str, grounding: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
  /// Fixed-length vector; documents and queries must share one embedding space.
  async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;
}

/// The set of engines shared by every session.
#[derive(Clone)]
pub struct Capabilities {
  pub questions: Arc<dyn QuestionSource>,
  pub disambiguator: Arc<dyn ChoiceDisambiguator>,
  pub narrator: Arc<dyn Narrator>,
  pub embedder: Arc<dyn Embedder>,
}

/// Run a capability call under a deadline.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, CapabilityError>
where
  F: Future<Output = Result<T, CapabilityError>>,
{
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(CapabilityError::Timeout(limit)),
  }
}
