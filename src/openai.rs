//! Minimal OpenAI client for our use-cases.
//!
//! We call chat.completions (plain text or a JSON object) and embeddings.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::capabilities::{
  CapabilityError, ChoiceDisambiguator, Embedder, Narrator, QuestionContext, QuestionSource,
  RawQuestion,
};
use crate::config::Prompts;
use crate::util::{extract_json_object, fill_template, trunc_for_log};

const UA: &str = "intelligence-explorer-backend/0.1";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub embedding_model: String,
  pub prompts: Prompts,
  pub timeout: Duration,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  /// Every request is capped by `timeout`, the same bound the capability calls use.
  pub fn from_env(prompts: Prompts, timeout: Duration) -> Option<Self> {
    Self::from_lookup(|key| std::env::var(key).ok(), prompts, timeout)
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>, prompts: Prompts, timeout: Duration) -> Option<Self> {
    let api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty())?;
    let base_url =
      lookup("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into());
    let fast_model =
      lookup("OPENAI_FAST_MODEL").unwrap_or_else(|| "gpt-4o-mini".into());
    let strong_model =
      lookup("OPENAI_STRONG_MODEL").unwrap_or_else(|| "gpt-4o".into());
    let embedding_model =
      lookup("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".into());

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model, embedding_model, prompts, timeout })
  }

  async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response, CapabilityError> {
    let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
    let res = self.client.post(&url)
      .header(USER_AGENT, UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(body).send().await
      .map_err(|e| CapabilityError::Upstream(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(CapabilityError::Upstream(format!("OpenAI HTTP {}: {}", status, msg)));
    }
    Ok(res)
  }

  async fn chat(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    json: bool,
  ) -> Result<String, CapabilityError> {
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let body: ChatCompletionResponse = self
      .post("chat/completions", &req)
      .await?
      .json()
      .await
      .map_err(|e| CapabilityError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string())
  }

  /// Plain-text chat completion. Used for disambiguation and narration.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, CapabilityError> {
    self.chat(model, system, user, temperature, false).await
  }

  /// JSON-object chat completion. Generic over the target type T. Replies that
  /// wrap the object in prose are parsed from their outermost braces.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, CapabilityError> {
    let text = self.chat(model, system, user, temperature, true).await?;
    parse_json_reply(&text)
  }
}

/// Parse a model reply as `T`, retrying on the outermost `{...}` span.
pub fn parse_json_reply<T: for<'a> Deserialize<'a>>(text: &str) -> Result<T, CapabilityError> {
  match serde_json::from_str::<T>(text) {
    Ok(v) => Ok(v),
    Err(first) => extract_json_object(text)
      .and_then(|inner| serde_json::from_str::<T>(inner).ok())
      .ok_or_else(|| CapabilityError::Malformed(format!("JSON parse error: {}", first))),
  }
}

#[async_trait]
impl QuestionSource for OpenAI {
  #[instrument(level = "info", skip(self, ctx), fields(model = %self.strong_model, history_len = ctx.history.len()))]
  async fn generate_question(&self, ctx: &QuestionContext<'_>) -> Result<RawQuestion, CapabilityError> {
    let history = ctx.serialized_history();
    let documents = if ctx.documents.is_empty() { "None".to_string() } else { ctx.documents.join(", ") };
    let user = fill_template(
      &self.prompts.question_user_template,
      &[
        ("name", ctx.profile.name.as_str()),
        ("age", ctx.profile.age.as_str()),
        ("background", ctx.profile.background.as_str()),
        ("preference", ctx.preference.as_str()),
        ("history", history.as_str()),
        ("documents", documents.as_str()),
      ],
    );

    let start = Instant::now();
    let result = self.chat_json::<RawQuestion>(&self.strong_model, &self.prompts.question_system, &user, 0.9).await;
    let elapsed = start.elapsed();
    match &result {
      Ok(q) => info!(
        ?elapsed,
        kind = ?q.kind,
        question_preview = %q.question.as_deref().unwrap_or_default().chars().take(40).collect::<String>(),
        "Question generated"
      ),
      Err(e) => error!(?elapsed, error = %e, "Model call failed during question generation"),
    }
    result
  }
}

#[async_trait]
impl ChoiceDisambiguator for OpenAI {
  #[instrument(level = "info", skip(self, question, options, answer), fields(model = %self.fast_model, options = options.len(), answer_len = answer.len()))]
  async fn disambiguate(&self, question: &str, options: &[String], answer: &str) -> Result<String, CapabilityError> {
    let options_json = serde_json::to_string(options).unwrap_or_default();
    let user = fill_template(
      &self.prompts.disambiguation_user_template,
      &[("question", question), ("options", options_json.as_str()), ("answer", answer)],
    );
    self.chat_plain(&self.fast_model, &self.prompts.disambiguation_system, &user, 0.0).await
  }
}

#[async_trait]
impl Narrator for OpenAI {
  #[instrument(level = "info", skip(self, transcript, grounding), fields(model = %self.strong_model, transcript_len = transcript.len(), grounding_len = grounding.len()))]
  async fn narrate(&self, transcript: &str, grounding: &str) -> Result<String, CapabilityError> {
    let context = if grounding.trim().is_empty() { "None available." } else { grounding };
    let user = fill_template(
      &self.prompts.narrative_user_template,
      &[("transcript", transcript), ("context", context)],
    );
    self.chat_plain(&self.strong_model, &self.prompts.narrative_system, &user, 0.7).await
  }
}

#[async_trait]
impl Embedder for OpenAI {
  #[instrument(level = "debug", skip(self, text), fields(model = %self.embedding_model, text_len = text.len()))]
  async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
    let req = EmbeddingRequest { model: &self.embedding_model, input: text };
    let body: EmbeddingResponse = self
      .post("embeddings", &req)
      .await?
      .json()
      .await
      .map_err(|e| CapabilityError::Malformed(e.to_string()))?;
    body
      .data
      .into_iter()
      .next()
      .map(|d| d.embedding)
      .ok_or_else(|| CapabilityError::Malformed("embedding response has no data".into()))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

// --- Embedding DTOs ---

#[derive(Serialize)]
struct EmbeddingRequest<'a> { model: &'a str, input: &'a str }
#[derive(Deserialize)]
struct EmbeddingResponse { data: Vec<EmbeddingData> }
#[derive(Deserialize)]
struct EmbeddingData { embedding: Vec<f32> }

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn parses_clean_and_wrapped_json() {
    let clean: RawQuestion = parse_json_reply(r#"{"question":"Q","type":"textual","options":null}"#).unwrap();
    assert_eq!(clean.question.as_deref(), Some("Q"));

    let wrapped: RawQuestion = parse_json_reply("Sure! ```json\n{\"question\":\"W\",\"type\":\"mcq\",\"options\":[\"a\"]}\n```").unwrap();
    assert_eq!(wrapped.options, Some(vec!["a".to_string()]));

    let bad = parse_json_reply::<RawQuestion>("no json at all");
    assert!(matches!(bad, Err(CapabilityError::Malformed(_))));
  }

  #[test]
  fn extracts_openai_error_message() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn client_uses_the_configured_timeout() {
    let env: HashMap<&str, &str> = [("OPENAI_API_KEY", "sk-test"), ("OPENAI_FAST_MODEL", "mini")].into();
    let lookup = |k: &str| env.get(k).map(|v| v.to_string());

    let oa = OpenAI::from_lookup(lookup, Prompts::default(), Duration::from_secs(7)).unwrap();
    assert_eq!(oa.timeout, Duration::from_secs(7));
    assert_eq!(oa.fast_model, "mini");
    assert_eq!(oa.base_url, "https://api.openai.com/v1");
  }

  #[test]
  fn missing_or_blank_key_disables_the_client() {
    assert!(OpenAI::from_lookup(|_| None, Prompts::default(), Duration::from_secs(5)).is_none());
    let blank = |k: &str| (k == "OPENAI_API_KEY").then(|| "  ".to_string());
    assert!(OpenAI::from_lookup(blank, Prompts::default(), Duration::from_secs(5)).is_none());
  }
}
