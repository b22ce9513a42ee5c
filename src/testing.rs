//! Hand-written capability mocks shared by the unit tests.

use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use async_trait::async_trait;

use crate::capabilities::{
  Capabilities, CapabilityError, ChoiceDisambiguator, Embedder, Narrator, QuestionContext,
  QuestionSource, RawQuestion,
};

pub fn raw(prompt: &str, kind: &str, options: &[&str], tags: &[&str]) -> RawQuestion {
  RawQuestion {
    question: Some(prompt.into()),
    kind: Some(kind.into()),
    options: if options.is_empty() {
      None
    } else {
      Some(options.iter().map(|o| o.to_string()).collect())
    },
    intelligence_indicators: Some(tags.iter().map(|t| t.to_string()).collect()),
    rationale: Some("because".into()),
  }
}

/// Replays queued results, then fails with `Unavailable`.
#[derive(Default)]
pub struct ScriptedQuestions {
  queue: Mutex<VecDeque<Result<RawQuestion, CapabilityError>>>,
  calls: AtomicUsize,
  seen_history_lens: Mutex<Vec<usize>>,
}

impl ScriptedQuestions {
  pub fn new(items: Vec<Result<RawQuestion, CapabilityError>>) -> Self {
    Self { queue: Mutex::new(items.into()), ..Default::default() }
  }

  /// Endless single-tag textual questions, tag i for call i.
  pub fn cycling(tags: &[&str], count: usize) -> Self {
    let items = (0..count)
      .map(|i| {
        let tag = tags[i % tags.len()];
        Ok(raw(&format!("Question about {tag} #{i}?"), "textual", &[], &[tag]))
      })
      .collect();
    Self::new(items)
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn seen_history_lens(&self) -> Vec<usize> {
    self.seen_history_lens.lock().unwrap().clone()
  }
}

#[async_trait]
impl QuestionSource for ScriptedQuestions {
  async fn generate_question(&self, ctx: &QuestionContext<'_>) -> Result<RawQuestion, CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.seen_history_lens.lock().unwrap().push(ctx.history.len());
    self
      .queue
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(CapabilityError::Unavailable("script exhausted".into())))
  }
}

/// Never answers within any sane deadline.
pub struct HangingQuestions;

#[async_trait]
impl QuestionSource for HangingQuestions {
  async fn generate_question(&self, _ctx: &QuestionContext<'_>) -> Result<RawQuestion, CapabilityError> {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    Err(CapabilityError::Unavailable("unreachable".into()))
  }
}

pub struct ScriptedDisambiguator {
  reply: Option<String>,
  calls: AtomicUsize,
}

impl ScriptedDisambiguator {
  pub fn replying(text: &str) -> Self {
    Self { reply: Some(text.into()), calls: AtomicUsize::new(0) }
  }

  pub fn failing() -> Self {
    Self { reply: None, calls: AtomicUsize::new(0) }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ChoiceDisambiguator for ScriptedDisambiguator {
  async fn disambiguate(&self, _q: &str, _options: &[String], _answer: &str) -> Result<String, CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .reply
      .clone()
      .ok_or_else(|| CapabilityError::Upstream("disambiguation exploded".into()))
  }
}

#[derive(Default)]
pub struct RecordingNarrator {
  reply: Option<String>,
  received: Mutex<Vec<(String, String)>>,
}

impl RecordingNarrator {
  pub fn replying(text: &str) -> Self {
    Self { reply: Some(text.into()), ..Default::default() }
  }

  pub fn failing() -> Self {
    Self::default()
  }

  pub fn received(&self) -> Vec<(String, String)> {
    self.received.lock().unwrap().clone()
  }
}

#[async_trait]
impl Narrator for RecordingNarrator {
  async fn narrate(&self, transcript: &str, grounding: &str) -> Result<String, CapabilityError> {
    self.received.lock().unwrap().push((transcript.into(), grounding.into()));
    self
      .reply
      .clone()
      .ok_or_else(|| CapabilityError::Upstream("narration failed".into()))
  }
}

/// Same vector for every input (or always failing).
pub struct FixedEmbedder {
  vector: Option<Vec<f32>>,
}

impl FixedEmbedder {
  pub fn new(vector: Vec<f32>) -> Self {
    Self { vector: Some(vector) }
  }

  pub fn failing() -> Self {
    Self { vector: None }
  }
}

#[async_trait]
impl Embedder for FixedEmbedder {
  async fn embed(&self, _text: &str) -> Result<Vec<f32>, CapabilityError> {
    self
      .vector
      .clone()
      .ok_or_else(|| CapabilityError::Unavailable("no embedder".into()))
  }
}

pub fn caps(
  questions: Arc<dyn QuestionSource>,
  disambiguator: Arc<dyn ChoiceDisambiguator>,
  narrator: Arc<dyn Narrator>,
) -> Capabilities {
  Capabilities {
    questions,
    disambiguator,
    narrator,
    embedder: Arc::new(FixedEmbedder::new(vec![1.0, 0.0])),
  }
}
