//! Loading agent configuration (prompts + assessment settings) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `AssessmentSettings` for expected schema.
//! Every field has a default, so an empty file (or no file) is valid.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info, warn};

/// Confidence share at which the assessment stops early.
pub const CONFIDENCE_THRESHOLD: f64 = 0.40;
/// Question budget per session.
pub const MAX_QUESTIONS: usize = 10;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub assessment: AssessmentSettings,
}

/// Knobs of the adaptive loop and the report.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AssessmentSettings {
  pub confidence_threshold: f64,
  pub max_questions: usize,
  pub retrieval_top_k: usize,
  pub preview_chars: usize,
  pub grounding_query: String,
  pub docs_dir: PathBuf,
  pub call_timeout_secs: u64,
  /// Generations tried per turn before falling back when the kind does not
  /// match the session preference.
  pub generation_attempts: u32,
  /// Idle time after which a session is dropped from the store.
  pub session_ttl_secs: u64,
}

impl Default for AssessmentSettings {
  fn default() -> Self {
    Self {
      confidence_threshold: CONFIDENCE_THRESHOLD,
      max_questions: MAX_QUESTIONS,
      retrieval_top_k: 5,
      preview_chars: 500,
      grounding_query: "Gardner's theory detailed explanation of intelligence types and interpretation".into(),
      docs_dir: PathBuf::from("docs"),
      call_timeout_secs: 20,
      generation_attempts: 3,
      session_ttl_secs: 3600,
    }
  }
}

impl AssessmentSettings {
  pub fn call_timeout(&self) -> Duration {
    Duration::from_secs(self.call_timeout_secs)
  }

  pub fn session_ttl(&self) -> Duration {
    Duration::from_secs(self.session_ttl_secs)
  }

  /// Clamp values that would break the loop (a zero budget, a threshold outside [0,1]).
  pub fn sanitized(mut self) -> Self {
    if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
      warn!(target: "explorer_backend", value = self.confidence_threshold, "confidence_threshold out of range; using default");
      self.confidence_threshold = CONFIDENCE_THRESHOLD;
    }
    if self.max_questions == 0 {
      warn!(target: "explorer_backend", "max_questions must be at least 1; using default");
      self.max_questions = MAX_QUESTIONS;
    }
    if self.call_timeout_secs == 0 {
      warn!(target: "explorer_backend", "call_timeout_secs must be at least 1; using 1");
      self.call_timeout_secs = 1;
    }
    if self.session_ttl_secs == 0 {
      warn!(target: "explorer_backend", "session_ttl_secs must be at least 1; using default");
      self.session_ttl_secs = AssessmentSettings::default().session_ttl_secs;
    }
    self.generation_attempts = self.generation_attempts.max(1);
    self
  }
}

/// Prompts used by the OpenAI client. Defaults target a Gardner-style
/// multiple intelligences interview; override them in TOML to tune tone.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Question generation
  pub question_system: String,
  pub question_user_template: String,
  // MCQ answer mapping
  pub disambiguation_system: String,
  pub disambiguation_user_template: String,
  // Final narrative
  pub narrative_system: String,
  pub narrative_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You are a friendly psychologist and expert in Howard Gardner's theory of multiple intelligences. Respond ONLY with strict JSON.".into(),
      question_user_template: "Ask ONE simple question, in a warm and non-professional tone, that helps reveal which of Gardner's intelligences (linguistic, logical-mathematical, spatial, bodily-kinesthetic, musical, interpersonal, intrapersonal, naturalistic) is strongest for this person.\n\
Person: name={name}, age={age}, background={background}.\n\
Preferred question type: {preference}.\n\
Previous conversation (JSON): {history}\n\
Available reference documents: {documents}\n\
Refer to earlier answers when there are any, and probe a different intelligence than the last question.\n\
Return JSON: {\"question\": string, \"type\": \"mcq\" | \"textual\", \"options\": [string] | null, \"intelligence_indicators\": [string], \"rationale\": string}".into(),
      disambiguation_system: "You map spoken or typed answers onto a fixed list of options. Reply with exactly one of the options, copied verbatim, and nothing else.".into(),
      disambiguation_user_template: "Question: {question}\nOptions: {options}\nThe response was: '{answer}'.\nWhich option does this answer best correspond to?".into(),
      narrative_system: "You are a knowledgeable, warm psychologist writing a personalised multiple intelligences profile.".into(),
      narrative_user_template: "Based on Howard Gardner's theory of multiple intelligences, analyse this person's profile.\n\n\
Conversation history:\n{transcript}\n\
Context on Gardner's theory:\n{context}\n\
Cover: primary and secondary intelligences; strengths shown by the answers; career or learning paths that fit; how to develop the leading intelligences further; how the intelligences complement each other. Keep it encouraging and personal.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "explorer_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "explorer_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "explorer_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Config from file (or defaults) with env overrides applied and settings clamped.
pub fn resolve_config() -> AgentConfig {
  let mut cfg = load_agent_config_from_env().unwrap_or_default();
  if let Ok(dir) = std::env::var("DOCS_DIR") {
    cfg.assessment.docs_dir = PathBuf::from(dir);
  }
  cfg.assessment = cfg.assessment.sanitized();
  cfg
}
