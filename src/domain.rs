//! Domain models used by the backend: user profile, question kinds/preference,
//! validated questions, answer records and knowledge documents.

use serde::{Deserialize, Serialize};

/// Who is taking the assessment. Free-form, read-only once the session starts.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
  #[serde(default)] pub name: String,
  #[serde(default)] pub age: String,
  #[serde(default)] pub background: String,
}

/// How a question expects to be answered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  /// Pick one of `options`.
  #[serde(rename = "mcq", alias = "multiple_choice")]
  MultipleChoice,
  /// Free-text answer.
  Textual,
}

impl QuestionKind {
  /// Lenient parse of the `type` field produced by a generator.
  pub fn parse_loose(raw: &str) -> Option<Self> {
    let s = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match s.as_str() {
      "mcq" | "multiple_choice" | "choice" => Some(QuestionKind::MultipleChoice),
      "textual" | "text" | "open_ended" | "open" => Some(QuestionKind::Textual),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionKind::MultipleChoice => "mcq",
      QuestionKind::Textual => "textual",
    }
  }
}

/// Which kind of generated question the session accepts. Set once per session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPreference {
  #[serde(rename = "mcq", alias = "multiple_choice")]
  MultipleChoice,
  Textual,
}

impl Default for QuestionPreference {
  fn default() -> Self { QuestionPreference::Textual }
}

impl QuestionPreference {
  pub fn accepts(&self, kind: QuestionKind) -> bool {
    matches!(
      (self, kind),
      (QuestionPreference::MultipleChoice, QuestionKind::MultipleChoice)
        | (QuestionPreference::Textual, QuestionKind::Textual)
    )
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      QuestionPreference::MultipleChoice => "mcq",
      QuestionPreference::Textual => "textual",
    }
  }
}

/// A validated question. `options` is non-empty iff `kind` is multiple choice;
/// `indicators` is a non-empty, de-duplicated, lower-cased tag set in first-seen order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub prompt: String,
  pub kind: QuestionKind,
  #[serde(default)] pub options: Vec<String>,
  pub indicators: Vec<String>,
  #[serde(default)] pub rationale: String,
}

impl Question {
  pub fn is_multiple_choice(&self) -> bool {
    self.kind == QuestionKind::MultipleChoice
  }
}

/// One answered question. Serialized with the field names the generation prompt
/// expects when the history is handed back as context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecord {
  pub question: String,
  pub answer: String,
  #[serde(rename = "intelligence_indicators")]
  pub indicators: Vec<String>,
}

/// A reference document embedded once at startup.
#[derive(Clone, Debug)]
pub struct KnowledgeDocument {
  pub name: String,
  pub text: String,
  pub embedding: Vec<f32>,
}
