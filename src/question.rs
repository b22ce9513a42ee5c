//! Question generation boundary: validate what the generator returns, enforce
//! the session's question preference, and substitute the fallback question
//! whenever generation fails.
//!
//! A generator error, timeout or malformed reply ends the turn's generation
//! with the fallback. A well-formed question of the wrong kind is discarded and
//! generation is retried, up to `generation_attempts` calls in total.

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::capabilities::{bounded, QuestionContext, QuestionSource, RawQuestion};
use crate::config::AssessmentSettings;
use crate::domain::{Question, QuestionKind};
use crate::seeds::fallback_question;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedQuestion {
  #[error("question text is missing or empty")]
  MissingPrompt,
  #[error("question type is missing")]
  MissingKind,
  #[error("unknown question type '{0}'")]
  UnknownKind(String),
  #[error("multiple-choice question has no usable options")]
  NoOptions,
  #[error("question carries no intelligence indicators")]
  NoIndicators,
}

fn clean(s: &str) -> Option<String> {
  let t = s.trim();
  if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Keep first occurrences, drop blanks.
fn dedup_ordered(items: impl IntoIterator<Item = String>) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for item in items {
    if !out.contains(&item) {
      out.push(item);
    }
  }
  out
}

impl TryFrom<RawQuestion> for Question {
  type Error = MalformedQuestion;

  fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
    let prompt = raw.question.as_deref().and_then(clean).ok_or(MalformedQuestion::MissingPrompt)?;
    let kind_raw = raw.kind.ok_or(MalformedQuestion::MissingKind)?;
    let kind = QuestionKind::parse_loose(&kind_raw).ok_or(MalformedQuestion::UnknownKind(kind_raw))?;

    let options = match kind {
      QuestionKind::MultipleChoice => {
        let opts = dedup_ordered(raw.options.unwrap_or_default().iter().filter_map(|o| clean(o)));
        if opts.is_empty() {
          return Err(MalformedQuestion::NoOptions);
        }
        opts
      }
      QuestionKind::Textual => Vec::new(),
    };

    let indicators = dedup_ordered(
      raw
        .intelligence_indicators
        .unwrap_or_default()
        .iter()
        .filter_map(|t| clean(t))
        .map(|t| t.to_lowercase()),
    );
    if indicators.is_empty() {
      return Err(MalformedQuestion::NoIndicators);
    }

    Ok(Question {
      prompt,
      kind,
      options,
      indicators,
      rationale: raw.rationale.map(|r| r.trim().to_string()).unwrap_or_default(),
    })
  }
}

/// Produce the next question for a session. Never fails: the second element
/// says where the question came from ("generated" or "fallback").
#[instrument(level = "info", skip_all, fields(preference = ctx.preference.as_str(), history_len = ctx.history.len()))]
pub async fn next_question(
  source: &dyn QuestionSource,
  ctx: &QuestionContext<'_>,
  settings: &AssessmentSettings,
) -> (Question, &'static str) {
  let attempts = settings.generation_attempts.max(1);
  for attempt in 1..=attempts {
    let raw = match bounded(settings.call_timeout(), source.generate_question(ctx)).await {
      Ok(raw) => raw,
      Err(e) => {
        error!(target: "assessment", attempt, error = %e, "Question generation failed; using fallback question");
        break;
      }
    };

    let question = match Question::try_from(raw) {
      Ok(q) => q,
      Err(e) => {
        error!(target: "assessment", attempt, error = %e, "Generated question is malformed; using fallback question");
        break;
      }
    };

    if ctx.preference.accepts(question.kind) {
      info!(target: "assessment", attempt, kind = question.kind.as_str(), indicators = ?question.indicators, "Generated question accepted");
      return (question, "generated");
    }
    warn!(target: "assessment", attempt, kind = question.kind.as_str(), "Generated question does not match preference; discarding");
  }

  (fallback_question(), "fallback")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::capabilities::CapabilityError;
  use crate::domain::{QuestionPreference, UserProfile};
  use crate::testing::{raw, HangingQuestions, ScriptedQuestions};
  use std::time::Duration;

  fn ctx<'a>(profile: &'a UserProfile, preference: QuestionPreference) -> QuestionContext<'a> {
    QuestionContext { profile, preference, history: &[], documents: &[] }
  }

  #[test]
  fn validation_normalises_fields() {
    let q = Question::try_from(raw(
      "  Do you hum?  ",
      "MCQ",
      &["Yes", " ", "No", "Yes"],
      &["Musical", "musical", " rhythm "],
    ))
    .unwrap();
    assert_eq!(q.prompt, "Do you hum?");
    assert_eq!(q.kind, QuestionKind::MultipleChoice);
    assert_eq!(q.options, vec!["Yes".to_string(), "No".to_string()]);
    assert_eq!(q.indicators, vec!["musical".to_string(), "rhythm".to_string()]);
  }

  #[test]
  fn textual_questions_drop_options() {
    let q = Question::try_from(raw("Tell me more", "open-ended", &["stray"], &["verbal"])).unwrap();
    assert_eq!(q.kind, QuestionKind::Textual);
    assert!(q.options.is_empty());
  }

  #[test]
  fn validation_rejects_malformed_shapes() {
    assert_eq!(
      Question::try_from(raw("", "textual", &[], &["x"])),
      Err(MalformedQuestion::MissingPrompt)
    );
    assert_eq!(
      Question::try_from(raw("Pick", "mcq", &[], &["x"])),
      Err(MalformedQuestion::NoOptions)
    );
    assert_eq!(
      Question::try_from(raw("Pick", "quiz", &[], &["x"])),
      Err(MalformedQuestion::UnknownKind("quiz".into()))
    );
    assert_eq!(
      Question::try_from(raw("Why?", "textual", &[], &[])),
      Err(MalformedQuestion::NoIndicators)
    );
    let no_kind = RawQuestion { kind: None, ..raw("Why?", "textual", &[], &["x"]) };
    assert_eq!(Question::try_from(no_kind), Err(MalformedQuestion::MissingKind));
  }

  #[tokio::test]
  async fn generation_error_yields_fallback() {
    let profile = UserProfile::default();
    let source = ScriptedQuestions::new(vec![Err(CapabilityError::Upstream("500".into()))]);
    let (q, origin) = next_question(&source, &ctx(&profile, QuestionPreference::Textual), &AssessmentSettings::default()).await;
    assert_eq!(origin, "fallback");
    assert_eq!(q, fallback_question());
    assert_eq!(source.calls(), 1);
  }

  #[tokio::test]
  async fn malformed_reply_yields_fallback() {
    let profile = UserProfile::default();
    let source = ScriptedQuestions::new(vec![Ok(raw("Pick one", "mcq", &[], &["logical"]))]);
    let (q, origin) = next_question(&source, &ctx(&profile, QuestionPreference::MultipleChoice), &AssessmentSettings::default()).await;
    assert_eq!(origin, "fallback");
    assert_eq!(q.prompt, fallback_question().prompt);
  }

  #[tokio::test]
  async fn mismatched_kind_is_retried() {
    let profile = UserProfile::default();
    let source = ScriptedQuestions::new(vec![
      Ok(raw("Open?", "textual", &[], &["verbal"])),
      Ok(raw("Pick", "mcq", &["A", "B"], &["logical"])),
    ]);
    let (q, origin) = next_question(&source, &ctx(&profile, QuestionPreference::MultipleChoice), &AssessmentSettings::default()).await;
    assert_eq!(origin, "generated");
    assert_eq!(q.prompt, "Pick");
    assert_eq!(source.calls(), 2);
  }

  #[tokio::test]
  async fn attempts_are_bounded() {
    let profile = UserProfile::default();
    let source = ScriptedQuestions::cycling(&["verbal"], 10);
    let settings = AssessmentSettings { generation_attempts: 2, ..AssessmentSettings::default() };
    let (_, origin) = next_question(&source, &ctx(&profile, QuestionPreference::MultipleChoice), &settings).await;
    assert_eq!(origin, "fallback");
    assert_eq!(source.calls(), 2);
  }

  #[tokio::test]
  async fn timeout_yields_fallback() {
    let profile = UserProfile::default();
    let settings = AssessmentSettings { call_timeout_secs: 1, ..AssessmentSettings::default() };
    let started = std::time::Instant::now();
    let (q, origin) = next_question(&HangingQuestions, &ctx(&profile, QuestionPreference::Textual), &settings).await;
    assert_eq!(origin, "fallback");
    assert_eq!(q.indicators, fallback_question().indicators);
    assert!(started.elapsed() < Duration::from_secs(10));
  }
}
