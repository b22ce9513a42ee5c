//! Adaptive assessment state machine.
//!
//! A `Session` is `Collecting` until either the leading indicator's share of
//! the evidence reaches the confidence threshold or the question budget is
//! spent; it is then `Terminated` for good and keeps its report. Exactly one
//! question is pending while collecting.
//!
//! The `Assessor` drives transitions. It borrows the shared capabilities,
//! knowledge base and settings, and mutates only the session handed to it.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::capabilities::{Capabilities, QuestionContext};
use crate::config::AssessmentSettings;
use crate::domain::{AnswerRecord, Question, QuestionPreference, UserProfile};
use crate::evidence::aggregate;
use crate::question::next_question;
use crate::report::{finalize, Report};
use crate::resolver::resolve_choice;
use crate::retrieval::KnowledgeBase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Collecting,
  Terminated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssessmentError {
  #[error("answer is empty")]
  EmptyAnswer,
  #[error("no question is pending for this session")]
  NoPendingQuestion,
}

/// Per-session state. Owned by exactly one session handle.
#[derive(Clone, Debug)]
pub struct Session {
  pub id: Uuid,
  pub profile: UserProfile,
  pub preference: QuestionPreference,
  history: Vec<AnswerRecord>,
  question_count: usize,
  current: Option<Question>,
  phase: Phase,
  report: Option<Report>,
}

impl Session {
  pub fn new(id: Uuid, profile: UserProfile, preference: QuestionPreference) -> Self {
    Self {
      id,
      profile,
      preference,
      history: Vec::new(),
      question_count: 0,
      current: None,
      phase: Phase::Collecting,
      report: None,
    }
  }

  pub fn history(&self) -> &[AnswerRecord] {
    &self.history
  }

  pub fn question_count(&self) -> usize {
    self.question_count
  }

  pub fn current_question(&self) -> Option<&Question> {
    self.current.as_ref()
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn report(&self) -> Option<&Report> {
    self.report.as_ref()
  }
}

/// What the user sees after an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Turn {
  Question {
    question: Question,
    /// 1-based number of the pending question.
    number: usize,
    max: usize,
  },
  Report(Report),
}

pub struct Assessor<'a> {
  pub caps: &'a Capabilities,
  pub kb: &'a KnowledgeBase,
  pub settings: &'a AssessmentSettings,
}

impl<'a> Assessor<'a> {
  pub fn new(caps: &'a Capabilities, kb: &'a KnowledgeBase, settings: &'a AssessmentSettings) -> Self {
    Self { caps, kb, settings }
  }

  /// Fresh session (empty history, count 0) with its first question pending.
  #[instrument(level = "info", skip(self, profile), fields(%id, preference = preference.as_str()))]
  pub async fn start(&self, id: Uuid, profile: UserProfile, preference: QuestionPreference) -> (Session, Turn) {
    let mut session = Session::new(id, profile, preference);
    let turn = self.ask_next(&mut session).await;
    (session, turn)
  }

  /// Record an answer to the pending question and either ask again or finish.
  #[instrument(level = "info", skip(self, session, answer), fields(id = %session.id, count = session.question_count, answer_len = answer.len()))]
  pub async fn submit(&self, session: &mut Session, answer: &str) -> Result<Turn, AssessmentError> {
    if let Some(report) = session.report() {
      warn!(target: "assessment", id = %session.id, "Answer submitted to a terminated session; returning its report");
      return Ok(Turn::Report(report.clone()));
    }
    let question = session.current_question().cloned().ok_or(AssessmentError::NoPendingQuestion)?;
    // Blank choice answers still resolve to an option.
    if !question.is_multiple_choice() && answer.trim().is_empty() {
      return Err(AssessmentError::EmptyAnswer);
    }

    let resolved = if question.is_multiple_choice() {
      let r = resolve_choice(
        self.caps.disambiguator.as_ref(),
        self.settings.call_timeout(),
        &question.prompt,
        &question.options,
        answer,
      )
      .await;
      info!(target: "assessment", id = %session.id, method = ?r.method, "Choice resolved");
      r.answer
    } else {
      answer.trim().to_string()
    };

    session.history.push(AnswerRecord {
      question: question.prompt.clone(),
      answer: resolved,
      indicators: question.indicators.clone(),
    });
    session.question_count += 1;

    let evidence = aggregate(&session.history);
    info!(
      target: "assessment",
      id = %session.id,
      count = session.question_count,
      distinct_indicators = evidence.tally.len(),
      confidence = evidence.confidence,
      "Answer recorded"
    );

    if evidence.confidence >= self.settings.confidence_threshold
      || session.question_count >= self.settings.max_questions
    {
      return Ok(Turn::Report(self.terminate(session).await));
    }

    Ok(self.ask_next(session).await)
  }

  /// Re-render without an answer: the pending question, or the report. A
  /// session whose budget is already spent terminates here instead of asking
  /// one question too many.
  #[instrument(level = "info", skip(self, session), fields(id = %session.id, count = session.question_count))]
  pub async fn view(&self, session: &mut Session) -> Turn {
    if let Some(report) = session.report() {
      return Turn::Report(report.clone());
    }
    if session.question_count >= self.settings.max_questions {
      return Turn::Report(self.terminate(session).await);
    }
    if let Some(question) = session.current_question().cloned() {
      return Turn::Question {
        question,
        number: session.question_count + 1,
        max: self.settings.max_questions,
      };
    }
    self.ask_next(session).await
  }

  async fn ask_next(&self, session: &mut Session) -> Turn {
    let documents = self.kb.names();
    let ctx = QuestionContext {
      profile: &session.profile,
      preference: session.preference,
      history: &session.history,
      documents: &documents,
    };
    let (question, origin) = next_question(self.caps.questions.as_ref(), &ctx, self.settings).await;
    info!(target: "assessment", id = %session.id, number = session.question_count + 1, %origin, "Question served");
    session.current = Some(question.clone());
    Turn::Question {
      question,
      number: session.question_count + 1,
      max: self.settings.max_questions,
    }
  }

  async fn terminate(&self, session: &mut Session) -> Report {
    session.phase = Phase::Terminated;
    session.current = None;
    let report = finalize(session.history(), self.kb, self.caps, self.settings).await;
    info!(target: "assessment", id = %session.id, count = session.question_count, primary = ?report.primary, "Assessment terminated");
    session.report = Some(report.clone());
    report
  }
}
