//! Final report: statistical summary of the evidence, grounded by retrieval
//! over the knowledge base, plus a narrative elaboration.
//!
//! Retrieval or narration failures degrade the report (no grounding, or no
//! narrative) instead of failing it.

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::capabilities::{bounded, Capabilities};
use crate::config::AssessmentSettings;
use crate::domain::AnswerRecord;
use crate::evidence::{aggregate, IndicatorShare};
use crate::retrieval::{render_context, KnowledgeBase};

pub const INSUFFICIENT_DATA: &str = "Insufficient data to determine intelligence type.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
  pub primary: Option<String>,
  pub confidence: f64,
  pub questions_answered: usize,
  pub breakdown: Vec<IndicatorShare>,
  /// Names of the documents used as grounding.
  pub sources: Vec<String>,
  pub narrative: Option<String>,
  /// Human-readable rendering of everything above.
  pub text: String,
}

/// Transcript handed to the narrator.
pub fn transcript(history: &[AnswerRecord]) -> String {
  let mut out = String::new();
  for (i, entry) in history.iter().enumerate() {
    out.push_str(&format!("Question {}: {}\n", i + 1, entry.question));
    out.push_str(&format!("Answer: {}\n", entry.answer));
    out.push_str(&format!("Intelligence Indicators: {}\n\n", entry.indicators.join(", ")));
  }
  out
}

/// Summary block: primary indicator, confidence, count and breakdown.
pub fn summary_text(primary: &str, confidence: f64, answered: usize, breakdown: &[IndicatorShare]) -> String {
  let mut out = format!(
    "Primary Intelligence Type: {}\nConfidence Score: {:.2}%\n\nQuestions Answered: {}\n\nIntelligence Profile:\n",
    primary,
    confidence * 100.0,
    answered
  );
  for share in breakdown {
    out.push_str(&format!("- {}: {:.1}%\n", share.indicator, share.percentage));
  }
  out
}

#[instrument(level = "info", skip_all, fields(history_len = history.len(), docs = kb.len()))]
pub async fn finalize(
  history: &[AnswerRecord],
  kb: &KnowledgeBase,
  caps: &Capabilities,
  settings: &AssessmentSettings,
) -> Report {
  let evidence = aggregate(history);
  let primary = match evidence.tally.primary() {
    Some((tag, _)) => tag.to_string(),
    None => {
      warn!(target: "assessment", "No indicators recorded; reporting insufficient data");
      return Report {
        primary: None,
        confidence: 0.0,
        questions_answered: history.len(),
        breakdown: Vec::new(),
        sources: Vec::new(),
        narrative: None,
        text: INSUFFICIENT_DATA.into(),
      };
    }
  };

  let breakdown = evidence.tally.ranked();
  let mut text = summary_text(&primary, evidence.confidence, history.len(), &breakdown);

  let passages = match bounded(
    settings.call_timeout(),
    kb.retrieve(caps.embedder.as_ref(), &settings.grounding_query, settings.retrieval_top_k, settings.preview_chars),
  )
  .await
  {
    Ok(p) => p,
    Err(e) => {
      error!(target: "assessment", error = %e, "Grounding retrieval failed; narrating without context");
      Vec::new()
    }
  };
  let grounding = render_context(&passages);
  let sources: Vec<String> = passages.into_iter().map(|p| p.name).collect();

  let narrative = match bounded(settings.call_timeout(), caps.narrator.narrate(&transcript(history), &grounding)).await {
    Ok(n) if !n.trim().is_empty() => Some(n.trim().to_string()),
    Ok(_) => {
      warn!(target: "assessment", "Narrator returned empty text; report degrades to summary");
      None
    }
    Err(e) => {
      error!(target: "assessment", error = %e, "Narrative generation failed; report degrades to summary");
      None
    }
  };

  if let Some(n) = &narrative {
    text.push_str(&format!("\n\nDetailed Analysis:\n{}", n));
  }

  info!(target: "assessment", %primary, confidence = evidence.confidence, sources = sources.len(), narrated = narrative.is_some(), "Report finalized");
  Report {
    primary: Some(primary),
    confidence: evidence.confidence,
    questions_answered: history.len(),
    breakdown,
    sources,
    narrative,
    text,
  }
}
