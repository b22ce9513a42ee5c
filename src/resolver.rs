//! Reconcile a free-form answer (typed or voice-transcribed) with the option
//! set of a multiple-choice question.
//!
//! Order: exact option, then a 1-based option number, then the disambiguation
//! capability. Option numbers are only honoured when no option is itself a
//! number, otherwise "3" could mean the option "3" or the third option.
//! A blank answer, a disambiguation reply that is not an option, an error or a
//! timeout all resolve to the first option. The first-option fallback is a
//! precision loss and is logged as a warning.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::capabilities::{bounded, ChoiceDisambiguator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionMethod {
  Exact,
  OptionNumber,
  Disambiguated,
  FirstOptionFallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
  pub answer: String,
  pub method: ResolutionMethod,
}

fn is_numeric(s: &str) -> bool {
  s.trim().parse::<f64>().is_ok()
}

fn strip_quotes(s: &str) -> &str {
  let t = s.trim();
  for q in ['"', '\'', '`'] {
    if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
      return t[1..t.len() - 1].trim();
    }
  }
  t
}

/// Resolve `answer` to a member of `options`. `options` must be non-empty (a
/// multiple-choice `Question` guarantees it); with no options the trimmed
/// answer is returned as-is.
#[instrument(level = "info", skip_all, fields(options = options.len(), answer_len = answer.len()))]
pub async fn resolve_choice(
  disambiguator: &dyn ChoiceDisambiguator,
  timeout: Duration,
  question: &str,
  options: &[String],
  answer: &str,
) -> Resolution {
  let first = match options.first() {
    Some(first) => first,
    None => {
      return Resolution { answer: answer.trim().to_string(), method: ResolutionMethod::Exact };
    }
  };

  if options.iter().any(|o| o == answer) {
    return Resolution { answer: answer.to_string(), method: ResolutionMethod::Exact };
  }

  if answer.trim().is_empty() {
    warn!(target: "assessment", "Blank answer to a choice question; falling back to first option");
    return Resolution { answer: first.clone(), method: ResolutionMethod::FirstOptionFallback };
  }

  if !options.iter().any(|o| is_numeric(o)) {
    if let Ok(n) = answer.trim().parse::<usize>() {
      if (1..=options.len()).contains(&n) {
        return Resolution { answer: options[n - 1].clone(), method: ResolutionMethod::OptionNumber };
      }
    }
  }

  match bounded(timeout, disambiguator.disambiguate(question, options, answer)).await {
    Ok(reply) => {
      let mapped = strip_quotes(&reply);
      if let Some(opt) = options.iter().find(|o| o.as_str() == mapped) {
        debug!(target: "assessment", "Free-form answer mapped onto an option");
        return Resolution { answer: opt.clone(), method: ResolutionMethod::Disambiguated };
      }
      warn!(target: "assessment", reply_len = reply.len(), "Disambiguation reply is not an option; falling back to first option");
    }
    Err(e) => {
      warn!(target: "assessment", error = %e, "Disambiguation failed; falling back to first option");
    }
  }

  Resolution { answer: first.clone(), method: ResolutionMethod::FirstOptionFallback }
}
