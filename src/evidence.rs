//! Evidence aggregation: indicator tags from the conversation history are
//! counted into a tally, and the share of the leading tag is the confidence.
//!
//! Everything here is pure and recomputed from the history on demand.
//!
//! Ordering rule: tags are kept in first-seen order across the history. When
//! several tags share the maximum count, the first one in that order wins, and
//! the ranked breakdown keeps that order among equal counts.

use serde::Serialize;

use crate::domain::AnswerRecord;

/// Tag -> count, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorTally {
  entries: Vec<(String, usize)>,
}

/// One line of the report breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndicatorShare {
  pub indicator: String,
  pub count: usize,
  pub percentage: f64,
}

/// Result of one aggregation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evidence {
  pub tally: IndicatorTally,
  pub confidence: f64,
}

impl IndicatorTally {
  pub fn from_history(history: &[AnswerRecord]) -> Self {
    let mut tally = IndicatorTally::default();
    for record in history {
      for tag in &record.indicators {
        tally.bump(tag);
      }
    }
    tally
  }

  fn bump(&mut self, tag: &str) {
    match self.entries.iter_mut().find(|(t, _)| t == tag) {
      Some((_, n)) => *n += 1,
      None => self.entries.push((tag.to_string(), 1)),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn total(&self) -> usize {
    self.entries.iter().map(|(_, n)| n).sum()
  }

  #[cfg(test)]
  pub fn get(&self, tag: &str) -> usize {
    self.entries.iter().find(|(t, _)| t == tag).map(|(_, n)| *n).unwrap_or(0)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.entries.iter().map(|(t, n)| (t.as_str(), *n))
  }

  /// Leading tag; the first to reach the maximum count on ties.
  pub fn primary(&self) -> Option<(&str, usize)> {
    let mut best: Option<(&str, usize)> = None;
    for (tag, n) in self.iter() {
      match best {
        Some((_, m)) if n <= m => {}
        _ => best = Some((tag, n)),
      }
    }
    best
  }

  /// max / total, or 0 when nothing has been recorded.
  pub fn confidence(&self) -> f64 {
    let total = self.total();
    match self.primary() {
      Some((_, max)) if total > 0 => max as f64 / total as f64,
      _ => 0.0,
    }
  }

  /// Tags sorted by descending count with their share of the total (0..=100).
  pub fn ranked(&self) -> Vec<IndicatorShare> {
    if self.is_empty() {
      return Vec::new();
    }
    let total = self.total();
    let mut shares: Vec<IndicatorShare> = self
      .iter()
      .map(|(tag, n)| IndicatorShare {
        indicator: tag.to_string(),
        count: n,
        percentage: n as f64 / total as f64 * 100.0,
      })
      .collect();
    // sort_by is stable: equal counts keep first-seen order.
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
  }
}

/// Tally the history and compute the confidence of the leading tag.
pub fn aggregate(history: &[AnswerRecord]) -> Evidence {
  let tally = IndicatorTally::from_history(history);
  let confidence = tally.confidence();
  Evidence { tally, confidence }
}
