//! Offline capabilities used when OPENAI_API_KEY is not set: the built-in
//! question bank, a rule-based choice matcher, a templated narrator and a
//! feature-hashing embedder.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::capabilities::{
  CapabilityError, ChoiceDisambiguator, Embedder, Narrator, QuestionContext, QuestionSource,
  RawQuestion,
};
use crate::domain::QuestionPreference;
use crate::seeds::{intelligence_note, seed_bank, SeedItem, AGREEMENT_OPTIONS};

/// Dimension of `HashingEmbedder` vectors.
pub const HASH_DIM: usize = 256;

/// Serves bank statements that have not been asked yet in this session.
pub struct LocalQuestionBank;

fn seed_prompt(item: &SeedItem, preference: QuestionPreference) -> &'static str {
  match preference {
    QuestionPreference::MultipleChoice => item.statement,
    QuestionPreference::Textual => item.open_prompt,
  }
}

#[async_trait]
impl QuestionSource for LocalQuestionBank {
  async fn generate_question(&self, ctx: &QuestionContext<'_>) -> Result<RawQuestion, CapabilityError> {
    let unasked: Vec<&SeedItem> = seed_bank()
      .iter()
      .filter(|item| {
        let prompt = seed_prompt(item, ctx.preference);
        !ctx.history.iter().any(|r| r.question == prompt)
      })
      .collect();
    let item = unasked
      .choose(&mut rand::thread_rng())
      .copied()
      .ok_or_else(|| CapabilityError::Unavailable("seed bank exhausted".into()))?;

    let (kind, options) = match ctx.preference {
      QuestionPreference::MultipleChoice => (
        "mcq",
        Some(AGREEMENT_OPTIONS.iter().map(|o| o.to_string()).collect()),
      ),
      QuestionPreference::Textual => ("textual", None),
    };
    Ok(RawQuestion {
      question: Some(seed_prompt(item, ctx.preference).to_string()),
      kind: Some(kind.into()),
      options,
      intelligence_indicators: Some(item.indicators.iter().map(|t| t.to_string()).collect()),
      rationale: Some(format!("Built-in statement probing {} intelligence.", item.intelligence())),
    })
  }
}

/// Case-insensitive and synonym matching for spoken answers.
pub struct LocalChoiceMatcher;

const AFFIRMATIVE: &[&str] = &["yes", "yeah", "yep", "sure", "agree", "definitely", "absolutely", "of course"];
const NEGATIVE: &[&str] = &["no", "nah", "nope", "disagree", "never", "not really"];

fn normalize(s: &str) -> String {
  s.trim()
    .trim_end_matches(['.', '!', '?'])
    .to_lowercase()
}

fn match_choice(options: &[String], answer: &str) -> Option<String> {
  let a = normalize(answer);
  if a.is_empty() {
    return None;
  }

  if let Some(o) = options.iter().find(|o| normalize(o) == a) {
    return Some(o.clone());
  }

  // Exactly one option mentioned inside the answer ("I'd say slightly agree").
  let mentioned: Vec<&String> = options.iter().filter(|o| a.contains(&normalize(o))).collect();
  if mentioned.len() == 1 {
    return Some(mentioned[0].clone());
  }

  let polarity = |words: &[&str], text: &str| words.iter().any(|w| text == *w || text.starts_with(&format!("{w} ")));
  let want_yes = polarity(AFFIRMATIVE, &a);
  let want_no = polarity(NEGATIVE, &a);
  if want_yes == want_no {
    return None;
  }
  let words = if want_yes { AFFIRMATIVE } else { NEGATIVE };
  let hits: Vec<&String> = options.iter().filter(|o| polarity(words, &normalize(o))).collect();
  match hits.as_slice() {
    [only] => Some((*only).clone()),
    _ => None,
  }
}

#[async_trait]
impl ChoiceDisambiguator for LocalChoiceMatcher {
  async fn disambiguate(&self, _question: &str, options: &[String], answer: &str) -> Result<String, CapabilityError> {
    match_choice(options, answer).ok_or_else(|| CapabilityError::Unavailable("no confident local match".into()))
  }
}

/// Templated elaboration built from the transcript's indicator lines.
pub struct LocalNarrator;

fn leading_indicators(transcript: &str) -> Vec<String> {
  let mut counts: Vec<(String, usize)> = Vec::new();
  for line in transcript.lines() {
    if let Some(rest) = line.strip_prefix("Intelligence Indicators:") {
      for tag in rest.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match counts.iter_mut().find(|(t, _)| t == tag) {
          Some((_, n)) => *n += 1,
          None => counts.push((tag.to_string(), 1)),
        }
      }
    }
  }
  counts.sort_by(|a, b| b.1.cmp(&a.1));
  counts.into_iter().map(|(t, _)| t).collect()
}

#[async_trait]
impl Narrator for LocalNarrator {
  async fn narrate(&self, transcript: &str, grounding: &str) -> Result<String, CapabilityError> {
    let leading = leading_indicators(transcript);
    let primary = leading
      .first()
      .ok_or_else(|| CapabilityError::Unavailable("transcript has no indicators".into()))?;

    let mut out = format!("Your answers point most strongly to {} intelligence.", primary);
    if let Some(note) = intelligence_note(primary) {
      out.push(' ');
      out.push_str(note);
    }
    if let Some(secondary) = leading.get(1) {
      out.push_str(&format!("\n\nYour {} side shows up as well", secondary));
      match intelligence_note(secondary) {
        Some(note) => out.push_str(&format!(": {}", note)),
        None => out.push('.'),
      }
    }

    let sources: Vec<&str> = grounding
      .lines()
      .filter_map(|l| l.strip_prefix("From ").and_then(|r| r.strip_suffix(':')))
      .collect();
    if !sources.is_empty() {
      out.push_str(&format!("\n\nFurther reading: {}.", sources.join(", ")));
    }
    Ok(out)
  }
}

/// Bag-of-words feature hashing into `HASH_DIM` buckets, L2-normalised.
/// Deterministic, so documents and queries share one space.
pub struct HashingEmbedder;

fn fnv1a(token: &str) -> u64 {
  let mut h: u64 = 0xcbf29ce484222325;
  for b in token.bytes() {
    h ^= b as u64;
    h = h.wrapping_mul(0x100000001b3);
  }
  h
}

pub fn hash_embed(text: &str) -> Vec<f32> {
  let mut v = vec![0.0f32; HASH_DIM];
  for token in text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| t.chars().count() > 2)
  {
    let token = token.to_lowercase();
    v[(fnv1a(&token) % HASH_DIM as u64) as usize] += 1.0;
  }
  let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm > 0.0 {
    v.iter_mut().for_each(|x| *x /= norm);
  }
  v
}

#[async_trait]
impl Embedder for HashingEmbedder {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
    Ok(hash_embed(text))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AnswerRecord, Question, UserProfile};
  use crate::retrieval::cosine_similarity;

  fn opts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn bank_serves_preferred_kind_without_repeats() {
    let profile = UserProfile::default();
    let mut history: Vec<AnswerRecord> = Vec::new();
    for _ in 0..seed_bank().len() {
      let ctx = QuestionContext {
        profile: &profile,
        preference: QuestionPreference::MultipleChoice,
        history: &history,
        documents: &[],
      };
      let q = Question::try_from(LocalQuestionBank.generate_question(&ctx).await.unwrap()).unwrap();
      assert_eq!(q.options.len(), AGREEMENT_OPTIONS.len());
      assert!(!history.iter().any(|r| r.question == q.prompt));
      history.push(AnswerRecord { question: q.prompt, answer: "Mostly agree".into(), indicators: q.indicators });
    }

    let ctx = QuestionContext {
      profile: &profile,
      preference: QuestionPreference::MultipleChoice,
      history: &history,
      documents: &[],
    };
    assert!(LocalQuestionBank.generate_question(&ctx).await.is_err());
  }

  #[test]
  fn matcher_handles_case_mentions_and_synonyms() {
    let yn = opts(&["Yes", "No", "Maybe"]);
    assert_eq!(match_choice(&yn, "yes."), Some("Yes".into()));
    assert_eq!(match_choice(&yn, "nah"), Some("No".into()));
    assert_eq!(match_choice(&yn, "yeah I think so"), Some("Yes".into()));
    assert_eq!(match_choice(&yn, "purple"), None);

    let scale = opts(&AGREEMENT_OPTIONS);
    assert_eq!(match_choice(&scale, "I'd say slightly agree"), Some("Slightly agree".into()));
    assert_eq!(match_choice(&scale, "mostly disagree!"), Some("Mostly disagree".into()));
  }

  #[tokio::test]
  async fn narrator_names_leading_intelligence_and_sources() {
    let transcript = "Question 1: a\nAnswer: b\nIntelligence Indicators: musical, logical\n\n\
Question 2: c\nAnswer: d\nIntelligence Indicators: musical\n\n";
    let grounding = "From gardner.txt:\nSeven...\n\n";
    let text = LocalNarrator.narrate(transcript, grounding).await.unwrap();
    assert!(text.starts_with("Your answers point most strongly to musical intelligence."));
    assert!(text.contains("Your logical side"));
    assert!(text.ends_with("Further reading: gardner.txt."));
  }

  #[test]
  fn hashing_embedder_is_deterministic_and_normalised() {
    let a = hash_embed("Musical intelligence and rhythm");
    let b = hash_embed("musical INTELLIGENCE and rhythm!");
    assert_eq!(a.len(), HASH_DIM);
    assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
    assert!(hash_embed("").iter().all(|x| *x == 0.0));
  }
}
