//! Seed data: the fallback question and a small built-in bank of
//! Gardner-style statements that keeps the app usable without OpenAI.

use crate::domain::{Question, QuestionKind};

/// Agreement scale used by the multiple-choice form of seed statements.
pub const AGREEMENT_OPTIONS: [&str; 4] = [
  "Mostly agree",
  "Slightly agree",
  "Slightly disagree",
  "Mostly disagree",
];

/// One bank entry: a statement for the agreement-scale form, an open prompt
/// for the textual form, and the tags it probes. The first tag is the
/// intelligence; the rest are related traits, so one answer never carries
/// more than a third of the evidence on its own.
pub struct SeedItem {
  pub statement: &'static str,
  pub open_prompt: &'static str,
  pub indicators: &'static [&'static str],
}

impl SeedItem {
  pub fn intelligence(&self) -> &'static str {
    self.indicators[0]
  }
}

/// Substituted whenever generation fails or returns something unusable.
pub fn fallback_question() -> Question {
  Question {
    prompt: "What problem-solving approach do you typically use?".into(),
    kind: QuestionKind::Textual,
    options: Vec::new(),
    indicators: vec!["analytical".into(), "strategic".into()],
    rationale: "Assesses methodical thinking and problem-solving skills".into(),
  }
}

pub fn seed_bank() -> &'static [SeedItem] {
  SEED_BANK
}

const SEED_BANK: &[SeedItem] = &[
  SeedItem {
    statement: "I enjoy crosswords, word searches or other word puzzles.",
    open_prompt: "What kind of reading or writing do you enjoy most, and why?",
    indicators: &["linguistic", "wordplay", "analytical"],
  },
  SeedItem {
    statement: "I find it easy to remember quotes or phrases.",
    open_prompt: "Is there a quote or phrase that has stuck with you? What makes it memorable?",
    indicators: &["linguistic", "verbal-memory", "reflective"],
  },
  SeedItem {
    statement: "I enjoy logic puzzles such as sudoku.",
    open_prompt: "How do you usually go about solving a tricky puzzle?",
    indicators: &["logical-mathematical", "analytical", "strategic"],
  },
  SeedItem {
    statement: "I find mental arithmetic easy.",
    open_prompt: "When you split a bill with friends, how do you work out who owes what?",
    indicators: &["logical-mathematical", "numerical", "analytical"],
  },
  SeedItem {
    statement: "I can read a map easily.",
    open_prompt: "How do you find your way around a place you have never been before?",
    indicators: &["spatial", "navigation", "strategic"],
  },
  SeedItem {
    statement: "I often see clear images when I close my eyes.",
    open_prompt: "When you imagine your ideal room, what do you picture?",
    indicators: &["spatial", "visual", "creative"],
  },
  SeedItem {
    statement: "I play a sport or dance.",
    open_prompt: "What physical activity makes you feel most like yourself?",
    indicators: &["bodily-kinesthetic", "coordination", "rhythmic"],
  },
  SeedItem {
    statement: "I enjoy and am good at making things with my hands.",
    open_prompt: "Tell me about something you built or fixed with your hands.",
    indicators: &["bodily-kinesthetic", "hands-on", "creative"],
  },
  SeedItem {
    statement: "I often have a song or piece of music in my head.",
    open_prompt: "What role does music play in your day?",
    indicators: &["musical", "melodic", "verbal-memory"],
  },
  SeedItem {
    statement: "I can identify most sounds without seeing what causes them.",
    open_prompt: "Which sounds around you do you notice that others seem to miss?",
    indicators: &["musical", "auditory", "naturalist-observation"],
  },
  SeedItem {
    statement: "I am good at solving disputes between others.",
    open_prompt: "How do you help when two friends disagree?",
    indicators: &["interpersonal", "empathy", "strategic"],
  },
  SeedItem {
    statement: "I find it easy to talk to new people.",
    open_prompt: "What do you enjoy about meeting new people?",
    indicators: &["interpersonal", "social", "verbal"],
  },
  SeedItem {
    statement: "I set myself goals and plans for the future.",
    open_prompt: "What is a personal goal you are working towards right now?",
    indicators: &["intrapersonal", "self-direction", "strategic"],
  },
  SeedItem {
    statement: "I am happy spending time alone.",
    open_prompt: "How do you like to spend time on your own?",
    indicators: &["intrapersonal", "reflective", "independent"],
  },
  SeedItem {
    statement: "I notice the plants, animals and weather around me.",
    open_prompt: "What do you notice first when you spend time outdoors?",
    indicators: &["naturalistic", "naturalist-observation", "visual"],
  },
];

/// Short profile notes per intelligence, used by the offline narrator.
pub fn intelligence_note(tag: &str) -> Option<&'static str> {
  let note = match tag {
    "linguistic" | "verbal" | "verbal-linguistic" =>
      "You think in words: reading, writing, telling stories and playing with language come naturally, and books, discussions and debates help you learn.",
    "logical-mathematical" | "logical" | "mathematical" | "analytical" =>
      "You think by reasoning: experimenting, questioning, figuring out puzzles and calculating. Things to explore and think about keep you engaged.",
    "spatial" | "visual" | "visual-spatial" =>
      "You think in images and pictures: designing, drawing and visualising. Art, building sets, maps, mazes and illustrated material suit you.",
    "bodily-kinesthetic" | "kinesthetic" | "bodily" =>
      "You think through physical sensation: moving, building, touching and gesturing. Hands-on learning, sport and drama bring out your best.",
    "musical" | "rhythmic" =>
      "You think in rhythms and melodies: singing, humming, tapping and listening. Music around you helps you focus and remember.",
    "interpersonal" | "social" =>
      "You think by bouncing ideas off other people: leading, organising, relating and mediating. Group work, clubs and mentors energise you.",
    "intrapersonal" | "reflective" =>
      "You think deep inside yourself: setting goals, reflecting and dreaming. Time alone, self-paced projects and real choices suit you.",
    "naturalistic" | "naturalist" =>
      "You notice patterns in the natural world: plants, animals and weather. Time outdoors and classifying what you observe feed your curiosity.",
    "strategic" | "creative" =>
      "You look for approaches before acting, weighing options and inventing new paths when the usual ones do not fit.",
    _ => return None,
  };
  Some(note)
}
