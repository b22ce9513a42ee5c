//! Knowledge base + top-k semantic retrieval.
//!
//! The knowledge base is built once at startup from plain-text documents in a
//! directory, each embedded with the shared `Embedder`. After that it is
//! read-only and shared between sessions behind an `Arc` without locking.
//!
//! Ranking is cosine similarity between the query embedding and each document
//! embedding. Degenerate vectors score 0 so the ranking stays total, and ties
//! keep knowledge base order (stable sort).

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::capabilities::{CapabilityError, Embedder};
use crate::domain::KnowledgeDocument;
use crate::util::take_chars;

/// Extensions picked up by `KnowledgeBase::load_dir`. Text extraction from
/// other formats happens before documents land in the directory.
const DOC_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Error)]
pub enum KnowledgeError {
  #[error("failed to read {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
}

/// One ranked hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievedPassage {
  pub name: String,
  pub preview: String,
  pub similarity: f32,
}

/// Name -> (text, embedding), iterated in insertion order.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
  docs: Vec<KnowledgeDocument>,
}

impl KnowledgeBase {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a document; a document with the same name is replaced in place.
  pub fn insert(&mut self, doc: KnowledgeDocument) {
    match self.docs.iter_mut().find(|d| d.name == doc.name) {
      Some(existing) => *existing = doc,
      None => self.docs.push(doc),
    }
  }

  pub fn len(&self) -> usize {
    self.docs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.docs.is_empty()
  }

  pub fn names(&self) -> Vec<String> {
    self.docs.iter().map(|d| d.name.clone()).collect()
  }

  /// Rank documents against an already-embedded query. Best first, at most `k`.
  pub fn rank(&self, query: &[f32], k: usize, preview_chars: usize) -> Vec<RetrievedPassage> {
    let mut scored: Vec<(usize, f32)> = self
      .docs
      .iter()
      .enumerate()
      .map(|(i, d)| (i, cosine_similarity(query, &d.embedding)))
      .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
      .into_iter()
      .take(k)
      .map(|(i, similarity)| {
        let doc = &self.docs[i];
        RetrievedPassage {
          name: doc.name.clone(),
          preview: preview(&doc.text, preview_chars),
          similarity,
        }
      })
      .collect()
  }

  /// Embed `query` and rank. An empty knowledge base short-circuits without
  /// calling the embedder.
  #[instrument(level = "info", skip(self, embedder, query), fields(docs = self.docs.len(), k, query_len = query.len()))]
  pub async fn retrieve(
    &self,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
    preview_chars: usize,
  ) -> Result<Vec<RetrievedPassage>, CapabilityError> {
    if self.is_empty() || k == 0 {
      return Ok(Vec::new());
    }
    let q = embedder.embed(query).await?;
    Ok(self.rank(&q, k, preview_chars))
  }

  /// Build the knowledge base from every `.txt` / `.md` file in `dir`, in
  /// file-name order. A missing directory yields an empty knowledge base; a
  /// document whose embedding fails is skipped with an error log.
  #[instrument(level = "info", skip(embedder), fields(dir = %dir.display()))]
  pub async fn load_dir(dir: &Path, embedder: &dyn Embedder) -> Result<Self, KnowledgeError> {
    let mut kb = KnowledgeBase::new();
    if !dir.is_dir() {
      warn!(target: "explorer_backend", dir = %dir.display(), "Docs directory not found; knowledge base is empty");
      return Ok(kb);
    }

    let io_err = |source| KnowledgeError::Io { path: dir.to_path_buf(), source };
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
      let path = entry.path();
      let wanted = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| DOC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if wanted && path.is_file() {
        paths.push(path);
      }
    }
    paths.sort();

    for path in paths {
      let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_string(),
        None => continue,
      };
      let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| KnowledgeError::Io { path: path.clone(), source })?;
      match embedder.embed(&text).await {
        Ok(embedding) => kb.insert(KnowledgeDocument { name, text, embedding }),
        Err(e) => {
          tracing::error!(target: "explorer_backend", doc = %name, error = %e, "Embedding failed; skipping document");
        }
      }
    }

    info!(target: "explorer_backend", documents = kb.len(), "Processed knowledge documents");
    Ok(kb)
  }
}

/// Cosine similarity. 0 for mismatched lengths, zero magnitudes or non-finite results.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }

  let mut dot = 0.0f32;
  let mut mag_a = 0.0f32;
  let mut mag_b = 0.0f32;

  for (x, y) in a.iter().zip(b.iter()) {
    dot += x * y;
    mag_a += x * x;
    mag_b += y * y;
  }

  let denom = mag_a.sqrt() * mag_b.sqrt();
  if denom == 0.0 {
    return 0.0;
  }
  let sim = dot / denom;
  if sim.is_finite() { sim } else { 0.0 }
}

/// First `max_chars` characters followed by an ellipsis marker.
pub fn preview(text: &str, max_chars: usize) -> String {
  format!("{}...", take_chars(text, max_chars))
}

/// Grounding context handed to the narrator.
pub fn render_context(passages: &[RetrievedPassage]) -> String {
  let mut out = String::new();
  for p in passages {
    out.push_str(&format!("From {}:\n{}\n\n", p.name, p.preview));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::FixedEmbedder;

  fn doc(name: &str, text: &str, embedding: Vec<f32>) -> KnowledgeDocument {
    KnowledgeDocument { name: name.into(), text: text.into(), embedding }
  }

  #[test]
  fn cosine_handles_degenerate_vectors() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
  }

  #[test]
  fn rank_is_best_first_and_capped() {
    let mut kb = KnowledgeBase::new();
    kb.insert(doc("far", "far text", vec![0.0, 1.0]));
    kb.insert(doc("near", "near text", vec![1.0, 0.1]));
    kb.insert(doc("mid", "mid text", vec![1.0, 1.0]));
    kb.insert(doc("zero", "zero text", vec![0.0, 0.0]));

    let hits = kb.rank(&[1.0, 0.0], 3, 500);
    let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["near", "mid", "far"]);
    for pair in hits.windows(2) {
      assert!(pair[0].similarity >= pair[1].similarity);
    }
  }

  #[test]
  fn ties_keep_insertion_order() {
    let mut kb = KnowledgeBase::new();
    kb.insert(doc("b", "", vec![1.0, 0.0]));
    kb.insert(doc("a", "", vec![2.0, 0.0]));
    kb.insert(doc("c", "", vec![0.0, 0.0]));
    kb.insert(doc("d", "", vec![0.0, 0.0]));
    let names: Vec<String> = kb.rank(&[1.0, 0.0], 10, 10).into_iter().map(|h| h.name).collect();
    assert_eq!(names, vec!["b", "a", "c", "d"]);
  }

  #[test]
  fn insert_replaces_same_name() {
    let mut kb = KnowledgeBase::new();
    kb.insert(doc("x", "old", vec![1.0]));
    kb.insert(doc("y", "other", vec![1.0]));
    kb.insert(doc("x", "new", vec![1.0]));
    assert_eq!(kb.len(), 2);
    assert_eq!(kb.names(), vec!["x".to_string(), "y".to_string()]);
    assert_eq!(kb.rank(&[1.0], 1, 10)[0].preview, "new...");
  }

  #[test]
  fn preview_is_first_chars_plus_ellipsis() {
    let long = "x".repeat(600);
    let p = preview(&long, 500);
    assert_eq!(p.len(), 503);
    assert!(p.ends_with("..."));
    assert_eq!(preview("short", 500), "short...");
  }

  #[test]
  fn render_context_lists_sources() {
    let ctx = render_context(&[RetrievedPassage {
      name: "gardner.txt".into(),
      preview: "Seven intelligences...".into(),
      similarity: 0.9,
    }]);
    assert_eq!(ctx, "From gardner.txt:\nSeven intelligences...\n\n");
  }

  #[tokio::test]
  async fn empty_knowledge_base_returns_nothing() {
    let kb = KnowledgeBase::new();
    let embedder = FixedEmbedder::failing();
    let hits = kb.retrieve(&embedder, "anything", 5, 500).await.unwrap();
    assert!(hits.is_empty());
  }

  #[tokio::test]
  async fn load_dir_reads_text_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.md"), "beta").unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

    let embedder = FixedEmbedder::new(vec![1.0, 0.0]);
    let kb = KnowledgeBase::load_dir(dir.path(), &embedder).await.unwrap();
    assert_eq!(kb.names(), vec!["a.txt".to_string(), "b.md".to_string()]);
  }

  #[tokio::test]
  async fn load_dir_missing_directory_is_empty() {
    let embedder = FixedEmbedder::new(vec![1.0]);
    let kb = KnowledgeBase::load_dir(Path::new("/definitely/not/here"), &embedder).await.unwrap();
    assert!(kb.is_empty());
  }

  #[tokio::test]
  async fn load_dir_skips_documents_that_fail_to_embed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    let kb = KnowledgeBase::load_dir(dir.path(), &FixedEmbedder::failing()).await.unwrap();
    assert!(kb.is_empty());
  }
}
