//! Local knowledge base — keyword retrieval over a directory of documents.
//!
//! Each `.md` or `.txt` file is split into paragraph passages at blank
//! lines. A passage's score is the fraction of distinct query terms it
//! contains, so ranking stays stable regardless of document length.

use admitline_core::error::RetrievalError;
use admitline_core::retrieval::{Passage, RetrievalGateway, ScopeFilter};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "what", "which", "when", "where", "how", "who", "with",
    "can", "will", "does", "about", "there", "this", "that", "from", "you", "your", "have",
    "tell", "please", "any", "is", "in", "of", "to", "a", "an", "me", "my", "i",
];

/// Lower-cased content terms of at least two characters, minus stopwords.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

struct IndexedPassage {
    passage: Passage,
    terms: HashSet<String>,
}

/// Keyword retrieval over local documents.
pub struct LocalKnowledgeBase {
    passages: Vec<IndexedPassage>,
}

impl LocalKnowledgeBase {
    /// Build from `(source_label, text)` pairs.
    pub fn from_documents<I, S, T>(documents: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        let mut passages = Vec::new();
        for (label, text) in documents {
            let label = label.into();
            for paragraph in text.as_ref().split("\n\n") {
                let content = paragraph.trim();
                if content.is_empty() {
                    continue;
                }
                passages.push(IndexedPassage {
                    terms: terms(content),
                    passage: Passage::new(content, label.clone()),
                });
            }
        }
        Self { passages }
    }

    /// Load every `.md` and `.txt` file in `dir` (non-recursive).
    pub fn load_dir(dir: &Path) -> Result<Self, RetrievalError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RetrievalError::Unavailable(format!("{}: {e}", dir.display())))?;

        let mut documents = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_doc = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"));
            if !is_doc {
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|e| RetrievalError::Unavailable(format!("{}: {e}", path.display())))?;
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            documents.push((label, text));
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));

        let kb = Self::from_documents(documents);
        info!(dir = %dir.display(), passages = kb.len(), "Knowledge base loaded");
        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait]
impl RetrievalGateway for LocalKnowledgeBase {
    fn name(&self) -> &str {
        "local"
    }

    async fn query(&self, text: &str, scope: &ScopeFilter) -> Result<Vec<Passage>, RetrievalError> {
        let query_terms = terms(text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Passage> = self
            .passages
            .iter()
            .filter_map(|p| {
                let hits = query_terms.intersection(&p.terms).count();
                (hits > 0).then(|| {
                    let mut passage = p.passage.clone();
                    passage.score = hits as f32 / query_terms.len() as f32;
                    passage
                })
            })
            .collect();

        // Stable sort keeps document order among equal scores
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(scope.top_k.max(1));
        debug!(query_terms = query_terms.len(), hits = results.len(), "Local retrieval");
        Ok(results)
    }
}
