use crate::tokenizer::Lexer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Term occurrence counts for one document.
pub type TermFreq = HashMap<String, usize>;

/// Number of distinct documents containing each term.
pub type DocFreq = HashMap<String, usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub tf: TermFreq,
    /// Total number of tokens; always the sum of `tf` values.
    pub count: usize,
    pub last_modified: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub docs_count: usize,
    pub terms_count: usize,
}

/// In-memory inverted index keyed by document path.
///
/// Mutated only through [`Index::add_document`] and [`Index::remove_document`],
/// which keep `df` consistent with the per-document term maps.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Index {
    pub(crate) docs: HashMap<String, Document>,
    pub(crate) df: DocFreq,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `path` is unknown or was indexed from an older revision.
    pub fn requires_reindexing(&self, path: &str, last_modified: OffsetDateTime) -> bool {
        match self.docs.get(path) {
            Some(doc) => doc.last_modified < last_modified,
            None => true,
        }
    }

    /// Index `content` under `path`, replacing whatever was stored there.
    pub fn add_document(&mut self, path: &str, last_modified: OffsetDateTime, content: &str) {
        self.remove_document(path);

        let mut tf = TermFreq::new();
        let mut count = 0;
        for term in Lexer::new(content) {
            *tf.entry(term).or_insert(0) += 1;
            count += 1;
        }

        for term in tf.keys() {
            *self.df.entry(term.clone()).or_insert(0) += 1;
        }

        tracing::debug!(path, tokens = count, terms = tf.len(), "document indexed");
        self.docs.insert(path.to_string(), Document { tf, count, last_modified });
    }

    /// Drop `path` and retract its document-frequency contributions.
    /// Returns false when nothing was stored under `path`.
    pub fn remove_document(&mut self, path: &str) -> bool {
        let Some(doc) = self.docs.remove(path) else {
            return false;
        };
        for term in doc.tf.keys() {
            if let Some(n) = self.df.get_mut(term) {
                *n -= 1;
                if *n == 0 {
                    self.df.remove(term);
                }
            }
        }
        tracing::debug!(path, "document removed");
        true
    }

    /// Remove every document whose path fails `keep`. Returns how many went.
    pub fn retain_paths<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let doomed: Vec<String> = self.docs.keys().filter(|p| !keep(p.as_str())).cloned().collect();
        for path in &doomed {
            self.remove_document(path);
        }
        doomed.len()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats { docs_count: self.docs.len(), terms_count: self.df.len() }
    }

    pub fn document(&self, path: &str) -> Option<&Document> {
        self.docs.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    /// Documents containing `term`; 0 for unseen terms.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.df.get(term).copied().unwrap_or(0)
    }

    pub fn doc_freq(&self) -> &DocFreq {
        &self.df
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Verify the token-count and document-frequency invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut expected = DocFreq::new();
        for (path, doc) in &self.docs {
            let sum: usize = doc.tf.values().sum();
            if sum != doc.count {
                return Err(format!("{path}: term counts sum to {sum}, count is {}", doc.count));
            }
            for (term, &n) in &doc.tf {
                if n == 0 {
                    return Err(format!("{path}: zero count stored for {term:?}"));
                }
                *expected.entry(term.clone()).or_insert(0) += 1;
            }
        }
        if let Some((term, n)) = self.df.iter().find(|(_, n)| **n == 0) {
            return Err(format!("zero document frequency kept for {term:?} ({n})"));
        }
        if expected != self.df {
            return Err("document frequencies disagree with document term maps".to_string());
        }
        Ok(())
    }
}
