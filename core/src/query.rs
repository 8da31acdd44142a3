use crate::index::{Document, Index};
use crate::tokenizer::Lexer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of hits transports return when the caller does not ask otherwise.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Largest result set a transport will hand out in one response.
pub const MAX_RESULT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub rank: f64,
}

fn compute_tf(term: &str, doc: &Document) -> f64 {
    if doc.count == 0 {
        return 0.0;
    }
    doc.tf.get(term).copied().unwrap_or(0) as f64 / doc.count as f64
}

/// log10(N / df), with df floored at 1 so unseen terms still get a weight.
fn compute_idf(term: &str, index: &Index) -> f64 {
    let df = index.document_frequency(term).max(1);
    (index.len() as f64 / df as f64).log10()
}

impl Index {
    /// Rank every document against `query` by summed TF-IDF.
    ///
    /// The whole corpus is returned, best first; equal ranks are ordered by
    /// path. Truncating to a page size is the caller's job.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let weighted: Vec<(String, f64)> = Lexer::new(query)
            .map(|term| {
                let idf = compute_idf(&term, self);
                (term, idf)
            })
            .collect();
        tracing::debug!(terms = ?weighted, "query tokens");

        let mut results: Vec<SearchResult> = self
            .docs
            .iter()
            .filter_map(|(path, doc)| {
                let rank = weighted.iter().fold(0.0, |acc, (term, idf)| acc + compute_tf(term, doc) * idf);
                rank.is_finite().then(|| SearchResult { path: path.clone(), rank })
            })
            .collect();

        results.sort_by(by_rank_then_path);
        tracing::debug!(hits = results.len(), "query ranked");
        results
    }
}

fn by_rank_then_path(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.rank.total_cmp(&a.rank).then_with(|| a.path.cmp(&b.path))
}

/// Clamp a caller supplied page size into `1..=MAX_RESULT_LIMIT`.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_RESULT_LIMIT).clamp(1, MAX_RESULT_LIMIT)
}
