use std::cmp::Ordering;

use polrag_core::RetrievalResult;

/// Additive boost for leaf sections, applied before the final sort.
///
/// The boost is bounded: a leaf beats a general section within `boost` of its
/// score, but not one further ahead. Equal keys keep their incoming order.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyReranker {
    boost: f64,
}

impl HierarchyReranker {
    pub fn new(boost: f64) -> Self { Self { boost } }

    pub fn rerank_key(&self, result: &RetrievalResult, prefer_specific: bool) -> f64 {
        if prefer_specific && result.policy_section_level.is_leaf() { result.score + self.boost } else { result.score }
    }

    /// Stable descending sort by rerank key. `score` fields are not modified.
    pub fn rerank(&self, mut results: Vec<RetrievalResult>, prefer_specific: bool) -> Vec<RetrievalResult> {
        results.sort_by(|a, b| self.compare(a, b, prefer_specific));
        results
    }

    fn compare(&self, a: &RetrievalResult, b: &RetrievalResult, prefer_specific: bool) -> Ordering {
        self.rerank_key(b, prefer_specific).total_cmp(&self.rerank_key(a, prefer_specific))
    }
}

impl Default for HierarchyReranker {
    fn default() -> Self { Self::new(0.1) }
}
