//! Distance-to-score fusion.
use std::collections::{HashMap, HashSet};

use polrag_core::{Candidate, ChunkId, PolicyChunk, RetrievalResult};

/// `1 / (1 + d)`: strictly decreasing in `d`, equal to 1 only at `d = 0`,
/// positive for every input. Negative distances (rounding noise) count as an
/// exact match. NaN and infinity count as the largest representable distance.
pub fn distance_to_score(distance: f32) -> f64 {
    let d = if distance.is_nan() || distance.is_infinite() {
        f64::from(f32::MAX)
    } else if distance < 0.0 {
        0.0
    } else {
        f64::from(distance)
    };
    1.0 / (1.0 + d)
}

/// Join candidates with their resolved records, keeping candidate order.
///
/// Candidates missing from `resolved` (orphans, or rows the filters removed)
/// are dropped. A repeated id keeps its first, closest occurrence.
pub fn fuse(candidates: &[Candidate], resolved: &HashMap<ChunkId, PolicyChunk>) -> Vec<RetrievalResult> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .filter(|c| seen.insert(c.id.as_str()))
        .filter_map(|c| resolved.get(&c.id).map(|chunk| RetrievalResult::from_chunk(chunk, distance_to_score(c.distance))))
        .collect()
}
