#[path = "../common/mod.rs"]
mod common;

use common::*;
use polrag_core::{ContentType, Region, RetrievalRequest, RetrievalResult, SectionLevel};
use polrag_hybrid::distance_to_score;
use proptest::prelude::*;

const REGIONS: [Region; 4] = [Region::Global, Region::Us, Region::Eu, Region::Uk];
const CONTENT_TYPES: [ContentType; 5] =
    [ContentType::AdText, ContentType::Image, ContentType::Video, ContentType::LandingPage, ContentType::General];

/// (distance, is_leaf, region index, content type index, orphan)
type Row = (f32, bool, usize, usize, bool);

fn corpus() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec((0.0f32..2.0, any::<bool>(), 0..4usize, 0..5usize, prop::bool::weighted(0.1)), 0..40)
}

fn build(rows: &[Row]) -> Harness {
    let mut sorted: Vec<(usize, &Row)> = rows.iter().enumerate().collect();
    sorted.sort_by(|a, b| a.1 .0.total_cmp(&b.1 .0));
    let candidates = sorted.iter().map(|(i, r)| candidate(&format!("c{i}"), r.0)).collect();
    let chunks = sorted.iter().filter(|(_, r)| !r.4).map(|(i, r)| {
        let level = if r.1 { SectionLevel::Minor } else { SectionLevel::Major };
        chunk(&format!("c{i}"), level, REGIONS[r.2], CONTENT_TYPES[r.3])
    });
    harness(ScriptedSource::new(candidates), MapStore::new(chunks.collect::<Vec<_>>()))
}

fn ordering_rule_holds(results: &[RetrievalResult]) -> bool {
    results.iter().enumerate().all(|(i, a)| {
        results[i + 1..].iter().all(|b| a.score >= b.score || (a.policy_section_level.is_leaf() && !b.policy_section_level.is_leaf()))
    })
}

proptest! {
    #[test]
    fn score_is_strictly_decreasing(d in 0.0f32..1000.0, delta in 0.001f32..100.0) {
        prop_assert!(distance_to_score(d) > distance_to_score(d + delta));
    }

    #[test]
    fn score_is_positive_and_at_most_one(d in proptest::num::f32::ANY) {
        let s = distance_to_score(d);
        prop_assert!(s > 0.0 && s <= 1.0, "score {} for distance {}", s, d);
    }

    #[test]
    fn length_never_exceeds_limit(rows in corpus(), limit in -5i64..30) {
        let h = build(&rows);
        let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(limit)).expect("retrieve");
        if limit <= 0 {
            prop_assert!(out.is_empty());
        } else {
            prop_assert!(out.len() as i64 <= limit);
        }
    }

    #[test]
    fn results_satisfy_every_filter(rows in corpus(), region in prop::option::of(0..4usize), ct in prop::option::of(0..5usize)) {
        let h = build(&rows);
        let mut req = RetrievalRequest::new("q").limit(20);
        if let Some(r) = region { req = req.region(REGIONS[r].as_str().to_uppercase()); }
        if let Some(c) = ct { req = req.content_type(CONTENT_TYPES[c].as_str()); }
        let out = h.retriever.retrieve(&req).expect("retrieve");
        for r in &out {
            if let Some(i) = region { prop_assert_eq!(r.region, REGIONS[i]); }
            if let Some(i) = ct { prop_assert_eq!(r.content_type, CONTENT_TYPES[i]); }
        }
    }

    #[test]
    fn order_follows_score_or_leaf_exception(rows in corpus(), prefer in any::<bool>()) {
        let h = build(&rows);
        let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(20).prefer_specific(prefer)).expect("retrieve");
        prop_assert!(ordering_rule_holds(&out));
        if !prefer {
            prop_assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn identical_calls_return_identical_lists(rows in corpus(), limit in 1i64..20) {
        let h = build(&rows);
        let req = RetrievalRequest::new("q").limit(limit);
        let first = h.retriever.retrieve(&req).expect("first");
        let second = h.retriever.retrieve(&req).expect("second");
        prop_assert_eq!(first, second);
    }
}
