mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use polrag_core::config::RetrievalSettings;
use polrag_core::traits::Embedder;
use polrag_core::{ContentType, Error, Region, RetrievalRequest, SectionLevel};
use polrag_hybrid::HybridRetriever;

fn small_corpus() -> (ScriptedSource, MapStore) {
    let source = ScriptedSource::new(vec![candidate("a", 0.1), candidate("b", 0.2), candidate("c", 0.3)]);
    let store = MapStore::new(vec![
        chunk("a", SectionLevel::Major, Region::Global, ContentType::AdText),
        chunk("b", SectionLevel::Major, Region::Us, ContentType::AdText),
        chunk("c", SectionLevel::Major, Region::Global, ContentType::Video),
    ]);
    (source, store)
}

#[test]
fn non_positive_limit_is_empty_and_does_no_io() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    for limit in [0, -1, i64::MIN] {
        let out = h.retriever.retrieve(&RetrievalRequest::new("alcohol").limit(limit).region("mars")).expect("empty ok");
        assert!(out.is_empty());
    }
    assert_eq!(h.io_calls(), (0, 0, 0));
}

#[test]
fn invalid_filter_fails_before_any_io() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    let err = h.retriever.retrieve(&RetrievalRequest::new("alcohol").region("mars")).unwrap_err();
    assert!(matches!(err, Error::InvalidFilterValue { field: "region", .. }));

    let err = h.retriever.retrieve(&RetrievalRequest::new("alcohol").region("US").content_type("hologram")).unwrap_err();
    assert!(matches!(err, Error::InvalidFilterValue { field: "content_type", .. }));
    assert_eq!(h.io_calls(), (0, 0, 0));
}

#[test]
fn blank_and_mixed_case_filters_are_normalized() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    let out = h.retriever.retrieve(&RetrievalRequest::new("q").region("   ").content_type(" AD_TEXT ")).expect("retrieve");
    assert_eq!(ids(&out), vec!["a", "b"]);
}

#[test]
fn filters_are_enforced_by_the_store() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    let out = h.retriever.retrieve(&RetrievalRequest::new("q").region("global")).expect("retrieve");
    assert_eq!(ids(&out), vec!["a", "c"]);
    assert!(out.iter().all(|r| r.region == Region::Global));

    let none = h.retriever.retrieve(&RetrievalRequest::new("q").region("uk")).expect("retrieve");
    assert!(none.is_empty());
}

#[test]
fn orphan_vectors_are_dropped() {
    let source = ScriptedSource::new(vec![candidate("ghost", 0.01), candidate("a", 0.1)]);
    let store = MapStore::new(vec![chunk("a", SectionLevel::Major, Region::Global, ContentType::AdText)]);
    let h = harness(source, store);
    let out = h.retriever.retrieve(&RetrievalRequest::new("q")).expect("retrieve");
    assert_eq!(ids(&out), vec!["a"]);
}

#[test]
fn overfetch_recovers_matches_beyond_the_first_limit() {
    let source = ScriptedSource::new(vec![
        candidate("us1", 0.05),
        candidate("us2", 0.06),
        candidate("g1", 0.20),
        candidate("g2", 0.30),
        candidate("g3", 0.40),
    ]);
    let store = MapStore::new(vec![
        chunk("us1", SectionLevel::Major, Region::Us, ContentType::General),
        chunk("us2", SectionLevel::Major, Region::Us, ContentType::General),
        chunk("g1", SectionLevel::Major, Region::Global, ContentType::General),
        chunk("g2", SectionLevel::Major, Region::Global, ContentType::General),
        chunk("g3", SectionLevel::Major, Region::Global, ContentType::General),
    ]);
    let h = harness(source, store);
    let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(2).region("global")).expect("retrieve");
    assert_eq!(ids(&out), vec!["g1", "g2"]);
    assert_eq!(h.source.last_k.load(Ordering::SeqCst), 6);
}

#[test]
fn overfetch_is_capped_and_limit_clamped() {
    let settings = RetrievalSettings { max_candidates: 25, ..RetrievalSettings::default() };
    let corpus: Vec<_> = (0..40).map(|i| candidate(&format!("c{i:02}"), i as f32 * 0.01)).collect();
    let chunks: Vec<_> = (0..40).map(|i| chunk(&format!("c{i:02}"), SectionLevel::Major, Region::Global, ContentType::General)).collect();
    let h = harness_with(ScriptedSource::new(corpus), MapStore::new(chunks), settings);

    let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(10)).expect("retrieve");
    assert_eq!(h.source.last_k.load(Ordering::SeqCst), 25);
    assert_eq!(out.len(), 10);

    let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(1_000)).expect("retrieve");
    assert_eq!(out.len(), 20);
    assert_eq!(h.retriever.overfetch_count(20), 25);
}

#[test]
fn leaf_section_wins_when_scores_are_close() {
    let make = |score_a: f64, score_b: f64| {
        let mut cands = vec![candidate("A", distance_for(score_a)), candidate("B", distance_for(score_b))];
        cands.sort_by(|x, y| x.distance.total_cmp(&y.distance));
        let store = MapStore::new(vec![
            chunk("A", SectionLevel::Minor, Region::Global, ContentType::General),
            chunk("B", SectionLevel::Major, Region::Global, ContentType::General),
        ]);
        harness(ScriptedSource::new(cands), store)
    };

    let h = make(0.90, 0.85);
    assert_eq!(ids(&h.retriever.retrieve(&RetrievalRequest::new("alcohol").limit(2)).expect("boost")), vec!["A", "B"]);
    assert_eq!(ids(&h.retriever.retrieve(&RetrievalRequest::new("alcohol").limit(2).prefer_specific(false)).expect("raw")), vec!["A", "B"]);

    let h = make(0.80, 0.82);
    let boosted = h.retriever.retrieve(&RetrievalRequest::new("alcohol").limit(2)).expect("boost");
    assert_eq!(ids(&boosted), vec!["A", "B"]);
    assert!((boosted[0].score - 0.80).abs() < 1e-6);
    let raw = h.retriever.retrieve(&RetrievalRequest::new("alcohol").limit(2).prefer_specific(false)).expect("raw");
    assert_eq!(ids(&raw), vec!["B", "A"]);
}

#[test]
fn rerank_runs_before_truncation() {
    let source = ScriptedSource::new(vec![candidate("major", distance_for(0.85)), candidate("minor", distance_for(0.80))]);
    let store = MapStore::new(vec![
        chunk("major", SectionLevel::Major, Region::Global, ContentType::General),
        chunk("minor", SectionLevel::Minor, Region::Global, ContentType::General),
    ]);
    let h = harness(source, store);
    let out = h.retriever.retrieve(&RetrievalRequest::new("q").limit(1)).expect("retrieve");
    assert_eq!(ids(&out), vec!["minor"]);
}

#[test]
fn repeated_calls_are_identical() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    let req = RetrievalRequest::new("landing page rules").limit(3);
    let first = h.retriever.retrieve(&req).expect("first");
    for _ in 0..5 {
        assert_eq!(h.retriever.retrieve(&req).expect("again"), first);
    }
}

#[test]
fn empty_index_and_empty_query_are_not_errors() {
    let h = harness(ScriptedSource::new(Vec::new()), MapStore::new(Vec::new()));
    assert!(h.retriever.retrieve(&RetrievalRequest::new("")).expect("empty").is_empty());
    assert_eq!(h.io_calls(), (1, 1, 0));
}

#[test]
fn unavailable_backends_propagate() {
    let (_, store) = small_corpus();
    let h = harness(ScriptedSource::unreachable(), store);
    assert!(matches!(h.retriever.retrieve(&RetrievalRequest::new("q")), Err(Error::CandidateSourceUnavailable(_))));

    let (source, _) = small_corpus();
    let h = harness(source, MapStore::unreachable());
    assert!(matches!(h.retriever.retrieve(&RetrievalRequest::new("q")), Err(Error::MetadataStoreUnavailable(_))));
}

#[test]
fn wrong_embedding_width_is_rejected_at_construction() {
    let (source, store) = small_corpus();
    let embedder: Arc<dyn Embedder> = Arc::new(ConstEmbedder::new(768));
    match HybridRetriever::new(embedder, source, store, RetrievalSettings::default()) {
        Err(Error::DimensionMismatch { expected: 384, actual: 768 }) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("768-d embedder accepted"),
    }
}

#[test]
fn positional_search_matches_request_form() {
    let (source, store) = small_corpus();
    let h = harness(source, store);
    let a = h.retriever.search("q", 2, Some("Global"), None, Some("google"), true).expect("search");
    let b = h.retriever.retrieve(&RetrievalRequest::new("q").limit(2).region("Global").policy_source("google")).expect("retrieve");
    assert_eq!(a, b);
}

#[test]
fn health_reports_each_component() {
    let (source, store) = small_corpus();
    let report = harness(source, store).retriever.health();
    assert!(report.is_healthy());
    assert_eq!(report.database, "connected");

    let (source, _) = small_corpus();
    let report = harness(source, MapStore::unreachable()).retriever.health();
    assert_eq!(report.status, "degraded");
    assert!(report.database.starts_with("error:"));
    assert_eq!(report.vector_db, "connected");
}
