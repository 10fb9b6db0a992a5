//! End-to-end recommendation pipeline tests.
//!
//! Every test builds a real catalog (usearch index + RocksDB metadata) from
//! the sample raw JSON and queries it through the full pipeline:
//! normalizer -> cache -> orchestrator -> embedder manager -> catalog.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::TestHarness;
use recommend_embeddings::EmbedderState;
use recommend_resolver::{FailingResolver, StaticResolver, FALLBACK_QUERY};
use recommend_service::{RecommendError, SearchError};

#[tokio::test]
async fn test_python_and_sql_query_top_three() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let result = recommender
        .recommend("Need a Python and SQL test under 60 minutes", None, 3)
        .await
        .unwrap();

    assert!(result.len() <= 3);
    assert!(!result.is_empty());
    for ranked in result.iter() {
        assert!(!ranked.item.name.is_empty());
        assert!(!ranked.item.url.is_empty());
    }
    for pair in result.items.windows(2) {
        assert!(pair[0].score >= pair[1].score, "results must be best first");
    }
    assert!(result.names().contains(&"Python (New)".to_string()));

    let ranks: Vec<usize> = result.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=result.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_summaries_have_every_field() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let result = recommender.recommend("Java developer", None, 2).await.unwrap();
    let json = serde_json::to_value(result.summaries()).unwrap();

    for summary in json.as_array().unwrap() {
        for field in [
            "name",
            "url",
            "remote_testing",
            "adaptive_irt_support",
            "duration",
            "test_type",
        ] {
            assert!(summary[field].is_string(), "{field} missing from {summary}");
        }
    }
}

#[tokio::test]
async fn test_empty_query_does_not_crash() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    match recommender.recommend("", None, 5).await {
        Ok(result) => assert!(result.len() <= 5),
        Err(e) => assert!(matches!(e, RecommendError::Search(SearchError::Store(_)))),
    }
}

#[tokio::test]
async fn test_k_larger_than_catalog() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let result = recommender.recommend("assessment", None, 10).await.unwrap();
    assert_eq!(result.len(), 8);
}

#[tokio::test]
async fn test_out_of_range_k_rejected_before_embedding() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    for k in [0, 11] {
        let err = recommender.recommend("python", None, k).await.unwrap_err();
        assert!(err.is_invalid_top_k());
    }
    assert_eq!(harness.loader.loads(), 0);
    assert!(recommender.cache().is_empty());
}

#[tokio::test]
async fn test_url_query_uses_resolved_description() {
    let harness = TestHarness::new();
    let resolver = Arc::new(StaticResolver::new("Excel spreadsheet analyst"));
    let recommender = harness.recommender(resolver.clone(), 5);

    let result = recommender
        .recommend("https://jobs.example/analyst-42", None, 1)
        .await
        .unwrap();

    assert_eq!(resolver.calls(), 1);
    assert_eq!(result.names(), vec!["Microsoft Excel 365 (New)".to_string()]);
}

#[tokio::test]
async fn test_unresolvable_url_uses_fallback_query() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let via_url = recommender
        .recommend("https://jobs.example/unreachable", None, 3)
        .await
        .unwrap();
    assert!(recommender.cache().contains(FALLBACK_QUERY, 3));

    let direct = recommender.recommend(FALLBACK_QUERY, None, 3).await.unwrap();
    assert_eq!(via_url, direct);
    assert_eq!(recommender.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_cached_result_skips_embedder() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let first = recommender.recommend("SQL database", None, 3).await.unwrap();
    assert_eq!(harness.loader.loads(), 1);

    let second = recommender.recommend("SQL database", None, 3).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(harness.loader.loads(), 1);
    assert_eq!(harness.manager.state(), EmbedderState::Unloaded);
}

#[tokio::test]
async fn test_cache_evicts_oldest_query() {
    let harness = TestHarness::new();
    let recommender = harness.recommender(Arc::new(FailingResolver::default()), 5);

    let queries = ["python", "sql", "java", "excel", "sales", "numerical"];
    for q in queries {
        recommender.recommend(q, None, 2).await.unwrap();
    }

    let cache = recommender.cache();
    assert_eq!(cache.len(), 5);
    assert!(!cache.contains("python", 2));
    for q in &queries[1..] {
        assert!(cache.contains(q, 2), "{q} should be cached");
    }
    assert_eq!(cache.stats().evictions, 1);
}
