//! The end-to-end recommendation pipeline.
//!
//! ```text
//! input -> QueryNormalizer -> ResultCache -> SearchOrchestrator -> RankedResult
//! ```

use std::sync::Arc;

use recommend_resolver::QueryNormalizer;
use recommend_types::RankedResult;
use tracing::debug;

use crate::cache::ResultCache;
use crate::error::RecommendError;
use crate::orchestrator::SearchOrchestrator;

#[derive(Clone)]
pub struct Recommender {
    normalizer: QueryNormalizer,
    orchestrator: Arc<SearchOrchestrator>,
    cache: Arc<ResultCache>,
}

impl Recommender {
    pub fn new(
        normalizer: QueryNormalizer,
        orchestrator: Arc<SearchOrchestrator>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            normalizer,
            orchestrator,
            cache,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn max_top_k(&self) -> usize {
        self.orchestrator.max_top_k()
    }

    /// Recommend up to `k` assessments for `input`.
    ///
    /// `is_url` forces reference resolution when `Some(true)`; otherwise the
    /// input prefix decides. Cache hits never touch the embedder.
    pub async fn recommend(
        &self,
        input: &str,
        is_url: Option<bool>,
        k: usize,
    ) -> Result<RankedResult, RecommendError> {
        let query = self.normalizer.normalize_with_hint(input, is_url).await;

        if let Some(hit) = self.cache.get(&query, k) {
            return Ok(hit);
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let cache = Arc::clone(&self.cache);
        let result = tokio::task::spawn_blocking(move || {
            cache.get_or_compute(&query, k, || orchestrator.search(&query, k))
        })
        .await
        .map_err(|e| RecommendError::Task(e.to_string()))??;

        debug!(k, results = result.len(), "Recommendation ready");
        Ok(result)
    }
}
