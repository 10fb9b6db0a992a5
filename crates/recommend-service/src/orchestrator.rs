//! Search orchestration: acquire the embedder, embed the query, look up the
//! nearest catalog items, release the embedder.
//!
//! Blocking; callers on the async runtime run it via `spawn_blocking`.

use std::sync::Arc;
use std::time::Instant;

use recommend_catalog::CatalogStore;
use recommend_embeddings::EmbedderManager;
use recommend_types::RankedResult;
use tracing::info;

use crate::error::SearchError;

pub struct SearchOrchestrator {
    manager: Arc<EmbedderManager>,
    catalog: Arc<dyn CatalogStore>,
    max_top_k: usize,
}

impl SearchOrchestrator {
    pub fn new(
        manager: Arc<EmbedderManager>,
        catalog: Arc<dyn CatalogStore>,
        max_top_k: usize,
    ) -> Self {
        Self {
            manager,
            catalog,
            max_top_k,
        }
    }

    pub fn manager(&self) -> &Arc<EmbedderManager> {
        &self.manager
    }

    pub fn max_top_k(&self) -> usize {
        self.max_top_k
    }

    /// Up to `k` catalog items nearest to `query`, most similar first.
    ///
    /// The embedder lease is dropped before results are assembled, on every
    /// exit path. Errors propagate unchanged and are never retried.
    pub fn search(&self, query: &str, k: usize) -> Result<RankedResult, SearchError> {
        if k == 0 || k > self.max_top_k {
            return Err(SearchError::InvalidTopK {
                k,
                max: self.max_top_k,
            });
        }

        let started = Instant::now();
        let hits = {
            let lease = self.manager.acquire().map_err(SearchError::Load)?;
            let vector = lease.embed(query).map_err(SearchError::Embed)?;
            self.catalog.nearest(&vector, k)?
        };

        let result = RankedResult::from_ordered(hits.into_iter().map(|h| (h.score, h.item)));
        info!(
            k,
            results = result.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recommend_catalog::{CatalogError, CatalogHit};
    use recommend_embeddings::{
        Embedding, EmbedderState, EmbeddingError, EmbeddingModel, ModelInfo, ModelLoader,
    };
    use recommend_types::{CatalogItem, ResidencyPolicy};
    use std::sync::Mutex;

    struct ConstModel {
        info: ModelInfo,
        fail: bool,
    }

    impl EmbeddingModel for ConstModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::EmptyOutput);
            }
            Ok(Embedding::new(vec![1.0, 0.0]))
        }
    }

    struct ConstLoader {
        fail_embed: bool,
    }

    impl ModelLoader for ConstLoader {
        fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
            Ok(Arc::new(ConstModel {
                info: ModelInfo {
                    name: "const".to_string(),
                    dimension: 2,
                    max_sequence_length: 16,
                },
                fail: self.fail_embed,
            }))
        }

        fn model_name(&self) -> String {
            "const".to_string()
        }
    }

    /// Returns a fixed hit list, or an error, and records requested k.
    struct ScriptedCatalog {
        hits: Vec<CatalogHit>,
        fail: bool,
        seen_k: Mutex<Vec<usize>>,
    }

    impl CatalogStore for ScriptedCatalog {
        fn dimension(&self) -> usize {
            2
        }

        fn len(&self) -> usize {
            self.hits.len()
        }

        fn insert(&self, _: u64, _: &Embedding, _: &CatalogItem) -> Result<(), CatalogError> {
            Err(CatalogError::InvalidInput("read-only".to_string()))
        }

        fn nearest(&self, _query: &Embedding, k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
            self.seen_k.lock().unwrap().push(k);
            if self.fail {
                return Err(CatalogError::MissingMetadata(7));
            }
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    fn hit(name: &str, score: f32) -> CatalogHit {
        CatalogHit {
            score,
            item: CatalogItem {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    fn orchestrator(fail_embed: bool, fail_store: bool) -> (SearchOrchestrator, Arc<ScriptedCatalog>) {
        let manager = Arc::new(EmbedderManager::new(
            ConstLoader { fail_embed },
            ResidencyPolicy::ReleaseAfterUse,
        ));
        let catalog = Arc::new(ScriptedCatalog {
            hits: vec![hit("Python (New)", 0.9), hit("SQL (New)", 0.8), hit("Excel", 0.1)],
            fail: fail_store,
            seen_k: Mutex::new(Vec::new()),
        });
        (SearchOrchestrator::new(manager, catalog.clone(), 10), catalog)
    }

    #[test]
    fn test_search_preserves_store_order() {
        let (orch, catalog) = orchestrator(false, false);
        let result = orch.search("python", 2).unwrap();
        assert_eq!(result.names(), vec!["Python (New)", "SQL (New)"]);
        assert_eq!(result.items[0].rank, 1);
        assert_eq!(*catalog.seen_k.lock().unwrap(), vec![2]);
        assert_eq!(orch.manager().state(), EmbedderState::Unloaded);
    }

    #[test]
    fn test_empty_query_passes_through() {
        let (orch, _) = orchestrator(false, false);
        assert_eq!(orch.search("", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_top_k() {
        let (orch, catalog) = orchestrator(false, false);
        assert!(matches!(
            orch.search("x", 0),
            Err(SearchError::InvalidTopK { k: 0, max: 10 })
        ));
        assert!(matches!(
            orch.search("x", 11),
            Err(SearchError::InvalidTopK { k: 11, .. })
        ));
        assert!(catalog.seen_k.lock().unwrap().is_empty());
        assert_eq!(orch.manager().load_count(), 0);
    }

    #[test]
    fn test_store_error_releases_embedder() {
        let (orch, _) = orchestrator(false, true);
        assert!(matches!(
            orch.search("x", 3),
            Err(SearchError::Store(CatalogError::MissingMetadata(7)))
        ));
        assert_eq!(orch.manager().state(), EmbedderState::Unloaded);
        assert_eq!(orch.manager().active_leases(), 0);
    }

    #[test]
    fn test_embed_error_releases_embedder() {
        let (orch, catalog) = orchestrator(true, false);
        assert!(matches!(orch.search("x", 3), Err(SearchError::Embed(_))));
        assert_eq!(orch.manager().active_leases(), 0);
        assert!(catalog.seen_k.lock().unwrap().is_empty());
    }
}
