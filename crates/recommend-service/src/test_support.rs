//! Fakes shared by the unit tests in this crate.

use std::sync::Arc;
use std::time::Duration;

use recommend_catalog::{CatalogError, CatalogHit, CatalogStore};
use recommend_embeddings::{
    Embedding, EmbedderManager, EmbeddingError, EmbeddingModel, ModelInfo, ModelLoader,
};
use recommend_resolver::{QueryNormalizer, StaticResolver};
use recommend_types::{CatalogItem, ResidencyPolicy};

use crate::cache::ResultCache;
use crate::orchestrator::SearchOrchestrator;
use crate::recommender::Recommender;

const KEYWORDS: [&str; 4] = ["python", "sql", "java", "excel"];

/// Embeds text as keyword presence over a tiny vocabulary.
struct KeywordModel {
    info: ModelInfo,
}

impl EmbeddingModel for KeywordModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let lower = text.to_lowercase();
        let mut values: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        values.push(0.1);
        Ok(Embedding::new(values))
    }
}

struct KeywordLoader;

impl ModelLoader for KeywordLoader {
    fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        Ok(Arc::new(KeywordModel {
            info: ModelInfo {
                name: "keyword".to_string(),
                dimension: KEYWORDS.len() + 1,
                max_sequence_length: 128,
            },
        }))
    }

    fn model_name(&self) -> String {
        "keyword".to_string()
    }
}

/// Brute-force cosine search over a fixed item list.
pub(crate) struct MemoryCatalog {
    entries: Vec<(Embedding, CatalogItem)>,
    pub(crate) fail: bool,
    /// Blocks every lookup this long before answering.
    pub(crate) delay: Option<Duration>,
}

impl MemoryCatalog {
    pub(crate) fn sample() -> Self {
        let model = KeywordModel {
            info: ModelInfo {
                name: "keyword".to_string(),
                dimension: KEYWORDS.len() + 1,
                max_sequence_length: 128,
            },
        };
        let entries = ["Python (New)", "SQL (New)", "Java 8 (New)", "MS Excel (New)"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let item = CatalogItem {
                    id: i.to_string(),
                    name: name.to_string(),
                    url: format!("https://catalog.example/{i}"),
                    duration: "30".to_string(),
                    remote_testing: "Yes".to_string(),
                    adaptive_irt_support: "No".to_string(),
                    test_type: "Knowledge & Skills".to_string(),
                    ..Default::default()
                };
                let embedding = model.embed(name).expect("keyword embedding");
                (embedding, item)
            })
            .collect();
        Self {
            entries,
            fail: false,
            delay: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl CatalogStore for MemoryCatalog {
    fn dimension(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&self, _: u64, _: &Embedding, _: &CatalogItem) -> Result<(), CatalogError> {
        Err(CatalogError::InvalidInput("read-only".to_string()))
    }

    fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(CatalogError::MissingMetadata(0));
        }
        let mut hits: Vec<CatalogHit> = self
            .entries
            .iter()
            .map(|(e, item)| CatalogHit {
                score: e.cosine_similarity(query),
                item: item.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

pub(crate) fn recommender(catalog: MemoryCatalog, resolved: &str) -> Recommender {
    let manager = Arc::new(EmbedderManager::new(
        KeywordLoader,
        ResidencyPolicy::ReleaseAfterUse,
    ));
    let orchestrator = Arc::new(SearchOrchestrator::new(manager, Arc::new(catalog), 10));
    let normalizer = QueryNormalizer::new(Arc::new(StaticResolver::new(resolved)));
    Recommender::new(normalizer, orchestrator, Arc::new(ResultCache::new(5)))
}
