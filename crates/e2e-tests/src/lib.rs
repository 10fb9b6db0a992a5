//! End-to-end test infrastructure for the assessment recommender.
//!
//! Builds a real on-disk catalog (usearch + RocksDB) from a small raw JSON
//! sample with a deterministic bag-of-words embedder, then wires the full
//! pipeline over it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use recommend_catalog::{CatalogBuilder, CatalogError, CatalogHit, CatalogStore, LocalCatalog};
use recommend_embeddings::{
    Embedding, EmbedderManager, EmbeddingError, EmbeddingModel, ModelInfo, ModelLoader,
};
use recommend_resolver::{QueryNormalizer, TextResolver};
use recommend_service::{Recommender, ResultCache, SearchOrchestrator};
use recommend_types::{CatalogItem, ResidencyPolicy};

/// Dimension of [`WordHashEmbedder`] vectors
pub const TEST_DIM: usize = 256;

/// Hashes lowercase alphanumeric words into a fixed number of buckets.
///
/// One extra bucket carries a constant so that no vector is all zeros.
pub struct WordHashEmbedder {
    info: ModelInfo,
}

impl WordHashEmbedder {
    pub fn new() -> Self {
        Self {
            info: ModelInfo {
                name: "word-hash".to_string(),
                dimension: TEST_DIM,
                max_sequence_length: 512,
            },
        }
    }

    fn bucket(word: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % (TEST_DIM as u64 - 1)) as usize
    }
}

impl Default for WordHashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for WordHashEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut values = vec![0.0f32; TEST_DIM];
        values[TEST_DIM - 1] = 0.05;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            values[Self::bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(Embedding::new(values))
    }
}

/// Loader for [`WordHashEmbedder`] that counts loads and can be made to fail.
///
/// Clones share their counters, so a test can keep one handle while the
/// manager owns another.
#[derive(Clone, Default)]
pub struct HashLoader {
    loads: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl HashLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ModelLoader for HashLoader {
    fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Load("model files unavailable".to_string()));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(WordHashEmbedder::new()))
    }

    fn model_name(&self) -> String {
        "word-hash".to_string()
    }

    fn dimension(&self) -> Result<usize, EmbeddingError> {
        Ok(TEST_DIM)
    }
}

fn record(name: &str, description: &str, duration: &str, test_type: &str) -> serde_json::Value {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    serde_json::json!({
        "name": name,
        "url": format!("https://catalog.example/products/{slug}/"),
        "description": description,
        "duration": duration,
        "languages": ["English (USA)"],
        "job_level": "Mid-Professional, Professional Individual Contributor",
        "remote_testing": "Yes",
        "adaptive/irt_support": "No",
        "test_type": [test_type]
    })
}

/// Raw catalog JSON: eight complete records and one missing `duration`.
pub fn sample_catalog_json() -> String {
    let mut records = vec![
        record(
            "Python (New)",
            "Multi-choice test that measures knowledge of Python programming, Python data structures and Python libraries.",
            "11 minutes",
            "Knowledge & Skills",
        ),
        record(
            "SQL (New)",
            "Multi-choice test that measures knowledge of SQL queries, SQL joins and relational database design.",
            "9 minutes",
            "Knowledge & Skills",
        ),
        record(
            "JavaScript (New)",
            "Multi-choice test that measures knowledge of JavaScript, DOM manipulation and browser events.",
            "16 minutes",
            "Knowledge & Skills",
        ),
        record(
            "Java 8 (New)",
            "Multi-choice test that measures knowledge of Java class design, Java exceptions and Java generics.",
            "18 minutes",
            "Knowledge & Skills",
        ),
        record(
            "Microsoft Excel 365 (New)",
            "Multi-choice test that measures knowledge of Excel formulas, Excel charts and spreadsheet data.",
            "35 minutes",
            "Knowledge & Skills",
        ),
        record(
            "Occupational Personality Questionnaire OPQ32r",
            "Questionnaire describing behavioural style, teamwork and leadership preferences at work.",
            "25 minutes",
            "Personality & Behavior",
        ),
        record(
            "Verify - Numerical Ability",
            "Adaptive assessment of numerical reasoning with tables, graphs and percentages.",
            "20 minutes",
            "Ability & Aptitude",
        ),
        record(
            "Entry Level Sales Solution",
            "Entry-level simulation of customer conversations, basic cognitive skills and sales behaviours.",
            "30 minutes",
            "Simulations",
        ),
    ];

    let mut incomplete = record("Broken Record", "No duration", "", "Knowledge & Skills");
    if let Some(fields) = incomplete.as_object_mut() {
        fields.remove("duration");
    }
    records.push(incomplete);

    serde_json::Value::Array(records).to_string()
}

/// Catalog store that fails every lookup.
pub struct FailingCatalog;

impl CatalogStore for FailingCatalog {
    fn dimension(&self) -> usize {
        TEST_DIM
    }

    fn len(&self) -> usize {
        0
    }

    fn insert(&self, _: u64, _: &Embedding, _: &CatalogItem) -> Result<(), CatalogError> {
        Err(CatalogError::InvalidInput("read-only".to_string()))
    }

    fn nearest(&self, _query: &Embedding, _k: usize) -> Result<Vec<CatalogHit>, CatalogError> {
        Err(CatalogError::Index("simulated lookup failure".to_string()))
    }
}

/// Shared test harness: a built catalog plus the wiring around it.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub catalog_path: PathBuf,
    pub loader: HashLoader,
    pub manager: Arc<EmbedderManager>,
    pub catalog: Arc<dyn CatalogStore>,
}

impl TestHarness {
    /// Build the sample catalog and open it for serving.
    pub fn new() -> Self {
        Self::with_policy(ResidencyPolicy::ReleaseAfterUse)
    }

    pub fn with_policy(policy: ResidencyPolicy) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let catalog_path = temp_dir.path().join("catalog");

        let embedder = WordHashEmbedder::new();
        CatalogBuilder::new(&embedder)
            .build_from_json(&catalog_path, &sample_catalog_json())
            .expect("Failed to build sample catalog");

        let catalog =
            LocalCatalog::open(&catalog_path, TEST_DIM).expect("Failed to open sample catalog");

        let loader = HashLoader::default();
        let manager = Arc::new(EmbedderManager::new(loader.clone(), policy));

        Self {
            _temp_dir: temp_dir,
            catalog_path,
            loader,
            manager,
            catalog: Arc::new(catalog),
        }
    }

    /// Replace the catalog with one whose lookups always fail.
    pub fn with_failing_catalog(mut self) -> Self {
        self.catalog = Arc::new(FailingCatalog);
        self
    }

    pub fn orchestrator(&self, max_top_k: usize) -> Arc<SearchOrchestrator> {
        Arc::new(SearchOrchestrator::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.catalog),
            max_top_k,
        ))
    }

    /// Full pipeline with max_top_k 10 and the given cache capacity.
    pub fn recommender(
        &self,
        resolver: Arc<dyn TextResolver>,
        cache_capacity: usize,
    ) -> Recommender {
        Recommender::new(
            QueryNormalizer::new(resolver),
            self.orchestrator(10),
            Arc::new(ResultCache::new(cache_capacity)),
        )
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_is_deterministic_and_nonzero() {
        let embedder = WordHashEmbedder::new();
        let a = embedder.embed("Python SQL").unwrap();
        let b = embedder.embed("python, sql").unwrap();
        assert_eq!(a, b);
        assert!(embedder.embed("").unwrap().as_slice().iter().any(|v| *v > 0.0));
    }

    #[test]
    fn test_harness_builds_complete_records_only() {
        let harness = TestHarness::new();
        assert_eq!(harness.catalog.len(), 8);
    }
}
