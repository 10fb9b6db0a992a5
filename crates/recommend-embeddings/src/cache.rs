//! Local model file store.
//!
//! The first load pulls whatever files are missing from the HuggingFace Hub.
//! Later loads, including a reload after the embedder was released, read
//! from disk only.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Model the catalog is built with unless configured otherwise
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Files a BERT-style sentence embedder needs
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// On-disk location of one model repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(Self::default_dir(), DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// `<platform cache>/assessment-recommender/models`
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("assessment-recommender")
            .join("models")
    }

    /// `org/name` is stored under `<cache_dir>/org_name`.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    /// Last segment of the repository id, e.g. `all-MiniLM-L6-v2`.
    pub fn model_name(&self) -> &str {
        self.repo_id.rsplit('/').next().unwrap_or(&self.repo_id)
    }

    pub fn paths(&self) -> ModelPaths {
        ModelPaths::in_dir(&self.model_dir())
    }

    /// Required files not yet on disk.
    pub fn missing_files(&self) -> Vec<&'static str> {
        let dir = self.model_dir();
        MODEL_FILES
            .iter()
            .copied()
            .filter(|name| !dir.join(name).is_file())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }

    /// Paths to every model file, fetching the missing ones first.
    pub fn ensure(&self) -> Result<ModelPaths, EmbeddingError> {
        let missing = self.missing_files();
        if missing.is_empty() {
            debug!(dir = %self.model_dir().display(), "Model files present");
        } else {
            info!(repo = %self.repo_id, missing = missing.len(), "Fetching model files");
            fetch_from_hub(&self.repo_id, &self.model_dir(), &missing)?;
        }
        Ok(self.paths())
    }
}

/// Resolved model file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }
}

fn fetch_from_hub(repo_id: &str, dest: &Path, files: &[&str]) -> Result<(), EmbeddingError> {
    let api = hf_hub::api::sync::Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(repo_id.to_string());

    std::fs::create_dir_all(dest)?;
    for name in files {
        let fetched = repo
            .get(name)
            .map_err(|e| EmbeddingError::Download(format!("{name}: {e}")))?;
        std::fs::copy(&fetched, dest.join(name))?;
        debug!(file = name, "Model file stored");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_points_at_minilm() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.ends_with("assessment-recommender/models"));
        assert_eq!(cache.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_missing_files_shrinks_as_files_appear() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "acme/mini");
        assert_eq!(cache.missing_files(), MODEL_FILES.to_vec());

        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(cache.paths().config, "{}").unwrap();
        std::fs::write(cache.paths().tokenizer, "{}").unwrap();
        assert_eq!(cache.missing_files(), vec!["model.safetensors"]);
        assert!(!cache.is_cached());

        std::fs::write(cache.paths().weights, "").unwrap();
        assert!(cache.is_cached());
    }

    #[test]
    fn test_ensure_with_all_files_stays_offline() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "acme/mini");
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        for name in MODEL_FILES {
            std::fs::write(cache.model_dir().join(name), "").unwrap();
        }

        let paths = cache.ensure().unwrap();
        assert_eq!(paths, ModelPaths::in_dir(&temp.path().join("acme_mini")));
    }
}
