//! Configuration loading for the assessment recommender.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at
//! `~/.config/assessment-recommender/config.toml` (platform dependent).

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RecommendTypesError;

/// Environment variable consulted for the resolver API key when the
/// layered config does not provide one.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Whether the embedding model stays loaded between requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyPolicy {
    /// Unload the model as soon as no request holds it (default)
    #[default]
    ReleaseAfterUse,
    /// Keep the model loaded until it is released explicitly
    KeepResident,
}

/// URL resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Generative model used to describe a job posting URL
    #[serde(default = "default_resolver_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_resolver_base_url")]
    pub base_url: String,

    /// API key (normally supplied through GEMINI_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on the resolved description length (characters)
    #[serde(default = "default_resolver_max_chars")]
    pub max_chars: usize,
}

fn default_resolver_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_resolver_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_resolver_timeout() -> u64 {
    30
}

fn default_resolver_max_chars() -> usize {
    600
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            model: default_resolver_model(),
            base_url: default_resolver_base_url(),
            api_key: None,
            timeout_secs: default_resolver_timeout(),
            max_chars: default_resolver_max_chars(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the catalog index and metadata
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// HuggingFace repository of the embedding model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Local directory for downloaded model files
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: String,

    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Largest k a caller may request
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// k used when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Number of (query, k) results kept in the result cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Embedding model residency between requests
    #[serde(default)]
    pub residency: ResidencyPolicy,

    /// Overall HTTP request deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// URL resolver configuration
    #[serde(default)]
    pub resolver: ResolverSettings,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "assessment-recommender")
}

fn default_catalog_path() -> String {
    project_dirs()
        .map(|p| p.data_local_dir().join("catalog"))
        .unwrap_or_else(|| PathBuf::from("./data/catalog"))
        .to_string_lossy()
        .to_string()
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_model_cache_dir() -> String {
    project_dirs()
        .map(|p| p.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from("./.cache/models"))
        .to_string_lossy()
        .to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_top_k() -> usize {
    10
}

fn default_top_k() -> usize {
    10
}

fn default_cache_capacity() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            model_repo: default_model_repo(),
            model_cache_dir: default_model_cache_dir(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            log_level: default_log_level(),
            max_top_k: default_max_top_k(),
            default_top_k: default_top_k(),
            cache_capacity: default_cache_capacity(),
            residency: ResidencyPolicy::default(),
            request_timeout_secs: default_request_timeout(),
            resolver: ResolverSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Default config file
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RECOMMEND_*, nested keys split on `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RecommendTypesError> {
        let config_dir = project_dirs()
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("catalog_path", default_catalog_path())
            .map_err(config_err)?
            .set_default("model_repo", default_model_repo())
            .map_err(config_err)?
            .set_default("model_cache_dir", default_model_cache_dir())
            .map_err(config_err)?
            .set_default("http_host", default_http_host())
            .map_err(config_err)?
            .set_default("http_port", default_http_port() as i64)
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RECOMMEND_HTTP_PORT, RECOMMEND_RESOLVER__MODEL, ...
        builder = builder.add_source(
            Environment::with_prefix("RECOMMEND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let mut settings: Settings = config.try_deserialize().map_err(config_err)?;

        if settings.resolver.api_key.is_none() {
            settings.resolver.api_key = std::env::var(GEMINI_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RecommendTypesError> {
        if self.max_top_k == 0 {
            return Err(RecommendTypesError::Config(
                "max_top_k must be >= 1".to_string(),
            ));
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(RecommendTypesError::Config(format!(
                "default_top_k must be 1-{}, got {}",
                self.max_top_k, self.default_top_k
            )));
        }
        if self.cache_capacity == 0 {
            return Err(RecommendTypesError::Config(
                "cache_capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Catalog path with a leading `~/` expanded
    pub fn expanded_catalog_path(&self) -> PathBuf {
        expand_home(&self.catalog_path)
    }

    /// Model cache directory with a leading `~/` expanded
    pub fn expanded_model_cache_dir(&self) -> PathBuf {
        expand_home(&self.model_cache_dir)
    }
}

fn config_err(e: config::ConfigError) -> RecommendTypesError {
    RecommendTypesError::Config(e.to_string())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
