//! Gemini-backed resolver: asks the model, with web search enabled, to
//! describe the job posting behind a URL.

use std::time::Duration;

use async_trait::async_trait;
use recommend_types::ResolverSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{truncate_chars, ResolveError, TextResolver};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini resolver.
#[derive(Debug, Clone)]
pub struct GeminiResolverConfig {
    /// API base URL (e.g. "https://generativelanguage.googleapis.com/v1beta")
    pub base_url: String,

    /// Model name (e.g. "gemini-2.5-flash")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Longest description returned, in characters
    pub max_chars: usize,
}

impl GeminiResolverConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = ResolverSettings::default();
        Self {
            base_url: defaults.base_url,
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_chars: defaults.max_chars,
        }
    }

    /// Build from settings. Fails when no API key is configured.
    pub fn from_settings(settings: &ResolverSettings) -> Result<Self, ResolveError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ResolveError::ConfigError("no resolver API key configured".into()))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: SecretString::from(api_key),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_chars: settings.max_chars,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Gemini `generateContent` client.
pub struct GeminiResolver {
    client: Client,
    config: GeminiResolverConfig,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GeminiResolver {
    pub fn new(config: GeminiResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ResolveError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_prompt(reference: &str) -> String {
        format!(
            "Visit this job URL and read the full job description carefully:\n\
             {reference}\n\n\
             Now generate a natural language search query as if someone is trying to \
             find the best assessment(s) for this role.\n\n\
             Include:\n\
             - Job title\n\
             - Key skills (technical and cognitive, if any)\n\
             - Level of the role\n\
             - Time constraint, if mentioned\n\
             Output must be at most 2 sentences, plain text only, with no markdown."
        )
    }

    async fn make_request(&self, prompt: String) -> Result<String, ResolveError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            tools: vec![Tool {
                google_search: serde_json::Map::new(),
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        // reqwest errors render the request URL, so the key must not be in it.
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ResolveError::ApiError(e.without_url().to_string()))?;

        if response.status() == 429 {
            return Err(ResolveError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::ParseError(e.to_string()))?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(text)
    }
}

#[async_trait]
impl TextResolver for GeminiResolver {
    async fn resolve(&self, reference: &str) -> Result<String, ResolveError> {
        debug!(model = %self.config.model, "Resolving reference via Gemini");

        let text = self.make_request(Self::build_prompt(reference)).await?;
        let text = text.trim();
        if text.is_empty() {
            warn!("Gemini returned an empty description");
            return Err(ResolveError::EmptyResponse);
        }

        Ok(truncate_chars(text, self.config.max_chars))
    }
}
