//! # recommend-resolver
//!
//! Turns caller input into the text that gets embedded.
//!
//! Plain text passes through unchanged. A reference (anything starting with
//! `http`) is handed to a [`TextResolver`], which returns a short description
//! of the page. Resolution is fail-soft: when the resolver errors, the
//! [`QueryNormalizer`] substitutes [`FALLBACK_QUERY`] and the pipeline
//! continues.

mod gemini;
mod mock;
mod normalizer;

pub use gemini::{GeminiResolver, GeminiResolverConfig};
pub use mock::{FailingResolver, StaticResolver};
pub use normalizer::{is_reference, QueryNormalizer, FALLBACK_QUERY};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for reference resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Resolver returned no text")]
    EmptyResponse,
}

/// Resolves a reference (a URL) into a short plain-text description.
#[async_trait]
pub trait TextResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<String, ResolveError>;
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 2), "");
    }
}
