//! Query normalization.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::TextResolver;

/// Query used when a reference cannot be resolved.
pub const FALLBACK_QUERY: &str = "Entry-level role, basic technical and cognitive skills, under 30 minutes";

/// Whether `input` is a reference to resolve rather than query text.
///
/// Matches on the `http` prefix, which covers both `http://` and `https://`.
pub fn is_reference(input: &str) -> bool {
    input.starts_with("http")
}

/// Maps caller input to the text that will be embedded.
#[derive(Clone)]
pub struct QueryNormalizer {
    resolver: Arc<dyn TextResolver>,
}

impl QueryNormalizer {
    pub fn new(resolver: Arc<dyn TextResolver>) -> Self {
        Self { resolver }
    }

    /// Normalize `input`. Never fails.
    ///
    /// References go through the resolver; on resolver error the result is
    /// [`FALLBACK_QUERY`]. Anything else is returned unchanged, including the
    /// empty string.
    pub async fn normalize(&self, input: &str) -> String {
        if !is_reference(input) {
            return input.to_string();
        }

        self.resolve_or_fallback(input).await
    }

    /// Normalize with an explicit reference flag from the caller.
    ///
    /// `Some(true)` forces resolution. Otherwise prefix detection decides, so
    /// a URL sent with `is_url: false` is still resolved.
    pub async fn normalize_with_hint(&self, input: &str, is_url: Option<bool>) -> String {
        if is_url == Some(true) {
            return self.resolve_or_fallback(input).await;
        }
        self.normalize(input).await
    }

    async fn resolve_or_fallback(&self, input: &str) -> String {
        match self.resolver.resolve(input).await {
            Ok(text) => {
                debug!(chars = text.chars().count(), "Resolved reference");
                text
            }
            Err(e) => {
                warn!(reference = %input, error = %e, "Reference resolution failed, using fallback query");
                FALLBACK_QUERY.to_string()
            }
        }
    }
}
