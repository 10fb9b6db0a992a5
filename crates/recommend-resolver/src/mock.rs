//! Resolvers for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{ResolveError, TextResolver};

/// Returns the same description for every reference.
pub struct StaticResolver {
    text: String,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `resolve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextResolver for StaticResolver {
    async fn resolve(&self, _reference: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// Always fails; used when no resolver is configured.
pub struct FailingResolver {
    reason: String,
}

impl FailingResolver {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for FailingResolver {
    fn default() -> Self {
        Self::new("no resolver configured")
    }
}

#[async_trait]
impl TextResolver for FailingResolver {
    async fn resolve(&self, _reference: &str) -> Result<String, ResolveError> {
        Err(ResolveError::ConfigError(self.reason.clone()))
    }
}
