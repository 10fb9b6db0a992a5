//! Embedder lifecycle management.
//!
//! The embedding model is large, so it is only resident while requests use
//! it. State machine:
//!
//! ```text
//!   Unloaded --acquire()--> Loaded --release()--> Unloaded
//! ```
//!
//! `acquire()` hands out an [`EmbedderLease`]. Leases are counted: a release
//! requested while leases are outstanding is deferred until the last lease
//! drops, so a request never loses the model mid-use. Under
//! [`ResidencyPolicy::ReleaseAfterUse`] the drop of the last lease is itself
//! a release.
//!
//! The load transition runs under the slot mutex, so concurrent first
//! requests load exactly one model instance. Using a loaded model does not
//! take the mutex.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use recommend_types::ResidencyPolicy;
use tracing::{debug, info, warn};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Constructs the embedding model on demand.
pub trait ModelLoader: Send + Sync {
    /// Load a fresh model instance.
    fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError>;

    /// Name used in log events.
    fn model_name(&self) -> String;

    /// Output dimension of the model this loader produces.
    fn dimension(&self) -> Result<usize, EmbeddingError> {
        Ok(self.load()?.info().dimension)
    }
}

/// Residency of the managed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderState {
    Unloaded,
    Loaded,
}

impl EmbedderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedderState::Unloaded => "unloaded",
            EmbedderState::Loaded => "loaded",
        }
    }
}

#[derive(Default)]
struct Slot {
    model: Option<Arc<dyn EmbeddingModel>>,
    active: usize,
    release_pending: bool,
}

/// Owns the embedder and its load/release transitions.
pub struct EmbedderManager {
    loader: Box<dyn ModelLoader>,
    policy: ResidencyPolicy,
    slot: Mutex<Slot>,
    loads: AtomicU64,
    unloads: AtomicU64,
}

impl fmt::Debug for EmbedderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedderManager")
            .field("model", &self.loader.model_name())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl EmbedderManager {
    /// Create a manager in the Unloaded state.
    pub fn new(loader: impl ModelLoader + 'static, policy: ResidencyPolicy) -> Self {
        Self {
            loader: Box::new(loader),
            policy,
            slot: Mutex::new(Slot::default()),
            loads: AtomicU64::new(0),
            unloads: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot updates are single assignments, so a poisoned slot is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the model, loading it if Unloaded.
    ///
    /// On load failure the manager stays Unloaded; a later call retries.
    pub fn acquire(self: &Arc<Self>) -> Result<EmbedderLease, EmbeddingError> {
        let mut slot = self.lock();

        let model = match &slot.model {
            Some(model) => model.clone(),
            None => {
                let model = self.loader.load().map_err(|e| {
                    warn!(model = %self.loader.model_name(), error = %e, "Embedding model load failed");
                    e
                })?;
                let loads = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    model = %model.info().name,
                    dim = model.info().dimension,
                    loads,
                    "Embedding model loaded"
                );
                slot.model = Some(model.clone());
                model
            }
        };

        slot.active += 1;
        debug!(active = slot.active, "Embedder lease acquired");

        Ok(EmbedderLease {
            model: Some(model),
            manager: Arc::clone(self),
        })
    }

    /// Release the model.
    ///
    /// No-op when Unloaded. With leases outstanding the unload happens when
    /// the last one drops.
    pub fn release(&self) {
        let mut slot = self.lock();
        if slot.active > 0 {
            slot.release_pending = true;
            debug!(active = slot.active, "Embedder release deferred until leases drop");
            return;
        }
        self.unload(&mut slot);
    }

    fn finish_lease(&self) {
        let mut slot = self.lock();
        slot.active = slot.active.saturating_sub(1);
        debug!(active = slot.active, "Embedder lease returned");

        if slot.active == 0
            && (slot.release_pending || self.policy == ResidencyPolicy::ReleaseAfterUse)
        {
            self.unload(&mut slot);
        }
    }

    fn unload(&self, slot: &mut Slot) {
        slot.release_pending = false;
        if slot.model.take().is_some() {
            let unloads = self.unloads.fetch_add(1, Ordering::SeqCst) + 1;
            info!(model = %self.loader.model_name(), unloads, "Embedding model released");
        }
    }

    pub fn state(&self) -> EmbedderState {
        if self.lock().model.is_some() {
            EmbedderState::Loaded
        } else {
            EmbedderState::Unloaded
        }
    }

    /// Number of successful loads since construction.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of unloads since construction.
    pub fn unload_count(&self) -> u64 {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn active_leases(&self) -> usize {
        self.lock().active
    }

    pub fn policy(&self) -> ResidencyPolicy {
        self.policy
    }

    pub fn model_name(&self) -> String {
        self.loader.model_name()
    }

    /// Output dimension of the managed model, without changing its state.
    pub fn model_dimension(&self) -> Result<usize, EmbeddingError> {
        self.loader.dimension()
    }
}

/// Scoped use of the loaded model.
///
/// Dropping the lease returns it to the manager, on success, error and
/// unwinding paths alike.
pub struct EmbedderLease {
    model: Option<Arc<dyn EmbeddingModel>>,
    manager: Arc<EmbedderManager>,
}

impl EmbedderLease {
    fn model(&self) -> &dyn EmbeddingModel {
        match &self.model {
            Some(model) => model.as_ref(),
            None => unreachable!("lease model is only taken in drop"),
        }
    }

    pub fn info(&self) -> &ModelInfo {
        self.model().info()
    }

    pub fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.model().embed(text)
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        self.model().embed_batch(texts)
    }
}

impl Drop for EmbedderLease {
    fn drop(&mut self) {
        // Drop our strong reference before the manager decides whether to unload.
        drop(self.model.take());
        self.manager.finish_lease();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Barrier, Weak};
    use std::thread;
    use std::time::Duration;

    struct FixedModel {
        info: ModelInfo,
    }

    impl EmbeddingModel for FixedModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            Ok(Embedding::new(vec![text.len() as f32 + 1.0, 1.0]))
        }
    }

    #[derive(Default)]
    struct ProbeLoader {
        fail: Arc<AtomicBool>,
        last: Arc<Mutex<Option<Weak<dyn EmbeddingModel>>>>,
        delay: Option<Duration>,
    }

    impl ModelLoader for ProbeLoader {
        fn load(&self) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingError::Load("weights missing".to_string()));
            }
            let model: Arc<dyn EmbeddingModel> = Arc::new(FixedModel {
                info: ModelInfo {
                    name: "probe".to_string(),
                    dimension: 2,
                    max_sequence_length: 16,
                },
            });
            *self.last.lock().unwrap() = Some(Arc::downgrade(&model));
            Ok(model)
        }

        fn model_name(&self) -> String {
            "probe".to_string()
        }
    }

    fn manager(policy: ResidencyPolicy) -> Arc<EmbedderManager> {
        Arc::new(EmbedderManager::new(ProbeLoader::default(), policy))
    }

    #[test]
    fn test_starts_unloaded() {
        let manager = manager(ResidencyPolicy::KeepResident);
        assert_eq!(manager.state(), EmbedderState::Unloaded);
        assert_eq!(manager.load_count(), 0);
    }

    #[test]
    fn test_acquire_is_idempotent_while_loaded() {
        let manager = manager(ResidencyPolicy::KeepResident);
        drop(manager.acquire().unwrap());
        drop(manager.acquire().unwrap());
        assert_eq!(manager.state(), EmbedderState::Loaded);
        assert_eq!(manager.load_count(), 1);
    }

    #[test]
    fn test_release_then_acquire_reloads() {
        let manager = manager(ResidencyPolicy::KeepResident);
        drop(manager.acquire().unwrap());
        manager.release();
        assert_eq!(manager.state(), EmbedderState::Unloaded);

        drop(manager.acquire().unwrap());
        assert_eq!(manager.state(), EmbedderState::Loaded);
        assert_eq!(manager.load_count(), 2);
    }

    #[test]
    fn test_release_is_idempotent() {
        let manager = manager(ResidencyPolicy::KeepResident);
        manager.release();
        manager.release();
        assert_eq!(manager.state(), EmbedderState::Unloaded);
        assert_eq!(manager.unload_count(), 0);
    }

    #[test]
    fn test_release_after_use_unloads_on_last_lease() {
        let manager = manager(ResidencyPolicy::ReleaseAfterUse);
        let first = manager.acquire().unwrap();
        let second = manager.acquire().unwrap();
        assert_eq!(manager.active_leases(), 2);

        drop(first);
        assert_eq!(manager.state(), EmbedderState::Loaded);

        drop(second);
        assert_eq!(manager.state(), EmbedderState::Unloaded);
        assert_eq!(manager.unload_count(), 1);
    }

    #[test]
    fn test_release_deferred_while_leased() {
        let manager = manager(ResidencyPolicy::KeepResident);
        let lease = manager.acquire().unwrap();

        manager.release();
        assert_eq!(manager.state(), EmbedderState::Loaded);
        assert!(lease.embed("still usable").is_ok());

        drop(lease);
        assert_eq!(manager.state(), EmbedderState::Unloaded);
    }

    #[test]
    fn test_released_model_is_reclaimed() {
        let loader = ProbeLoader::default();
        let last = loader.last.clone();
        let manager = Arc::new(EmbedderManager::new(loader, ResidencyPolicy::ReleaseAfterUse));

        let lease = manager.acquire().unwrap();
        let weak = last.lock().unwrap().clone().unwrap();
        assert!(weak.upgrade().is_some());

        drop(lease);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_load_failure_stays_unloaded_and_retries() {
        let loader = ProbeLoader::default();
        let fail = loader.fail.clone();
        let manager = Arc::new(EmbedderManager::new(loader, ResidencyPolicy::KeepResident));

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(manager.acquire(), Err(EmbeddingError::Load(_))));
        assert_eq!(manager.state(), EmbedderState::Unloaded);
        assert_eq!(manager.active_leases(), 0);

        fail.store(false, Ordering::SeqCst);
        assert!(manager.acquire().is_ok());
        assert_eq!(manager.load_count(), 1);
    }

    #[test]
    fn test_concurrent_acquire_loads_once() {
        let loader = ProbeLoader {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let manager = Arc::new(EmbedderManager::new(loader, ResidencyPolicy::KeepResident));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let lease = manager.acquire().unwrap();
                    lease.embed("query").unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.load_count(), 1);
        assert_eq!(manager.active_leases(), 0);
    }
}
