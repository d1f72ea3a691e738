//! Model lifecycle manager — at most one loaded model, serialized access.
//!
//! The underlying generation resource is large (gigabytes of weights,
//! device memory included) and cannot safely serve concurrent calls, so
//! [`ModelManager`] enforces two invariants behind a single mutex:
//!
//! 1. **At most one model is live at any instant.** Acquiring a different
//!    source first releases the old engine (dropping it frees the weights)
//!    before the new one is loaded.
//! 2. **All generation calls are mutually exclusive.** The lock is held for
//!    the full duration of a `generate` call; concurrent callers queue.
//!
//! The application constructs exactly one manager and injects it wherever
//! generation is needed — there is no hidden global. Handles returned by
//! [`acquire`](ModelManager::acquire) are invalidated by any later acquire of
//! a different source or by [`release`](ModelManager::release); using one
//! afterwards fails with a stale-handle error instead of silently talking to
//! the wrong model.

use std::sync::Mutex;

use crate::llm::engine::{GenBackend, GenEngine, GenError};
use crate::llm::request::GenerationRequest;

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// Opaque reference to the currently loaded model.
///
/// Cheap to clone; validity is checked on every
/// [`generate`](ModelManager::generate) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    source: String,
    generation: u64,
}

impl ModelHandle {
    /// The source identifier this handle was issued for.
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ---------------------------------------------------------------------------
// ModelManager
// ---------------------------------------------------------------------------

/// Slot state guarded by the manager's mutex.
struct Slot {
    engine: Option<Box<dyn GenEngine>>,
    source: Option<String>,
    /// Bumped on every successful load; handles carry the value they were
    /// issued under, which is how stale handles are detected.
    generation: u64,
}

impl Slot {
    /// Drop the live engine (freeing its weights) and clear the identifier.
    /// Safe to call when nothing is loaded.
    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            log::info!("releasing model {source}");
        }
        self.engine = None;
    }
}

/// Owns the single loaded generation engine and serializes all access to it.
///
/// ```rust,no_run
/// use speech_assess::llm::{CandleLlamaBackend, GenerationRequest, ModelManager};
///
/// let manager = ModelManager::new(Box::new(CandleLlamaBackend::new()));
/// let handle = manager.acquire("models/llama-chat-q8.gguf").unwrap();
/// let text = manager
///     .generate(&handle, &GenerationRequest::new("prompt").max_tokens(64))
///     .unwrap();
/// manager.release();
/// # let _ = text;
/// ```
pub struct ModelManager {
    backend: Box<dyn GenBackend>,
    slot: Mutex<Slot>,
}

impl ModelManager {
    /// Create a manager with nothing loaded.
    ///
    /// The application should construct exactly one of these for its
    /// lifetime; every live/not-live observation goes through it.
    pub fn new(backend: Box<dyn GenBackend>) -> Self {
        Self {
            backend,
            slot: Mutex::new(Slot {
                engine: None,
                source: None,
                generation: 0,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // acquire
    // -----------------------------------------------------------------------

    /// Ensure the model for `source` is loaded and return a handle to it.
    ///
    /// - Same source already live → the existing engine is reused, no reload.
    /// - Different source live → the old engine is released first, then the
    ///   new one is loaded.
    /// - Load failure → one retry after a forced release; if that also fails,
    ///   nothing is left live and [`GenError::LoadFailed`] is returned.
    pub fn acquire(&self, source: &str) -> Result<ModelHandle, GenError> {
        let mut slot = self.slot.lock().unwrap();

        if slot.engine.is_some() && slot.source.as_deref() == Some(source) {
            log::debug!("model {source} already live — reusing");
            return Ok(ModelHandle {
                source: source.to_string(),
                generation: slot.generation,
            });
        }

        // Either nothing is loaded or a different source is live; the old
        // engine must be gone before the new load starts.
        slot.release();

        let engine = match self.backend.load(source) {
            Ok(engine) => engine,
            Err(first) => {
                log::warn!("model load failed ({first}); retrying once after forced release");
                slot.release();
                self.backend.load(source)?
            }
        };

        slot.generation += 1;
        slot.engine = Some(engine);
        slot.source = Some(source.to_string());
        log::info!("model {source} loaded (generation {})", slot.generation);

        Ok(ModelHandle {
            source: source.to_string(),
            generation: slot.generation,
        })
    }

    // -----------------------------------------------------------------------
    // generate
    // -----------------------------------------------------------------------

    /// Run one generation call against the live model.
    ///
    /// Fails with [`GenError::NotLoaded`] when nothing is live and
    /// [`GenError::StaleHandle`] when `handle` predates the current load.
    /// The slot lock is held for the whole call, so generation calls are
    /// serialized process-wide.
    pub fn generate(
        &self,
        handle: &ModelHandle,
        request: &GenerationRequest,
    ) -> Result<String, GenError> {
        let mut slot = self.slot.lock().unwrap();

        if slot.engine.is_none() {
            return Err(GenError::NotLoaded);
        }
        if handle.generation != slot.generation
            || slot.source.as_deref() != Some(handle.source.as_str())
        {
            return Err(GenError::StaleHandle(handle.source.clone()));
        }

        let engine = slot.engine.as_mut().ok_or(GenError::NotLoaded)?;
        engine.generate(request)
    }

    // -----------------------------------------------------------------------
    // release
    // -----------------------------------------------------------------------

    /// Release the live model, freeing its resources.
    ///
    /// Idempotent: calling with nothing loaded is a no-op. A subsequent
    /// [`acquire`](Self::acquire) reloads from scratch.
    pub fn release(&self) {
        self.slot.lock().unwrap().release();
    }

    /// Source identifier of the live model, if any.
    pub fn live_source(&self) -> Option<String> {
        self.slot.lock().unwrap().source.clone()
    }
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("live_source", &self.live_source())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Engine that reports which source it was loaded from and bumps a drop
    /// counter on release.
    struct ProbeEngine {
        source: String,
        drops: Arc<AtomicUsize>,
    }

    impl GenEngine for ProbeEngine {
        fn generate(&mut self, request: &GenerationRequest) -> Result<String, GenError> {
            Ok(format!("{}:{}", self.source, request.prompt))
        }
    }

    impl Drop for ProbeEngine {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Backend with load/drop counters and an optional number of initial
    /// failures per source.
    struct ProbeBackend {
        loads: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
        fail_first: AtomicUsize,
    }

    impl ProbeBackend {
        fn new() -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                drops: Arc::new(AtomicUsize::new(0)),
                fail_first: AtomicUsize::new(0),
            }
        }

        fn failing(times: usize) -> Self {
            let b = Self::new();
            b.fail_first.store(times, Ordering::SeqCst);
            b
        }
    }

    impl GenBackend for ProbeBackend {
        fn load(&self, source: &str) -> Result<Box<dyn GenEngine>, GenError> {
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(GenError::LoadFailed {
                    source: source.to_string(),
                    reason: "injected failure".into(),
                });
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ProbeEngine {
                source: source.to_string(),
                drops: Arc::clone(&self.drops),
            }))
        }
    }

    fn probe_manager() -> (ModelManager, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let backend = ProbeBackend::new();
        let loads = Arc::clone(&backend.loads);
        let drops = Arc::clone(&backend.drops);
        (ModelManager::new(Box::new(backend)), loads, drops)
    }

    // -----------------------------------------------------------------------
    // acquire
    // -----------------------------------------------------------------------

    #[test]
    fn acquire_same_source_loads_once() {
        let (manager, loads, _) = probe_manager();

        let h1 = manager.acquire("model-a").unwrap();
        let h2 = manager.acquire("model-a").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(h1, h2);
    }

    #[test]
    fn acquire_different_source_releases_old_first() {
        let (manager, loads, drops) = probe_manager();

        manager.acquire("model-a").unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        manager.acquire("model-b").unwrap();

        // Exactly one release (model-a) before the second load.
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(manager.live_source().as_deref(), Some("model-b"));
    }

    #[test]
    fn failed_load_is_retried_once() {
        let backend = ProbeBackend::failing(1);
        let loads = Arc::clone(&backend.loads);
        let manager = ModelManager::new(Box::new(backend));

        let handle = manager.acquire("model-a").expect("retry should succeed");
        assert_eq!(handle.source(), "model-a");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn double_load_failure_leaves_nothing_live() {
        let backend = ProbeBackend::failing(2);
        let manager = ModelManager::new(Box::new(backend));

        let err = manager.acquire("model-a").unwrap_err();
        assert!(matches!(err, GenError::LoadFailed { .. }));
        assert!(manager.live_source().is_none());

        // A generate call against the empty slot reports NotLoaded.
        let stale = ModelHandle {
            source: "model-a".into(),
            generation: 1,
        };
        let err = manager
            .generate(&stale, &GenerationRequest::new("p"))
            .unwrap_err();
        assert!(matches!(err, GenError::NotLoaded));
    }

    // -----------------------------------------------------------------------
    // generate
    // -----------------------------------------------------------------------

    #[test]
    fn generate_routes_to_live_engine() {
        let (manager, _, _) = probe_manager();
        let handle = manager.acquire("model-a").unwrap();

        let out = manager
            .generate(&handle, &GenerationRequest::new("ping"))
            .unwrap();
        assert_eq!(out, "model-a:ping");
    }

    #[test]
    fn generate_with_stale_handle_fails() {
        let (manager, _, _) = probe_manager();

        let old = manager.acquire("model-a").unwrap();
        manager.acquire("model-b").unwrap();

        let err = manager
            .generate(&old, &GenerationRequest::new("p"))
            .unwrap_err();
        assert!(matches!(err, GenError::StaleHandle(_)));
    }

    #[test]
    fn generate_after_release_fails_not_loaded() {
        let (manager, _, _) = probe_manager();

        let handle = manager.acquire("model-a").unwrap();
        manager.release();

        let err = manager
            .generate(&handle, &GenerationRequest::new("p"))
            .unwrap_err();
        assert!(matches!(err, GenError::NotLoaded));
    }

    #[test]
    fn reacquire_after_release_reloads_and_revalidates() {
        let (manager, loads, _) = probe_manager();

        let h1 = manager.acquire("model-a").unwrap();
        manager.release();
        let h2 = manager.acquire("model-a").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        // The pre-release handle is stale; the fresh one works.
        assert!(matches!(
            manager.generate(&h1, &GenerationRequest::new("p")),
            Err(GenError::StaleHandle(_))
        ));
        assert!(manager.generate(&h2, &GenerationRequest::new("p")).is_ok());
    }

    // -----------------------------------------------------------------------
    // release
    // -----------------------------------------------------------------------

    #[test]
    fn release_is_idempotent() {
        let (manager, _, drops) = probe_manager();

        // Nothing loaded yet — both calls are no-ops.
        manager.release();
        manager.release();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        manager.acquire("model-a").unwrap();
        manager.release();
        manager.release();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(manager.live_source().is_none());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelManager>();
    }

    #[test]
    fn concurrent_generates_all_complete() {
        let (manager, _, _) = probe_manager();
        let manager = Arc::new(manager);
        let handle = manager.acquire("model-a").unwrap();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let handle = handle.clone();
                std::thread::spawn(move || {
                    manager
                        .generate(&handle, &GenerationRequest::new(format!("p{i}")))
                        .unwrap()
                })
            })
            .collect();

        for t in threads {
            let out = t.join().unwrap();
            assert!(out.starts_with("model-a:"));
        }
    }
}
