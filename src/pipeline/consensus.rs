//! Candidate generation and judge consensus.
//!
//! The pipeline repeatedly needs the same shape of work: run a generation
//! call `k` times, keep the attempts whose output parses, then ask one more
//! generation call — the judge — to select or merge among them. [`Consensus`]
//! implements that shape once:
//!
//! * an attempt whose output fails to parse is retried up to a bounded
//!   number of tries and then **dropped**, not replaced — best effort toward
//!   a minimum viable quorum, never unbounded latency;
//! * engine failures mid-generation count as failed tries; model *load*
//!   failures always propagate (the run cannot continue without a model);
//! * a judge whose verdict fails to parse (or whose call fails) yields the
//!   caller's deterministic fallback, so a consolidation stage always has a
//!   usable verdict.
//!
//! Generation runs on the blocking thread pool and is serialized process-wide
//! by the [`ModelManager`]; dispatching attempts sequentially here adds no
//! latency over any alternative.

use std::sync::Arc;

use serde::Serialize;

use crate::llm::{GenError, GenerationRequest, ModelManager};

// ---------------------------------------------------------------------------
// CandidateSet
// ---------------------------------------------------------------------------

/// Ordered collection of successfully parsed candidates, one per surviving
/// generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandidateSet<T> {
    items: Vec<T>,
}

impl<T> CandidateSet<T> {
    /// Wrap the surviving candidates in attempt order.
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Number of surviving candidates.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when every attempt was dropped.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Candidate at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// All candidates as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterate over the candidates.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Runs candidate attempts and judge calls against the shared model manager.
pub struct Consensus {
    manager: Arc<ModelManager>,
}

impl Consensus {
    /// Wrap the process's model manager.
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    // -----------------------------------------------------------------------
    // Single serialized generation call
    // -----------------------------------------------------------------------

    /// Acquire `source` and run one generation call on the blocking pool.
    ///
    /// Acquire-and-generate happen in the same blocking task so the async
    /// runtime never stalls on model work.
    pub async fn generate(
        &self,
        source: &str,
        request: GenerationRequest,
    ) -> Result<String, GenError> {
        let manager = Arc::clone(&self.manager);
        let source = source.to_string();

        tokio::task::spawn_blocking(move || {
            let handle = manager.acquire(&source)?;
            manager.generate(&handle, &request)
        })
        .await
        .map_err(|e| GenError::Generation(format!("generation task failed: {e}")))?
    }

    // -----------------------------------------------------------------------
    // Candidate attempts
    // -----------------------------------------------------------------------

    /// Run one generation attempt per `(source, request)` pair, parse each
    /// with `parse`, and keep the survivors in attempt order.
    ///
    /// Each attempt gets up to `tries` generation calls before it is
    /// dropped. The returned set may be shorter than the attempt list; the
    /// caller decides whether its quorum is met.
    pub async fn candidates<T, P>(
        &self,
        attempts: Vec<(String, GenerationRequest)>,
        tries: u32,
        parse: P,
    ) -> Result<CandidateSet<T>, GenError>
    where
        P: Fn(&str) -> Option<T>,
    {
        let mut items = Vec::with_capacity(attempts.len());

        for (index, (source, request)) in attempts.into_iter().enumerate() {
            match self.attempt(&source, &request, tries, &parse).await? {
                Some(item) => items.push(item),
                None => {
                    log::warn!("candidate attempt {index} dropped after {tries} tries");
                }
            }
        }

        Ok(CandidateSet::new(items))
    }

    /// One attempt: up to `tries` generation calls, first parse wins.
    ///
    /// Only unparseable *output* earns a retry (a semantic re-ask). An
    /// engine failure drops the attempt outright — transport-level errors
    /// are never resent; load / handle failures propagate immediately.
    async fn attempt<T, P>(
        &self,
        source: &str,
        request: &GenerationRequest,
        tries: u32,
        parse: &P,
    ) -> Result<Option<T>, GenError>
    where
        P: Fn(&str) -> Option<T>,
    {
        for try_no in 1..=tries {
            match self.generate(source, request.clone()).await {
                Ok(text) => {
                    if let Some(value) = parse(&text) {
                        return Ok(Some(value));
                    }
                    log::debug!("attempt output unparseable (try {try_no}/{tries})");
                }
                Err(GenError::Generation(reason)) => {
                    log::warn!("generation call failed ({reason}); dropping attempt");
                    return Ok(None);
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Judge call
    // -----------------------------------------------------------------------

    /// One judge call over previously generated candidates.
    ///
    /// Returns `parse`'s verdict when the output is usable; otherwise the
    /// deterministic `fallback` — this method only fails when the judge
    /// model cannot be loaded at all.
    pub async fn judge<T, P>(
        &self,
        source: &str,
        request: GenerationRequest,
        parse: P,
        fallback: T,
    ) -> Result<T, GenError>
    where
        P: Fn(&str) -> Option<T>,
    {
        match self.generate(source, request).await {
            Ok(text) => match parse(&text) {
                Some(verdict) => Ok(verdict),
                None => {
                    log::warn!("judge verdict unparseable — using fallback verdict");
                    Ok(fallback)
                }
            },
            Err(GenError::Generation(reason)) => {
                log::warn!("judge call failed ({reason}) — using fallback verdict");
                Ok(fallback)
            }
            Err(fatal) => Err(fatal),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
