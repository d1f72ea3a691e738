//! `GenEngine` / `GenBackend` traits and the generation error taxonomy.
//!
//! A [`GenBackend`] knows how to turn a source identifier (a model file path)
//! into a loaded [`GenEngine`]. The split keeps the
//! [`ModelManager`](crate::llm::ModelManager) backend-agnostic: production
//! wires in [`CandleLlamaBackend`](crate::llm::CandleLlamaBackend), tests
//! wire in scripted fakes.

use std::fmt;

use crate::llm::request::GenerationRequest;

// ---------------------------------------------------------------------------
// GenError
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a model or generating text.
///
/// The `Display` and `std::error::Error` implementations are written by hand
/// rather than via `thiserror::Error` because the `LoadFailed` variant carries
/// a field literally named `source` that is a plain `String` (a model
/// identifier), not a nested error — `thiserror` would otherwise treat that
/// field as the error source and require `String: std::error::Error`.
#[derive(Debug, Clone)]
pub enum GenError {
    /// The backend failed to load the model for `source`.
    ///
    /// Emitted only after the manager's single forced-reload retry has also
    /// failed; terminates the pipeline run.
    LoadFailed {
        /// The source identifier that failed to load.
        source: String,
        /// Backend-specific failure description.
        reason: String,
    },

    /// A generation call was made while no model is live.
    NotLoaded,

    /// The supplied handle does not match the currently live model — it was
    /// issued before another source was acquired or before a release.
    StaleHandle(String),

    /// The engine failed mid-generation (resource exhaustion, backend error).
    /// Not a content error: malformed *text* is handled by the extraction
    /// layer, never here.
    Generation(String),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::LoadFailed { source, reason } => {
                write!(f, "failed to load model {source}: {reason}")
            }
            GenError::NotLoaded => write!(f, "no model is loaded"),
            GenError::StaleHandle(handle) => write!(f, "stale model handle for {handle}"),
            GenError::Generation(msg) => write!(f, "generation failed: {msg}"),
        }
    }
}

impl std::error::Error for GenError {}

// ---------------------------------------------------------------------------
// GenEngine trait
// ---------------------------------------------------------------------------

/// A loaded text-generation engine.
///
/// `generate` takes `&mut self` — engines hold mutable decode state (KV
/// caches) and are **not** safe for concurrent invocation. Serialization is
/// the [`ModelManager`](crate::llm::ModelManager)'s job; engines never see
/// overlapping calls.
pub trait GenEngine: Send {
    /// Run one generation call and return the raw produced text.
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, GenError>;
}

// ---------------------------------------------------------------------------
// GenBackend trait
// ---------------------------------------------------------------------------

/// Loads engines from source identifiers.
///
/// Implementors must be `Send + Sync`; the manager calls `load` under its
/// lock, so a backend is never asked to load two models at once.
pub trait GenBackend: Send + Sync {
    /// Load the model identified by `source` and return a ready engine.
    ///
    /// Must not leak partially-initialized state on failure — a failed load
    /// leaves nothing live.
    fn load(&self, source: &str) -> Result<Box<dyn GenEngine>, GenError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoEngine;

    impl GenEngine for EchoEngine {
        fn generate(&mut self, request: &GenerationRequest) -> Result<String, GenError> {
            Ok(request.prompt.clone())
        }
    }

    struct EchoBackend;

    impl GenBackend for EchoBackend {
        fn load(&self, _source: &str) -> Result<Box<dyn GenEngine>, GenError> {
            Ok(Box::new(EchoEngine))
        }
    }

    #[test]
    fn backend_and_engine_are_object_safe() {
        let backend: Box<dyn GenBackend> = Box::new(EchoBackend);
        let mut engine = backend.load("whatever").unwrap();
        let out = engine
            .generate(&GenerationRequest::new("ping"))
            .unwrap();
        assert_eq!(out, "ping");
    }

    #[test]
    fn error_display_names_the_source() {
        let e = GenError::LoadFailed {
            source: "models/a.gguf".into(),
            reason: "no such file".into(),
        };
        assert!(e.to_string().contains("models/a.gguf"));
        assert!(e.to_string().contains("no such file"));
    }

    #[test]
    fn stale_handle_display() {
        let e = GenError::StaleHandle("models/b.gguf".into());
        assert!(e.to_string().contains("stale"));
    }
}
