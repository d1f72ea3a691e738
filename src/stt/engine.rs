//! Core `Transcriber` trait and `WhisperTranscriber` implementation.
//!
//! # Overview
//!
//! [`Transcriber`] is the transcription collaborator consumed by the
//! pipeline. [`WhisperTranscriber`] is the production implementation that
//! wraps a `whisper_rs::WhisperContext`; construct it with
//! [`WhisperTranscriber::load`].
//!
//! [`MockTranscriber`] (available under `#[cfg(test)]`) returns a
//! pre-configured response — useful for unit-testing the pipeline without a
//! GGML model file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// TranscriptionError
// ---------------------------------------------------------------------------

/// All errors that can arise from the transcription collaborator.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription failed: {0}")]
    Inference(String),

    /// The supplied audio buffer is shorter than the minimum 0.5 s
    /// (8 000 samples at 16 kHz).
    #[error("audio too short — minimum 0.5 s (8 000 samples at 16 kHz)")]
    AudioTooShort,

    /// The supplied audio buffer exceeds the maximum 60 s
    /// (960 000 samples at 16 kHz).
    #[error("audio too long — maximum 60 s (960 000 samples at 16 kHz)")]
    AudioTooLong,
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Async interface for speech-to-text collaborators.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn Transcriber>`).
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples.
/// - Returns `Err(TranscriptionError::AudioTooShort)` when `audio.len() < 8_000`.
/// - Returns `Err(TranscriptionError::AudioTooLong)` when `audio.len() > 960_000`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` and return the raw text transcript.
    async fn transcribe(&self, audio: &[f32]) -> Result<String, TranscriptionError>;
}

// ---------------------------------------------------------------------------
// Audio length constants (16 kHz mono f32)
// ---------------------------------------------------------------------------

/// Minimum audio length: 0.5 s × 16 000 Hz = 8 000 samples.
const MIN_AUDIO_SAMPLES: usize = 8_000;
/// Maximum audio length: 60 s × 16 000 Hz = 960 000 samples.
const MAX_AUDIO_SAMPLES: usize = 960_000;

// ---------------------------------------------------------------------------
// WhisperTranscriber
// ---------------------------------------------------------------------------

/// Production transcriber that wraps a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every [`transcribe`] call so the
/// context can be shared across threads without locking; the blocking
/// inference pass runs on the tokio blocking thread pool.
///
/// [`transcribe`]: Transcriber::transcribe
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    language: String,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("language", &self.language)
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

impl WhisperTranscriber {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// # Errors
    ///
    /// - [`TranscriptionError::ModelNotFound`] — `model_path` does not exist.
    /// - [`TranscriptionError::ContextInit`]  — whisper-rs failed to load it.
    pub fn load(
        model_path: impl AsRef<Path>,
        language: impl Into<String>,
    ) -> Result<Self, TranscriptionError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(TranscriptionError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            TranscriptionError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| TranscriptionError::ContextInit(e.to_string()))?;

        Ok(Self {
            ctx: Arc::new(ctx),
            language: language.into(),
            n_threads: 4,
        })
    }

    /// Override the number of inference threads (defaults to 4).
    pub fn with_threads(mut self, n_threads: i32) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Synchronous inference pass — runs on the blocking thread pool.
    fn run_inference(
        ctx: &WhisperContext,
        language: &str,
        n_threads: i32,
        audio: &[f32],
    ) -> Result<String, TranscriptionError> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang: Option<&str> = if language == "auto" {
            None
        } else {
            Some(language)
        };
        fp.set_language(lang);
        fp.set_n_threads(n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| TranscriptionError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| TranscriptionError::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| TranscriptionError::Inference(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg_text = state
                .full_get_segment_text(i)
                .map_err(|e| TranscriptionError::Inference(format!("segment {i}: {e}")))?;
            text.push_str(&seg_text);
        }

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[f32]) -> Result<String, TranscriptionError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(TranscriptionError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(TranscriptionError::AudioTooLong);
        }

        let ctx = Arc::clone(&self.ctx);
        let language = self.language.clone();
        let n_threads = self.n_threads;
        let audio = audio.to_vec();

        tokio::task::spawn_blocking(move || {
            Self::run_inference(&ctx, &language, n_threads, &audio)
        })
        .await
        .map_err(|e| TranscriptionError::Inference(format!("inference task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response without loading any
/// model file.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, TranscriptionError>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: TranscriptionError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[f32]) -> Result<String, TranscriptionError> {
        // Enforce the audio-length contract even in the mock so that callers
        // are tested against it.
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(TranscriptionError::AudioTooShort);
        }
        if audio.len() > MAX_AUDIO_SAMPLES {
            return Err(TranscriptionError::AudioTooLong);
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
