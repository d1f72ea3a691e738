//! STT (Speech-to-Text) collaborator module.
//!
//! [`Transcriber`] is the async interface the pipeline consumes; it is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>`. [`WhisperTranscriber`] is the production
//! implementation wrapping a `whisper_rs::WhisperContext`, with the blocking
//! inference pushed through `tokio::task::spawn_blocking`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use speech_assess::stt::{Transcriber, WhisperTranscriber};
//!
//! # async fn example() {
//! let stt = WhisperTranscriber::load("models/ggml-whisper-medium.bin", "en").unwrap();
//!
//! // audio: 16 kHz, mono, f32 PCM from the audio module
//! let audio = vec![0.0f32; 16_000]; // 1 s of silence
//! let text = stt.transcribe(&audio).await.unwrap();
//! println!("{text}");
//! # }
//! ```

pub mod engine;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{Transcriber, TranscriptionError, WhisperTranscriber};

// test-only re-export so other test modules can import MockTranscriber
// without the full engine path.
#[cfg(test)]
pub use engine::MockTranscriber;
