//! Text-generation module — model lifecycle, engines and structured output.
//!
//! This module provides:
//! * [`GenerationRequest`] — immutable parameters for one generation call.
//! * [`GenEngine`] / [`GenBackend`] — engine and loader traits.
//! * [`CandleLlamaBackend`] — quantized GGUF llama inference via candle.
//! * [`ModelManager`] / [`ModelHandle`] — exclusive lifecycle control over
//!   the single loaded model (acquire / generate / release).
//! * [`extract`] — tolerant extraction of tagged JSON payloads from
//!   free-form generated text.
//! * [`GenError`] — error variants for generation operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use speech_assess::llm::{CandleLlamaBackend, GenerationRequest, ModelManager};
//!
//! let manager = ModelManager::new(Box::new(CandleLlamaBackend::new()));
//!
//! let handle = manager.acquire("models/llama-chat-q8.gguf").unwrap();
//! let request = GenerationRequest::new("Convert to IPA: \"butter\"")
//!     .max_tokens(100)
//!     .temperature(0.1);
//! let text = manager.generate(&handle, &request).unwrap();
//! println!("{text}");
//!
//! manager.release(); // idempotent — frees the weights
//! ```

pub mod candle_llama;
pub mod engine;
pub mod extract;
pub mod manager;
pub mod request;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use candle_llama::CandleLlamaBackend;
pub use engine::{GenBackend, GenEngine, GenError};
pub use extract::{extract_tagged, try_extract_tagged, Extracted};
pub use manager::{ModelHandle, ModelManager};
pub use request::GenerationRequest;
