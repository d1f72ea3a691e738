//! speech-assess — articulation assessment from audio + reference text.
//!
//! Turns one audio sample and one reference sentence into a structured
//! phonetic-error report by chaining a speech-to-text pass with a series of
//! text-generation calls against a locally loaded model:
//!
//! ```text
//! WAV ─▶ Transcriber ─▶ IPA candidates ×3 (reference)  ┐
//!                       IPA candidates ×3 (spoken)     ├─▶ pair judge
//!                                                      ┘      │
//!                       SODA analyses ×3 ◀────────────────────┘
//!                             │
//!                       SODA judge ─▶ final report (JSON)
//! ```
//!
//! The hard part is not the phonetics — it is making free-text model output
//! behave like a structured service: [`llm::ModelManager`] owns the single
//! loaded model, [`llm::extract`] pulls tagged JSON payloads out of noisy
//! generations without ever failing hard, and [`pipeline::Consensus`] reduces
//! multiple independent generations to one verdict with deterministic
//! fallbacks.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speech_assess::config::AppConfig;
//! use speech_assess::llm::{CandleLlamaBackend, ModelManager};
//! use speech_assess::pipeline::{AssessmentPipeline, ModelRoster};
//! use speech_assess::stt::{Transcriber, WhisperTranscriber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let manager = Arc::new(ModelManager::new(Box::new(CandleLlamaBackend::new())));
//!     let stt: Arc<dyn Transcriber> =
//!         Arc::new(WhisperTranscriber::load("models/ggml-medium.bin", "en").unwrap());
//!
//!     let pipeline = AssessmentPipeline::new(manager, stt, config.pipeline);
//!     let roster = ModelRoster::uniform("models/llama-chat-q8.gguf");
//!     let audio = vec![0.0f32; 16_000]; // 16 kHz mono
//!
//!     let report = pipeline
//!         .run(&audio, "I saw Sam sitting on a bus", &roster, None)
//!         .await
//!         .unwrap();
//!     println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! }
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod profile;
pub mod stt;
