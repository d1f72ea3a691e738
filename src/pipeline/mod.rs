//! Assessment pipeline — transcription, candidate generation, consensus.
//!
//! This module wires the full audio → STT → generation → report flow:
//!
//! ```text
//! AssessmentPipeline::run()
//!   ├─ Transcriber::transcribe            → normalized transcript
//!   ├─ Consensus::candidates ×2           → IPA CandidateSets (ref / spoken)
//!   ├─ Consensus::judge                   → IpaSelection
//!   ├─ soda attempts ×3 (errors + organs) → SodaAnalysis CandidateSet
//!   ├─ Consensus::judge                   → SodaVerdict
//!   └─ summary call                       → SodaSummary
//!                                           (breakdown derived from data
//!                                            when the report fails to parse)
//! ```
//!
//! Every stage that talks to the model goes through
//! [`Consensus`](consensus::Consensus), which serializes generation via the
//! [`ModelManager`](crate::llm::ModelManager) and applies the drop/retry and
//! judge-fallback policy. Stages run strictly in order; the only exits are
//! the typed failures in [`PipelineError`](runner::PipelineError).

pub mod consensus;
pub mod prompts;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use consensus::{CandidateSet, Consensus};
pub use runner::{AssessmentPipeline, ModelRoster, PipelineError, PipelineResult};
