//! Articulation-analysis data model.
//!
//! Types shared by the pipeline stages and the final report:
//!
//! * [`ErrorKind`] — the four-way articulation-error taxonomy
//!   (Substitution / Omission / Distortion / Addition).
//! * [`ArticulationError`] / [`SodaAnalysis`] — one detected error and one
//!   full per-attempt analysis (errors + affected speech organs).
//! * [`ErrorBreakdown`] — deterministic per-category counts; this is what
//!   the final-summary fallback derives from data instead of guessing.
//! * [`SodaSummary`] — the structured end report.
//! * [`IpaSelection`] / [`SodaVerdict`] — judge-call verdicts.
//! * [`extract_ipa`] — slash-delimited phonetic transcription extraction.

pub mod ipa;
pub mod soda;

pub use ipa::{extract_ipa, IpaSelection};
pub use soda::{
    AccuracyRating, ArticulationError, ErrorBreakdown, ErrorKind, SodaAnalysis, SodaSummary,
    SodaVerdict, ORGANS,
};
