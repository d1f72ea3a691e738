//! SODA articulation-error taxonomy and report types.
//!
//! All wire-facing structs double as the JSON contract the generation
//! prompts ask the model to emit, so serde names here and key names in
//! [`crate::pipeline::prompts`] must stay in sync.

use serde::{Deserialize, Deserializer, Serialize};

/// The fixed speech-organ vocabulary. Organ lists coming back from the model
/// are filtered against this set; anything else is discarded.
pub const ORGANS: &[&str] = &["lips", "teeth", "tongue", "palate", "velum", "glottis"];

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Articulation-error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// One sound replaced by another (e.g. "wabbit" for "rabbit").
    Substitution,
    /// A sound left out entirely.
    Omission,
    /// A sound produced imprecisely but recognisably.
    Distortion,
    /// An extra sound inserted (e.g. "buhlack" for "black").
    Addition,
}

// ---------------------------------------------------------------------------
// ArticulationError
// ---------------------------------------------------------------------------

/// One detected articulation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticulationError {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// The expected sound (IPA symbol or cluster).
    pub original_sound: String,
    /// The sound actually produced.
    pub produced_sound: String,
    /// Phoneme or word index; models emit either a number or a string, so
    /// both are accepted and kept as text.
    #[serde(deserialize_with = "position_as_string")]
    pub position: String,
}

/// Accept `"3"`, `3` or `3.0` for the position field.
fn position_as_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "position must be a string or number, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// SodaAnalysis
// ---------------------------------------------------------------------------

/// One full articulation analysis: the detected errors plus the speech
/// organs implicated in producing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SodaAnalysis {
    /// Detected errors, in utterance order.
    #[serde(default)]
    pub errors: Vec<ArticulationError>,
    /// Affected speech organs, filtered to [`ORGANS`].
    #[serde(default)]
    pub affected_organs: Vec<String>,
}

impl SodaAnalysis {
    /// An analysis with no errors and no organs — the degraded sub-step value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Drop organ entries outside the fixed vocabulary (case-insensitive
    /// match, stored lowercased) and de-duplicate while keeping order.
    pub fn retain_known_organs(&mut self) {
        let mut seen = Vec::new();
        self.affected_organs.retain(|o| {
            let lower = o.to_lowercase();
            let keep = ORGANS.contains(&lower.as_str()) && !seen.contains(&lower);
            if keep {
                seen.push(lower);
            }
            keep
        });
        for o in &mut self.affected_organs {
            *o = o.to_lowercase();
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorBreakdown
// ---------------------------------------------------------------------------

/// Per-category error counts.
///
/// [`ErrorBreakdown::count`] is the deterministic derivation the final
/// summary falls back to when the model's report fails to parse — counted
/// from data, never guessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBreakdown {
    pub substitution: u32,
    pub omission: u32,
    pub distortion: u32,
    pub addition: u32,
}

impl ErrorBreakdown {
    /// Count `errors` by category.
    pub fn count(errors: &[ArticulationError]) -> Self {
        let mut breakdown = Self::default();
        for e in errors {
            match e.kind {
                ErrorKind::Substitution => breakdown.substitution += 1,
                ErrorKind::Omission => breakdown.omission += 1,
                ErrorKind::Distortion => breakdown.distortion += 1,
                ErrorKind::Addition => breakdown.addition += 1,
            }
        }
        breakdown
    }

    /// Total errors across all categories.
    pub fn total(&self) -> u32 {
        self.substitution + self.omission + self.distortion + self.addition
    }
}

// ---------------------------------------------------------------------------
// AccuracyRating
// ---------------------------------------------------------------------------

/// Qualitative articulation accuracy, three-level scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyRating {
    High,
    Moderate,
    Low,
}

// ---------------------------------------------------------------------------
// SodaSummary
// ---------------------------------------------------------------------------

/// The final structured report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SodaSummary {
    /// Total number of articulation errors.
    pub total_errors: u32,
    /// Per-category counts.
    pub error_breakdown: ErrorBreakdown,
    /// Most affected speech organs.
    pub most_affected_organs: Vec<String>,
    /// Qualitative accuracy rating.
    pub accuracy: AccuracyRating,
    /// Short free-text insight (profile-aware when a profile was supplied).
    pub insight: String,
    /// Suggested practice exercises.
    #[serde(default)]
    pub exercises: Vec<String>,
}

// ---------------------------------------------------------------------------
// SodaVerdict
// ---------------------------------------------------------------------------

/// Judge verdict over a set of candidate analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SodaVerdict {
    /// Index of the chosen candidate.
    pub selected: usize,
    /// Judge confidence, 1–10.
    pub confidence: u8,
    /// The merged / selected analysis.
    pub consolidated: SodaAnalysis,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
