//! Speaker questionnaire profile — the optional side-channel input.
//!
//! [`SpeakerProfile`] holds the answers collected by the intake
//! questionnaire. The pipeline treats it as opaque: raw answers are never
//! echoed into free-text fields; only [`SpeakerProfile::summary_line`] — a
//! compact digest of the factors that affect speech motivation or
//! consistency — is ever embedded in a prompt. A missing profile degrades to
//! a neutral insight, never an error.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SpeakerProfile
// ---------------------------------------------------------------------------

/// Questionnaire answers, persisted as `profile.json`.
///
/// All fields are free-text or enum-like answer strings exactly as the form
/// collected them; none is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerProfile {
    /// How often people ask the speaker to repeat themselves.
    pub repeat_frequency: String,
    /// Which difficulty kinds the speaker self-reports.
    pub difficulty_kinds: Vec<String>,
    /// How much the difficulty affects daily life.
    pub speech_impact: String,
    /// Anxiety while speaking.
    pub anxious_speaking: String,
    /// Avoidance of social interaction due to speech.
    pub avoids_interaction: String,
    /// Frustration when misunderstood.
    pub frustration: String,
    /// Situations where speech is hardest.
    pub difficult_contexts: Vec<String>,
    /// Whether stress or tiredness worsens speech.
    pub worse_when_stressed: String,
    /// Preferred exercise styles.
    pub exercise_preferences: Vec<String>,
    /// Daily practice time budget.
    pub practice_time: String,
    /// Free-text final comments.
    pub comments: String,
}

impl SpeakerProfile {
    /// Load a profile from a JSON file.
    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// One-line digest of the emotionally relevant answers.
    ///
    /// This is the **only** profile-derived text that may enter a prompt —
    /// preferences and raw answers stay out by design of the summary stage.
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        if !self.speech_impact.is_empty() {
            parts.push(format!("daily-life impact: {}", self.speech_impact));
        }
        if !self.anxious_speaking.is_empty() {
            parts.push(format!("speaking anxiety: {}", self.anxious_speaking));
        }
        if !self.avoids_interaction.is_empty() {
            parts.push(format!("social avoidance: {}", self.avoids_interaction));
        }
        if !self.frustration.is_empty() {
            parts.push(format!("frustration when misunderstood: {}", self.frustration));
        }
        if !self.worse_when_stressed.is_empty() {
            parts.push(format!("worse under stress: {}", self.worse_when_stressed));
        }
        if parts.is_empty() {
            "no psychological factors reported".to_string()
        } else {
            parts.join("; ")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
