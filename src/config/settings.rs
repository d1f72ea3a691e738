//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper transcription collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model file name under the models directory
    /// (e.g. `"ggml-whisper-medium.bin"`).
    pub model: String,
    /// Speech language as an ISO-639-1 code, or `"auto"` for Whisper's
    /// built-in language detection.
    pub language: String,
    /// Number of CPU threads for inference.
    pub n_threads: i32,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "ggml-whisper-medium.bin".into(),
            language: "en".into(),
            n_threads: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationConfig
// ---------------------------------------------------------------------------

/// Settings for the text-generation stages.
///
/// Four model source identifiers are expected: three generator slots and one
/// judge slot. In the common deployment all four point at the same GGUF file;
/// the [`crate::llm::ModelManager`] only reloads when the identifier actually
/// changes, so a uniform roster costs a single load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model file names for the three generator slots, resolved against the
    /// models directory.
    pub generator_models: [String; 3],
    /// Model file name for the judge/evaluator slot.
    pub judge_model: String,
    /// Sampling seed. Fixed by default so repeated runs over the same audio
    /// are comparable.
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let model = "llama-chat-q8.gguf".to_string();
        Self {
            generator_models: [model.clone(), model.clone(), model.clone()],
            judge_model: model,
            seed: 299_792_458,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Policy knobs for candidate generation and consensus.
///
/// The defaults encode the shipped behaviour: 3 independent candidates per
/// stage, all 3 required before a judge call, and one retry per phonetic
/// attempt before it is dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Independent generation attempts per candidate stage.
    pub candidates: usize,
    /// Minimum successfully parsed candidates a consolidation stage needs;
    /// fewer aborts the run.
    pub quorum: usize,
    /// Total tries per phonetic attempt (first try + retries) before the
    /// attempt is dropped.
    pub attempt_tries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidates: 3,
            quorum: 3,
            attempt_tries: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speech_assess::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transcription settings.
    pub stt: SttConfig,
    /// Text-generation settings.
    pub generation: GenerationConfig,
    /// Candidate/consensus policy.
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stt: SttConfig::default(),
            generation: GenerationConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
