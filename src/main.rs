//! Application entry point — speech-assess CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse CLI arguments and load [`AppConfig`] (default on first run).
//! 3. Decode the WAV recording to 16 kHz mono.
//! 4. Load the optional speaker profile.
//! 5. Load the Whisper transcriber.
//! 6. Construct the process's single [`ModelManager`] over the candle
//!    backend and build the [`AssessmentPipeline`].
//! 7. Run the pipeline and print the report as pretty JSON on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use speech_assess::audio::load_wav_mono_16k;
use speech_assess::config::{AppConfig, AppPaths};
use speech_assess::llm::{CandleLlamaBackend, ModelManager};
use speech_assess::pipeline::{AssessmentPipeline, ModelRoster};
use speech_assess::profile::SpeakerProfile;
use speech_assess::stt::{Transcriber, WhisperTranscriber};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Assess articulation from a recording and the text that was read.
#[derive(Debug, Parser)]
#[command(name = "speech-assess", version, about)]
struct Args {
    /// WAV recording of the speaker reading the reference text.
    audio: PathBuf,

    /// The reference text that was read.
    reference: String,

    /// Speaker questionnaire profile (JSON). Optional; the report degrades
    /// to a neutral insight without it.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Settings file to use instead of the platform default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use this GGUF file for all four model slots, overriding the config.
    #[arg(long)]
    model: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("speech-assess starting up");

    // 2. Arguments + configuration
    let args = Args::parse();
    let paths = AppPaths::new();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 3. Audio
    let audio = load_wav_mono_16k(&args.audio)
        .with_context(|| format!("decoding {}", args.audio.display()))?;
    log::info!(
        "decoded {} ({:.1} s of audio)",
        args.audio.display(),
        audio.len() as f32 / 16_000.0
    );

    // 4. Speaker profile (optional)
    let profile = match &args.profile {
        Some(path) => Some(
            SpeakerProfile::load_from(path)
                .with_context(|| format!("loading profile from {}", path.display()))?,
        ),
        None => None,
    };

    // 5. Transcriber
    let stt_model = resolve_model(&config.stt.model, &paths.models_dir);
    let stt: Arc<dyn Transcriber> = Arc::new(
        WhisperTranscriber::load(&stt_model, config.stt.language.as_str())
            .with_context(|| format!("loading Whisper model {}", stt_model.display()))?
            .with_threads(config.stt.n_threads),
    );

    // 6. Model manager + pipeline (exactly one manager for the process)
    let backend = CandleLlamaBackend::new().with_seed(config.generation.seed);
    let manager = Arc::new(ModelManager::new(Box::new(backend)));
    let pipeline = AssessmentPipeline::new(Arc::clone(&manager), stt, config.pipeline);

    let roster = match &args.model {
        Some(path) => ModelRoster::uniform(path.display().to_string()),
        None => ModelRoster::new(
            config
                .generation
                .generator_models
                .clone()
                .map(|m| resolve_model(&m, &paths.models_dir).display().to_string()),
            resolve_model(&config.generation.judge_model, &paths.models_dir)
                .display()
                .to_string(),
        ),
    };

    // 7. Run and report
    let result = pipeline
        .run(&audio, &args.reference, &roster, profile.as_ref())
        .await;

    // The model is released regardless of how the run ended.
    manager.release();

    match result {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            log::error!("assessment failed: {e}");
            Err(e.into())
        }
    }
}

/// Treat `name` as a path when it already points at a file, otherwise
/// resolve it inside the models directory.
fn resolve_model(name: &str, models_dir: &Path) -> PathBuf {
    let as_path = PathBuf::from(name);
    if as_path.exists() {
        as_path
    } else {
        models_dir.join(name)
    }
}
