//! WAV decoding and normalization.
//!
//! [`load_wav_mono_16k`] is the single entry point the CLI uses: it accepts
//! any sample format hound can read (8/16/24/32-bit int or f32, any channel
//! count, any rate) and produces 16 kHz mono `f32` in `[-1, 1]`.

use std::path::Path;

use thiserror::Error;

use super::resample::{downmix_to_mono, resample};

/// Sample rate the transcription collaborator requires.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors that can arise while reading an audio file.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The file could not be opened or is not a valid WAV container.
    #[error("failed to read WAV file: {0}")]
    Decode(String),

    /// The file decoded to zero samples.
    #[error("audio file contains no samples")]
    Empty,
}

impl From<hound::Error> for AudioError {
    fn from(e: hound::Error) -> Self {
        AudioError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// load_wav_mono_16k
// ---------------------------------------------------------------------------

/// Decode `path` and return 16 kHz mono `f32` samples in `[-1, 1]`.
///
/// Integer formats are scaled by their nominal full-scale value; if the
/// decoded signal still peaks above 1.0 (some encoders write hot floats) it
/// is normalized by the peak so downstream level assumptions hold.
pub fn load_wav_mono_16k(path: impl AsRef<Path>) -> Result<Vec<f32>, AudioError> {
    let mut reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(AudioError::from)?,
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(AudioError::from)?
        }
    };

    if interleaved.is_empty() {
        return Err(AudioError::Empty);
    }

    let mono = downmix_to_mono(&interleaved, spec.channels);
    let leveled = normalize_peak(mono);
    Ok(resample(&leveled, spec.sample_rate, TARGET_SAMPLE_RATE))
}

/// Scale `samples` down by the peak when it exceeds full scale.
fn normalize_peak(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 1.0 {
        for s in &mut samples {
            *s /= peak;
        }
    }
    samples
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
