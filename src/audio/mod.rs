//! Audio ingestion — WAV decode → mono downmix → 16 kHz resample.
//!
//! The transcription collaborator requires **16 kHz mono `f32`** samples in
//! `[-1, 1]`. This module turns an on-disk WAV file into exactly that:
//!
//! ```text
//! WAV bytes → decode (hound) → downmix channels → normalize peaks
//!           → resample to 16 kHz
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use speech_assess::audio::load_wav_mono_16k;
//!
//! let samples = load_wav_mono_16k("recording.wav").unwrap();
//! println!("{} samples ({:.1} s)", samples.len(), samples.len() as f32 / 16_000.0);
//! ```

pub mod resample;
pub mod wav;

pub use resample::{downmix_to_mono, resample};
pub use wav::{load_wav_mono_16k, AudioError, TARGET_SAMPLE_RATE};
