/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Audio sources for simulated peers.
//!
//! A peer sends one of three tracks, in preference order: a decoded audio
//! file (looped), synthetic white noise, or silence. The track is plain
//! PCM; encoding is the media engine's concern.

use std::path::Path;
use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

const SYNTH_SAMPLE_RATE: u32 = 48_000;
const NOISE_SECONDS: usize = 2;

/// Failed to turn an audio file into a track.
#[derive(Debug, Clone, Error)]
#[error("audio source {path}: {reason}")]
pub struct AudioError {
    pub path: String,
    pub reason: String,
}

/// A continuous mono/stereo PCM track handed to the media engine.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub channels: u16,
    pub looped: bool,
}

impl AudioTrack {
    /// Decode a WAV file into a looped track.
    pub fn from_wav_file(path: &Path) -> Result<Self, AudioError> {
        let display = path.display().to_string();
        info!("audio: loading track from {display}");

        let mut reader = hound::WavReader::open(path).map_err(|e| AudioError {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let spec = reader.spec();

        let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
            hound::SampleFormat::Int => match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                    .collect(),
                32 => reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                    .collect(),
                bits => {
                    return Err(AudioError {
                        path: display,
                        reason: format!("unsupported bit depth {bits}"),
                    })
                }
            },
        };
        let samples = samples.map_err(|e| AudioError {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        info!(
            "audio: {display} -> {} samples at {} Hz, {} channel(s)",
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            samples: Arc::new(samples),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            looped: true,
        })
    }

    /// A looped buffer of uniform white noise in [-1, 1].
    pub fn white_noise() -> Self {
        let mut rng = SmallRng::from_entropy();
        let len = SYNTH_SAMPLE_RATE as usize * NOISE_SECONDS;
        let samples: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0..=1.0)).collect();
        Self {
            samples: Arc::new(samples),
            sample_rate: SYNTH_SAMPLE_RATE,
            channels: 1,
            looped: true,
        }
    }

    /// A looped zero-amplitude track.
    pub fn silence() -> Self {
        Self {
            samples: Arc::new(vec![0.0; SYNTH_SAMPLE_RATE as usize]),
            sample_rate: SYNTH_SAMPLE_RATE,
            channels: 1,
            looped: true,
        }
    }

    /// Select a track by configuration preference: file, then noise, then
    /// silence.
    pub fn select(audio_file: Option<&Path>, noise: bool) -> Result<Self, AudioError> {
        if let Some(path) = audio_file {
            Self::from_wav_file(path)
        } else if noise {
            Ok(Self::white_noise())
        } else {
            Ok(Self::silence())
        }
    }
}
