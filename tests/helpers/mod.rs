//! Test helpers and fixtures for tapesquash integration tests
//!
//! Capture runs are driven manually, one block per call, so every test is
//! deterministic and needs no audio hardware.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `INT16_EPSILON` / `INT24_EPSILON`: One quantization step
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use tapesquash::prelude::*;
use tapesquash::{CaptureSession, TrackConfig};

/// Default test sample rate
pub const TEST_SAMPLE_RATE: u32 = 48000;

/// Block size handed to the session per call
pub const TEST_BLOCK_FRAMES: usize = 512;

/// Capture config with every level-changing stage off, so decoded output
/// can be compared against the input sample by sample.
pub fn transparent_config(format: AudioFormat, channels: u16) -> CaptureConfig {
    CaptureConfig {
        format,
        channels,
        normalize: false,
        dither: false,
        ..CaptureConfig::default().with_sample_rate(TEST_SAMPLE_RATE)
    }
}

/// Generate a mono sine wave.
pub fn generate_sine(frequency: f64, amplitude: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * amplitude
        })
        .collect()
}

/// Interleave a mono signal into `channels` identical channels.
pub fn interleave(mono: &[f32], channels: usize) -> Vec<f32> {
    mono.iter()
        .flat_map(|&s| std::iter::repeat(s).take(channels))
        .collect()
}

/// Feed `signal` to the session block by block until it stops recording or
/// the signal runs out. Returns frames handed over.
pub fn drive_session(session: &mut CaptureSession, signal: &[f32], channels: usize) -> usize {
    let mut fed = 0;
    for block in signal.chunks(TEST_BLOCK_FRAMES * channels) {
        if !session.is_active() {
            break;
        }
        let frames = block.len() / channels;
        if session.process_audio_block(block, frames) {
            fed += frames;
        }
    }
    fed
}

/// Eight tracks with a different density on each, as a drum pattern would be.
///
/// Track `t` has a note every `t + 1` steps; tracks 6 and 7 carry effects.
pub fn busy_pattern() -> Pattern {
    let mut pattern = Pattern::new(8).expect("pattern");
    for track in 0..8 {
        for step in (0..16).step_by(track + 1) {
            pattern
                .set_note(track, step, 36 + track as u8, 100)
                .expect("note");
        }
    }
    for track in [6, 7] {
        pattern
            .set_track_config(
                track,
                TrackConfig {
                    effect_count: 2,
                    priority: None,
                    muted: false,
                },
            )
            .expect("config");
    }
    pattern
}

/// Sample loader that records what it was given and hands out slots in order.
#[derive(Debug, Default)]
pub struct MockLoader {
    pub loaded: Vec<(usize, u32, String)>,
    pub next_slot: u8,
    pub fail: bool,
}

impl SampleLoader for MockLoader {
    fn load(&mut self, audio: CapturedAudio, source: &str) -> Result<u8> {
        if self.fail {
            return Err(Error::Loader("all slots in use".into()));
        }
        self.loaded
            .push((audio.frames(), audio.sample_rate, source.to_string()));
        let slot = self.next_slot;
        self.next_slot += 1;
        Ok(slot)
    }
}

/// Read a big-endian u32 at `offset`.
pub fn u32_be(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Read a little-endian u32 at `offset`.
pub fn u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
