//! Capture configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use squash_core::{MAX_RING_FRAMES, MIN_RING_FRAMES};
use squash_export::{AudioFormat, DitherType, EncodeOptions, ProcessingParams};

/// What to do when the output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverwritePolicy {
    #[default]
    Forbid,
    Replace,
}

/// Capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub format: AudioFormat,
    /// Rate written to the file.
    pub sample_rate: u32,
    /// Rate of the blocks the host delivers.
    pub source_sample_rate: u32,
    /// 1 or 2, interleaved.
    pub channels: u16,
    pub normalize: bool,
    /// Peak target for normalisation, (0, 1].
    pub normalization_level: f32,
    pub dither: bool,
    /// Ring capacity in frames, 512..=65536.
    pub buffer_frames: usize,
    /// Largest block the host hands over at once.
    pub max_block_frames: usize,
    /// Safety ceiling; longer requests are clamped.
    pub max_duration_ms: u64,
    pub overwrite: OverwritePolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            sample_rate: 44100,
            source_sample_rate: 44100,
            channels: 2,
            normalize: true,
            normalization_level: 0.95,
            dither: true,
            buffer_frames: 1024,
            max_block_frames: 1024,
            max_duration_ms: 300_000,
            overwrite: OverwritePolicy::Forbid,
        }
    }
}

impl CaptureConfig {
    /// Same rate in and out.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self.source_sample_rate = sample_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.format
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        if self.channels == 0 || self.channels > 2 {
            return Err(Error::InvalidConfig(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.sample_rate == 0 || self.source_sample_rate == 0 {
            return Err(Error::InvalidConfig("sample rate must be non-zero".into()));
        }
        if !(self.normalization_level > 0.0 && self.normalization_level <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "normalization level {} outside (0, 1]",
                self.normalization_level
            )));
        }
        if !(MIN_RING_FRAMES..=MAX_RING_FRAMES).contains(&self.buffer_frames) {
            return Err(Error::InvalidConfig(format!(
                "buffer size {} outside {}..={} frames",
                self.buffer_frames, MIN_RING_FRAMES, MAX_RING_FRAMES
            )));
        }
        if self.max_block_frames == 0 {
            return Err(Error::InvalidConfig("max block size must be non-zero".into()));
        }
        if self.max_duration_ms == 0 {
            return Err(Error::InvalidConfig("max duration must be non-zero".into()));
        }
        Ok(())
    }

    /// Frames written for a capture of `duration_ms`, after clamping.
    pub fn target_frames(&self, duration_ms: u64) -> u64 {
        duration_ms.min(self.max_duration_ms) * self.sample_rate as u64 / 1000
    }

    pub(crate) fn encode_options(&self, processing: ProcessingParams) -> EncodeOptions {
        EncodeOptions {
            format: self.format,
            source_sample_rate: self.source_sample_rate,
            sample_rate: self.sample_rate,
            channels: self.channels,
            normalize: self.normalize.then_some(self.normalization_level),
            dither: if self.dither {
                DitherType::Triangular
            } else {
                DitherType::None
            },
            max_block_frames: self.max_block_frames,
            processing,
        }
    }
}
