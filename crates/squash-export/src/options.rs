//! Encoder options.

use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Container {
    #[default]
    Wav,
    Aiff,
    /// Headerless interleaved PCM, little-endian.
    Raw,
}

impl Container {
    /// File extension (without dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Wav => "wav",
            Container::Aiff => "aiff",
            Container::Raw => "pcm",
        }
    }

    /// Header size in bytes.
    pub fn header_len(&self) -> u64 {
        match self {
            Container::Wav => crate::format::WAV_HEADER_LEN,
            Container::Aiff => crate::format::AIFF_HEADER_LEN,
            Container::Raw => 0,
        }
    }
}

/// Bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitDepth {
    #[default]
    Int16,
    Int24,
    Float32,
}

impl BitDepth {
    /// Bits per sample.
    pub fn bits(&self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }

    pub fn is_float(&self) -> bool {
        matches!(self, BitDepth::Float32)
    }
}

/// Container plus sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioFormat {
    pub container: Container,
    pub bit_depth: BitDepth,
}

impl AudioFormat {
    pub const fn new(container: Container, bit_depth: BitDepth) -> Self {
        Self {
            container,
            bit_depth,
        }
    }

    pub const fn wav(bit_depth: BitDepth) -> Self {
        Self::new(Container::Wav, bit_depth)
    }

    pub const fn aiff(bit_depth: BitDepth) -> Self {
        Self::new(Container::Aiff, bit_depth)
    }

    pub const fn raw(bit_depth: BitDepth) -> Self {
        Self::new(Container::Raw, bit_depth)
    }

    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }

    pub fn bytes_per_frame(&self, channels: u16) -> usize {
        self.bit_depth.bytes() * channels as usize
    }

    /// Reject combinations the writers cannot produce.
    pub fn validate(&self) -> Result<()> {
        match (self.container, self.bit_depth) {
            (Container::Aiff, BitDepth::Float32) => Err(ExportError::UnsupportedFormat(
                "AIFF supports 16 and 24-bit integer PCM only".into(),
            )),
            #[cfg(not(feature = "aiff"))]
            (Container::Aiff, _) => Err(ExportError::UnsupportedFormat(
                "AIFF support not enabled".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Dithering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DitherType {
    None,
    Rectangular,
    #[default]
    Triangular,
}

/// Per-block processing applied ahead of quantisation.
///
/// Use [`ProcessingParams::sanitized`] before handing user values to the
/// pipeline; the pipeline sanitises on its own as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParams {
    /// Linear gain before the DC blocker, 0..=10.
    pub input_gain: f32,
    /// Linear gain after the limiter, 0..=10.
    pub output_gain: f32,
    pub limiter_enabled: bool,
    /// Linear ceiling, 0.1..=1.0.
    pub limiter_threshold: f32,
    /// 1..=1000 ms.
    pub limiter_release_ms: f32,
    pub dc_block_enabled: bool,
    /// 5..=200 Hz.
    pub dc_cutoff_hz: f32,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            input_gain: 1.0,
            output_gain: 1.0,
            limiter_enabled: true,
            limiter_threshold: 0.98,
            limiter_release_ms: 50.0,
            dc_block_enabled: true,
            dc_cutoff_hz: 20.0,
        }
    }
}

impl ProcessingParams {
    /// Everything off, unity gain.
    pub fn transparent() -> Self {
        Self {
            limiter_enabled: false,
            dc_block_enabled: false,
            ..Self::default()
        }
    }

    /// Clamp every field into its valid range. NaN falls back to the default.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let clamp = |v: f32, lo: f32, hi: f32, fallback: f32| {
            if v.is_nan() {
                fallback
            } else {
                v.clamp(lo, hi)
            }
        };

        Self {
            input_gain: clamp(self.input_gain, 0.0, 10.0, d.input_gain),
            output_gain: clamp(self.output_gain, 0.0, 10.0, d.output_gain),
            limiter_enabled: self.limiter_enabled,
            limiter_threshold: clamp(self.limiter_threshold, 0.1, 1.0, d.limiter_threshold),
            limiter_release_ms: clamp(self.limiter_release_ms, 1.0, 1000.0, d.limiter_release_ms),
            dc_block_enabled: self.dc_block_enabled,
            dc_cutoff_hz: clamp(self.dc_cutoff_hz, 5.0, 200.0, d.dc_cutoff_hz),
        }
    }
}

/// Encoder options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    pub format: AudioFormat,
    /// Rate of the blocks handed to the encoder.
    pub source_sample_rate: u32,
    /// Rate written to the file.
    pub sample_rate: u32,
    /// 1 or 2, interleaved.
    pub channels: u16,
    /// Peak level each block is scaled to, `None` to leave levels alone.
    pub normalize: Option<f32>,
    pub dither: DitherType,
    /// Largest block, in frames, the encoder will be handed.
    pub max_block_frames: usize,
    pub processing: ProcessingParams,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            source_sample_rate: 44100,
            sample_rate: 44100,
            channels: 2,
            normalize: None,
            dither: DitherType::Triangular,
            max_block_frames: 4096,
            processing: ProcessingParams::default(),
        }
    }
}

impl EncodeOptions {
    /// Whether resampling is needed.
    pub fn needs_resampling(&self) -> bool {
        self.source_sample_rate != self.sample_rate
    }

    /// Output frames per input frame.
    pub fn resample_ratio(&self) -> f64 {
        self.sample_rate as f64 / self.source_sample_rate as f64
    }

    /// Upper bound on frames produced from one maximal block.
    pub fn max_output_frames(&self) -> usize {
        if self.needs_resampling() {
            (self.max_block_frames as f64 * self.resample_ratio()).ceil() as usize + 2
        } else {
            self.max_block_frames
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;

        if self.channels == 0 || self.channels > 2 {
            return Err(ExportError::InvalidOptions(format!(
                "channel count {} (expected 1 or 2)",
                self.channels
            )));
        }
        if self.sample_rate == 0 || self.source_sample_rate == 0 {
            return Err(ExportError::InvalidOptions("sample rate must be non-zero".into()));
        }
        if self.max_block_frames == 0 {
            return Err(ExportError::InvalidOptions("max block size must be non-zero".into()));
        }
        if let Some(level) = self.normalize {
            if !(level > 0.0 && level <= 1.0) {
                return Err(ExportError::InvalidOptions(format!(
                    "normalization level {level} outside (0, 1]"
                )));
            }
        }
        Ok(())
    }
}
