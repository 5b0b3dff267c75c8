//! Block encoder: gain, DC block, limiter, metering, SRC, normalisation,
//! dither and quantisation, in that order.

use crate::dsp::{
    apply_dither, apply_gain, normalize_peak, DcBlocker, DitherState, Limiter, LinearResampler,
};
use crate::error::{ExportError, Result};
use crate::format::{encode_samples, ContainerSpec, Endian};
use crate::options::{DitherType, EncodeOptions, ProcessingParams};
use squash_core::{LevelMeter, LevelSnapshot};

/// Output of one [`EncodePipeline::process_block`] call.
#[derive(Debug)]
pub struct EncodedBlock<'a> {
    /// Frames produced (after resampling).
    pub frames: usize,
    /// Processed interleaved samples, before quantisation.
    pub samples: &'a [f32],
    /// Container-ready sample bytes.
    pub bytes: &'a [u8],
}

/// Stateful per-block encoder.
///
/// All scratch buffers are sized in [`EncodePipeline::new`]; processing a
/// block never allocates.
pub struct EncodePipeline {
    options: EncodeOptions,
    params: ProcessingParams,
    channels: usize,
    endian: Endian,

    dc_blocker: DcBlocker,
    limiter: Limiter,
    resampler: Option<LinearResampler>,
    dither: DitherState,
    meter: LevelMeter,

    work: Vec<f32>,
    output: Vec<f32>,
    encoded: Vec<u8>,

    frames_in: u64,
    frames_out: u64,
}

impl EncodePipeline {
    pub fn new(options: EncodeOptions) -> Result<Self> {
        options.validate()?;

        let channels = options.channels as usize;
        let params = options.processing.sanitized();
        let rate = options.source_sample_rate;
        let max_out = options.max_output_frames().max(options.max_block_frames);

        let resampler = options
            .needs_resampling()
            .then(|| LinearResampler::new(rate, options.sample_rate, channels));
        let dither = match (options.dither, options.format.bit_depth.is_float()) {
            (_, true) => DitherType::None,
            (d, false) => d,
        };

        Ok(Self {
            dc_blocker: DcBlocker::new(params.dc_cutoff_hz, rate, channels),
            limiter: Limiter::new(
                params.limiter_threshold,
                params.limiter_release_ms,
                rate,
                channels,
            ),
            resampler,
            dither: DitherState::new(dither),
            meter: LevelMeter::new(),
            work: vec![0.0; options.max_block_frames * channels],
            output: vec![0.0; max_out * channels],
            encoded: Vec::with_capacity(max_out * options.format.bytes_per_frame(options.channels)),
            endian: Endian::for_container(options.format.container),
            channels,
            params,
            options,
            frames_in: 0,
            frames_out: 0,
        })
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn params(&self) -> &ProcessingParams {
        &self.params
    }

    /// Swap processing parameters. Filter and limiter state carry over.
    pub fn set_params(&mut self, params: ProcessingParams) {
        let params = params.sanitized();
        let rate = self.options.source_sample_rate;
        self.dc_blocker.set_cutoff(params.dc_cutoff_hz, rate);
        self.limiter
            .set_params(params.limiter_threshold, params.limiter_release_ms, rate);
        self.params = params;
        self.options.processing = params;
    }

    /// Header description for the container this pipeline feeds.
    pub fn container_spec(&self) -> ContainerSpec {
        ContainerSpec {
            format: self.options.format,
            sample_rate: self.options.sample_rate,
            channels: self.options.channels,
        }
    }

    pub fn levels(&self) -> LevelSnapshot {
        self.meter.snapshot()
    }

    pub fn frames_in(&self) -> u64 {
        self.frames_in
    }

    pub fn frames_out(&self) -> u64 {
        self.frames_out
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.options.format.bytes_per_frame(self.options.channels)
    }

    /// Run one interleaved block through every stage.
    pub fn process_block(&mut self, input: &[f32]) -> Result<EncodedBlock<'_>> {
        let ch = self.channels;
        if input.len() % ch != 0 {
            return Err(ExportError::InvalidData(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                ch
            )));
        }
        let frames = input.len() / ch;
        if frames > self.options.max_block_frames {
            return Err(ExportError::InvalidData(format!(
                "block of {} frames exceeds configured maximum {}",
                frames, self.options.max_block_frames
            )));
        }

        let n = input.len();
        let work = &mut self.work[..n];
        work.copy_from_slice(input);

        apply_gain(work, self.params.input_gain);
        if self.params.dc_block_enabled {
            self.dc_blocker.process(work);
        }
        if self.params.limiter_enabled {
            self.limiter.process(work);
        }
        apply_gain(work, self.params.output_gain);
        self.meter.process(work);

        let out_len = match self.resampler.as_mut() {
            Some(rs) => rs.process(&self.work[..n], &mut self.output) * ch,
            None => {
                self.output[..n].copy_from_slice(&self.work[..n]);
                n
            }
        };
        let out = &mut self.output[..out_len];

        if let Some(level) = self.options.normalize {
            normalize_peak(out, level);
        }
        apply_dither(out, self.options.format.bit_depth.bits(), &mut self.dither);
        encode_samples(out, self.options.format.bit_depth, self.endian, &mut self.encoded);

        self.frames_in += frames as u64;
        self.frames_out += (out_len / ch) as u64;

        Ok(EncodedBlock {
            frames: out_len / ch,
            samples: &self.output[..out_len],
            bytes: &self.encoded,
        })
    }

    /// Clear filter, limiter, resampler and meter state.
    pub fn reset(&mut self) {
        self.dc_blocker.reset();
        self.limiter.reset();
        if let Some(rs) = self.resampler.as_mut() {
            rs.reset();
        }
        self.meter.reset();
        self.frames_in = 0;
        self.frames_out = 0;
    }

    /// Heap bytes held by scratch buffers.
    pub fn scratch_bytes(&self) -> usize {
        (self.work.capacity() + self.output.capacity()) * std::mem::size_of::<f32>()
            + self.encoded.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AudioFormat, BitDepth};
    use approx::assert_relative_eq;

    fn options(bit_depth: BitDepth) -> EncodeOptions {
        EncodeOptions {
            format: AudioFormat::wav(bit_depth),
            source_sample_rate: 48000,
            sample_rate: 48000,
            channels: 2,
            normalize: None,
            dither: DitherType::None,
            max_block_frames: 256,
            processing: ProcessingParams::transparent(),
        }
    }

    #[test]
    fn test_transparent_block_quantises_exactly() {
        let mut pipeline = EncodePipeline::new(options(BitDepth::Int16)).unwrap();
        let block = [0.5f32, -0.5, 0.0, 1.0];
        let out = pipeline.process_block(&block).unwrap();
        assert_eq!(out.frames, 2);
        assert_eq!(out.samples, &block);
        assert_eq!(out.bytes.len(), 8);
        assert_eq!(i16::from_le_bytes([out.bytes[0], out.bytes[1]]), 16384);
        assert_eq!(i16::from_le_bytes([out.bytes[6], out.bytes[7]]), 32767);
    }

    #[test]
    fn test_rejects_oversized_and_ragged_blocks() {
        let mut pipeline = EncodePipeline::new(options(BitDepth::Int16)).unwrap();
        assert!(pipeline.process_block(&[0.0; 3]).is_err());
        assert!(pipeline.process_block(&vec![0.0; 514]).is_err());
        assert!(pipeline.process_block(&vec![0.0; 512]).is_ok());
    }

    #[test]
    fn test_meters_match_direct_computation() {
        let mut pipeline = EncodePipeline::new(options(BitDepth::Float32)).unwrap();
        let block: Vec<f32> = (0..512).map(|i| 0.7 * (i as f32 * 0.03).sin()).collect();
        pipeline.process_block(&block).unwrap();

        let peak = block.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let rms = (block.iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / 512.0).sqrt() as f32;
        let levels = pipeline.levels();
        assert_relative_eq!(levels.peak, peak);
        assert_relative_eq!(levels.integrated_rms, rms, epsilon = 1e-6);
        assert_relative_eq!(levels.rms, (rms * rms * 0.01).sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_input_gain_and_limiter() {
        let mut opts = options(BitDepth::Float32);
        opts.processing = ProcessingParams {
            input_gain: 4.0,
            limiter_enabled: true,
            limiter_threshold: 0.5,
            ..ProcessingParams::transparent()
        };
        let mut pipeline = EncodePipeline::new(opts).unwrap();
        let block = vec![0.5f32; 64];
        let out = pipeline.process_block(&block).unwrap();
        assert!(out.samples.iter().all(|s| s.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn test_normalisation_scales_block() {
        let mut opts = options(BitDepth::Float32);
        opts.normalize = Some(0.9);
        let mut pipeline = EncodePipeline::new(opts).unwrap();
        let out = pipeline.process_block(&[0.1, -0.3, 0.2, 0.0]).unwrap();
        assert_relative_eq!(out.samples[1], -0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_resampling_changes_frame_count() {
        let mut opts = options(BitDepth::Int16);
        opts.source_sample_rate = 24000;
        let mut pipeline = EncodePipeline::new(opts).unwrap();
        let mut total = 0;
        for _ in 0..10 {
            total += pipeline.process_block(&[0.25; 512]).unwrap().frames;
        }
        // 2560 input frames at a ratio of 2
        assert!((5118..=5120).contains(&total), "got {total}");
        assert_eq!(pipeline.frames_in(), 2560);
    }

    #[test]
    fn test_float_format_is_never_dithered() {
        let mut opts = options(BitDepth::Float32);
        opts.dither = DitherType::Triangular;
        let mut pipeline = EncodePipeline::new(opts).unwrap();
        let out = pipeline.process_block(&[0.0; 64]).unwrap();
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_set_params_sanitises() {
        let mut pipeline = EncodePipeline::new(options(BitDepth::Int16)).unwrap();
        pipeline.set_params(ProcessingParams {
            output_gain: 50.0,
            ..ProcessingParams::transparent()
        });
        assert_eq!(pipeline.params().output_gain, 10.0);
    }
}
