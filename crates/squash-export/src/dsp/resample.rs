//! Streaming linear-interpolation sample-rate conversion.

/// Linear resampler for interleaved blocks.
///
/// Carries the fractional read position and the last input frame across
/// calls, so splitting a signal into blocks gives the same output as
/// processing it whole.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    /// Input frames advanced per output frame (source / target).
    step: f64,
    /// Read position relative to the start of the next block. `-1.0..0.0`
    /// interpolates between the previous block's last frame and the first
    /// frame of the next.
    pos: f64,
    prev: [f32; 2],
    channels: usize,
}

impl LinearResampler {
    pub fn new(source_rate: u32, target_rate: u32, channels: usize) -> Self {
        Self {
            step: source_rate.max(1) as f64 / target_rate.max(1) as f64,
            pos: 0.0,
            prev: [0.0; 2],
            channels: channels.clamp(1, 2),
        }
    }

    /// Output frames per input frame.
    pub fn ratio(&self) -> f64 {
        1.0 / self.step
    }

    /// Resample `input` into `output`. Returns frames written.
    ///
    /// Stops early if `output` fills up; size it for
    /// `ceil(input_frames * ratio) + 2` frames to avoid that.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let channels = self.channels;
        let in_frames = input.len() / channels;
        let out_capacity = output.len() / channels;
        if in_frames == 0 {
            return 0;
        }

        let mut written = 0;
        loop {
            let index = self.pos.floor();
            // Need frames `index` and `index + 1`
            if index + 1.0 >= in_frames as f64 || written >= out_capacity {
                break;
            }

            let frac = (self.pos - index) as f32;
            let i = index as isize;
            for ch in 0..channels {
                let a = if i < 0 {
                    self.prev[ch]
                } else {
                    input[i as usize * channels + ch]
                };
                let b = input[(i + 1) as usize * channels + ch];
                output[written * channels + ch] = a + (b - a) * frac;
            }

            written += 1;
            self.pos += self.step;
        }

        let last = (in_frames - 1) * channels;
        self.prev[..channels].copy_from_slice(&input[last..last + channels]);
        self.pos -= in_frames as f64;

        written
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev = [0.0; 2];
    }
}
