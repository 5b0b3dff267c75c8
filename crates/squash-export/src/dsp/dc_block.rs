//! One-pole DC blocking high-pass.

/// Per-channel DC blocker for interleaved audio (up to two channels).
///
/// `y[n] = alpha * (y[n-1] + x[n] - x[n-1])` with
/// `alpha = rc / (rc + 1/fs)` and `rc = 1 / (2 pi fc)`.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    alpha: f32,
    x_prev: [f32; 2],
    y_prev: [f32; 2],
    channels: usize,
}

impl DcBlocker {
    pub fn new(cutoff_hz: f32, sample_rate: u32, channels: usize) -> Self {
        Self {
            alpha: Self::coefficient(cutoff_hz, sample_rate),
            x_prev: [0.0; 2],
            y_prev: [0.0; 2],
            channels: channels.clamp(1, 2),
        }
    }

    fn coefficient(cutoff_hz: f32, sample_rate: u32) -> f32 {
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
        let dt = 1.0 / sample_rate.max(1) as f32;
        rc / (rc + dt)
    }

    /// Change the cutoff without clearing filter state.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: u32) {
        self.alpha = Self::coefficient(cutoff_hz, sample_rate);
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        let channels = self.channels;
        for frame in samples.chunks_exact_mut(channels) {
            for (ch, s) in frame.iter_mut().enumerate() {
                let x = *s;
                let y = self.alpha * (self.y_prev[ch] + x - self.x_prev[ch]);
                self.x_prev[ch] = x;
                self.y_prev[ch] = y;
                *s = y;
            }
        }
    }

    pub fn reset(&mut self) {
        self.x_prev = [0.0; 2];
        self.y_prev = [0.0; 2];
    }
}
