//! Soft limiter with instant attack and exponential release.

/// Linked (all channels share one gain) peak limiter.
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold: f32,
    release: f32,
    gain: f32,
    channels: usize,
}

impl Limiter {
    pub fn new(threshold: f32, release_ms: f32, sample_rate: u32, channels: usize) -> Self {
        Self {
            threshold,
            release: Self::release_coefficient(release_ms, sample_rate),
            gain: 1.0,
            channels: channels.clamp(1, 2),
        }
    }

    /// `exp(-1 / (release_ms * 0.001 * fs))`
    fn release_coefficient(release_ms: f32, sample_rate: u32) -> f32 {
        let samples = release_ms * 0.001 * sample_rate.max(1) as f32;
        (-1.0 / samples).exp()
    }

    pub fn set_params(&mut self, threshold: f32, release_ms: f32, sample_rate: u32) {
        self.threshold = threshold;
        self.release = Self::release_coefficient(release_ms, sample_rate);
    }

    /// Current gain reduction factor (1.0 = none).
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        let channels = self.channels;
        for frame in samples.chunks_exact_mut(channels) {
            let level = frame.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));

            if level > self.threshold {
                self.gain = self.gain.min(self.threshold / level);
            } else {
                self.gain += (1.0 - self.gain) * (1.0 - self.release);
            }

            for s in frame.iter_mut() {
                *s *= self.gain;
            }
        }
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_signal_untouched() {
        let mut lim = Limiter::new(0.9, 50.0, 48000, 1);
        let mut buf = [0.1, -0.2, 0.3];
        lim.process(&mut buf);
        assert_eq!(buf, [0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_attack_is_instant() {
        let mut lim = Limiter::new(0.5, 50.0, 48000, 2);
        let mut buf = vec![0.0f32; 256];
        for (i, s) in buf.iter_mut().enumerate() {
            *s = if i % 2 == 0 { 1.0 } else { -0.8 };
        }
        lim.process(&mut buf);
        for s in &buf {
            assert!(s.abs() <= 0.5 + 1e-6, "sample {s} above threshold");
        }
    }

    #[test]
    fn test_release_recovers_towards_unity() {
        let mut lim = Limiter::new(0.5, 10.0, 48000, 1);
        let mut hit = [1.0f32];
        lim.process(&mut hit);
        assert!((lim.gain() - 0.5).abs() < 1e-6);

        let mut quiet = vec![0.01f32; 48000];
        lim.process(&mut quiet);
        assert!(lim.gain() > 0.99);
    }
}
