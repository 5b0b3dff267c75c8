//! Captured audio handed to the sample loader.

use squash_core::amplitude_to_db;
use squash_export::AudioFormat;
use std::path::PathBuf;

/// Audio produced by one completed capture.
///
/// The session gives this away exactly once; it keeps no reference.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Interleaved, after processing and before quantisation.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub format: AudioFormat,
    /// Linear peak.
    pub peak: f32,
    /// Linear RMS over the whole capture.
    pub rms: f32,
    /// File the capture was encoded to.
    pub path: PathBuf,
}

impl CapturedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.sample_rate.max(1) as u64
    }

    pub fn peak_db(&self) -> f32 {
        amplitude_to_db(self.peak)
    }

    pub fn rms_db(&self) -> f32 {
        amplitude_to_db(self.rms)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples of one channel, de-interleaved.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + '_ {
        let channels = self.channels.max(1) as usize;
        self.samples.iter().skip(index).step_by(channels).copied()
    }

    pub fn memory_bytes(&self) -> usize {
        self.samples.capacity() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_derived_values() {
        let audio = CapturedAudio {
            samples: vec![0.5, -0.5, 0.25, -0.25],
            channels: 2,
            sample_rate: 2,
            format: AudioFormat::default(),
            peak: 0.5,
            rms: 0.25,
            path: PathBuf::from("take.wav"),
        };
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.duration_ms(), 1000);
        assert_relative_eq!(audio.peak_db(), -6.0206, epsilon = 1e-3);
        assert_eq!(audio.channel(1).collect::<Vec<_>>(), vec![-0.5, -0.25]);
    }
}
