//! Dither for bit depth reduction.

use crate::options::DitherType;

pub struct DitherState {
    random_state: u32,
    dither_type: DitherType,
}

impl DitherState {
    pub fn new(dither_type: DitherType) -> Self {
        Self {
            random_state: 0x12345678,
            dither_type,
        }
    }

    pub fn dither_type(&self) -> DitherType {
        self.dither_type
    }

    #[inline]
    fn random(&mut self) -> u32 {
        let mut x = self.random_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.random_state = x;
        x
    }

    #[inline]
    fn uniform(&mut self) -> f32 {
        self.random() as f32 / u32::MAX as f32
    }

    /// Uniform noise in [-0.5, 0.5].
    #[inline]
    fn rectangular_noise(&mut self) -> f32 {
        self.uniform() - 0.5
    }

    /// Triangular noise in [-1, 1].
    #[inline]
    fn triangular_noise(&mut self) -> f32 {
        self.uniform() - self.uniform()
    }
}

/// Add dither scaled to one LSB of `target_bits` to interleaved samples.
pub fn apply_dither(samples: &mut [f32], target_bits: u16, state: &mut DitherState) {
    if state.dither_type == DitherType::None || target_bits >= 32 {
        return;
    }

    let lsb = 1.0 / (1u32 << (target_bits - 1)) as f32;

    match state.dither_type {
        DitherType::None => {}
        DitherType::Rectangular => {
            for s in samples.iter_mut() {
                *s += state.rectangular_noise() * lsb;
            }
        }
        DitherType::Triangular => {
            for s in samples.iter_mut() {
                *s += state.triangular_noise() * lsb;
            }
        }
    }
}
