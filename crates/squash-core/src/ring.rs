//! Lock-free capture ring between the audio callback and the encoder.
//!
//! The producer half lives on the real-time thread, the consumer half on the
//! control thread. Both operations are all-or-nothing: a block either fits
//! (or is available) in full, or the call fails and bumps a counter.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Smallest ring, in frames.
pub const MIN_RING_FRAMES: usize = 512;
/// Largest ring, in frames.
pub const MAX_RING_FRAMES: usize = 65536;

/// Counters shared by both halves of a ring.
#[derive(Debug, Default)]
pub struct RingStats {
    overruns: AtomicU64,
    underruns: AtomicU64,
    frames_written: AtomicU64,
    frames_read: AtomicU64,
}

impl RingStats {
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.overruns.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.frames_written.store(0, Ordering::Relaxed);
        self.frames_read.store(0, Ordering::Relaxed);
    }
}

/// Ring factory.
pub struct RingCapture;

impl RingCapture {
    /// Create a ring holding `frames` interleaved frames of `channels` channels.
    ///
    /// `frames` is clamped to [`MIN_RING_FRAMES`]..=[`MAX_RING_FRAMES`].
    #[allow(clippy::new_ret_no_self)]
    pub fn with_capacity(
        frames: usize,
        channels: usize,
    ) -> Result<(CaptureProducer, CaptureConsumer)> {
        if channels == 0 || channels > 2 {
            return Err(Error::InvalidChannelCount(channels));
        }

        let frames = frames.clamp(MIN_RING_FRAMES, MAX_RING_FRAMES);
        let rb = HeapRb::<f32>::new(frames * channels);
        let (prod, cons) = rb.split();
        let stats = Arc::new(RingStats::default());

        let producer = CaptureProducer {
            prod,
            stats: Arc::clone(&stats),
            channels,
        };
        let consumer = CaptureConsumer {
            cons,
            stats,
            channels,
        };

        Ok((producer, consumer))
    }
}

/// Producer half, owned by the audio callback.
pub struct CaptureProducer {
    prod: HeapProd<f32>,
    stats: Arc<RingStats>,
    channels: usize,
}

impl CaptureProducer {
    /// Write an interleaved block. Fails without writing anything if the block
    /// does not fit or is not a whole number of frames.
    #[inline]
    pub fn write(&mut self, samples: &[f32]) -> bool {
        if samples.len() % self.channels != 0 || self.prod.vacant_len() < samples.len() {
            self.stats.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let pushed = self.prod.push_slice(samples);
        debug_assert_eq!(pushed, samples.len());
        self.stats
            .frames_written
            .fetch_add((pushed / self.channels) as u64, Ordering::Relaxed);
        true
    }

    /// Free space in frames.
    pub fn free_space(&self) -> usize {
        self.prod.vacant_len() / self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.prod.capacity().get() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn stats(&self) -> &Arc<RingStats> {
        &self.stats
    }
}

/// Consumer half, owned by the encoder.
pub struct CaptureConsumer {
    cons: HeapCons<f32>,
    stats: Arc<RingStats>,
    channels: usize,
}

impl CaptureConsumer {
    /// Fill `dest` completely. Fails without consuming anything if fewer
    /// samples than `dest.len()` are buffered.
    pub fn read(&mut self, dest: &mut [f32]) -> bool {
        if dest.len() % self.channels != 0 || self.cons.occupied_len() < dest.len() {
            self.stats.underruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let popped = self.cons.pop_slice(dest);
        debug_assert_eq!(popped, dest.len());
        self.stats
            .frames_read
            .fetch_add((popped / self.channels) as u64, Ordering::Relaxed);
        true
    }

    /// Buffered frames.
    pub fn available(&self) -> usize {
        self.cons.occupied_len() / self.channels
    }

    pub fn capacity_frames(&self) -> usize {
        self.cons.capacity().get() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Drop everything buffered.
    pub fn reset(&mut self) {
        self.cons.clear();
    }

    pub fn stats(&self) -> &Arc<RingStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capacity_is_clamped() {
        let (prod, cons) = RingCapture::with_capacity(16, 2).unwrap();
        assert_eq!(prod.capacity_frames(), MIN_RING_FRAMES);
        assert_eq!(cons.capacity_frames(), MIN_RING_FRAMES);

        let (prod, _) = RingCapture::with_capacity(1 << 20, 1).unwrap();
        assert_eq!(prod.capacity_frames(), MAX_RING_FRAMES);
    }

    #[test]
    fn test_rejects_bad_channel_count() {
        assert!(RingCapture::with_capacity(1024, 0).is_err());
        assert!(RingCapture::with_capacity(1024, 3).is_err());
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let (mut prod, mut cons) = RingCapture::with_capacity(512, 2).unwrap();
        let block: Vec<f32> = (0..64).map(|i| i as f32).collect();
        assert!(prod.write(&block));
        assert_eq!(cons.available(), 32);

        let mut out = vec![0.0; 64];
        assert!(cons.read(&mut out));
        assert_eq!(out, block);
        assert_eq!(cons.stats().frames_read(), 32);
    }

    #[test]
    fn test_overrun_is_all_or_nothing() {
        let (mut prod, cons) = RingCapture::with_capacity(512, 1).unwrap();
        let block = vec![0.5; 400];
        assert!(prod.write(&block));
        assert!(!prod.write(&block), "second block should not fit");
        assert_eq!(prod.stats().overruns(), 1);
        assert_eq!(cons.available(), 400, "failed write must not add data");
    }

    #[test]
    fn test_underrun_is_all_or_nothing() {
        let (mut prod, mut cons) = RingCapture::with_capacity(512, 1).unwrap();
        assert!(prod.write(&[1.0, 2.0, 3.0]));

        let mut out = [0.0; 4];
        assert!(!cons.read(&mut out));
        assert_eq!(cons.stats().underruns(), 1);
        assert_eq!(cons.available(), 3, "failed read must not consume data");
    }

    #[test]
    fn test_partial_frame_counts_as_overrun() {
        let (mut prod, cons) = RingCapture::with_capacity(512, 2).unwrap();
        assert!(!prod.write(&[0.1, 0.2, 0.3]));
        assert_eq!(prod.stats().overruns(), 1);
        assert_eq!(cons.available(), 0);
    }

    #[test]
    fn test_reset_drains() {
        let (mut prod, mut cons) = RingCapture::with_capacity(512, 1).unwrap();
        assert!(prod.write(&[0.0; 100]));
        cons.reset();
        assert_eq!(cons.available(), 0);
        assert_eq!(prod.free_space(), 512);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Write(usize),
        Read(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..300).prop_map(Op::Write),
            (1usize..300).prop_map(Op::Read),
        ]
    }

    proptest! {
        #[test]
        fn prop_fifo_and_counters(ops in proptest::collection::vec(op(), 1..200)) {
            let (mut prod, mut cons) = RingCapture::with_capacity(512, 1).unwrap();
            let mut model = std::collections::VecDeque::new();
            let mut next = 0u32;
            let mut expected_overruns = 0;
            let mut expected_underruns = 0;

            for op in ops {
                match op {
                    Op::Write(n) => {
                        let block: Vec<f32> = (0..n).map(|i| (next + i as u32) as f32).collect();
                        let fits = model.len() + n <= 512;
                        prop_assert_eq!(prod.write(&block), fits);
                        if fits {
                            model.extend(block.iter().copied());
                            next += n as u32;
                        } else {
                            expected_overruns += 1;
                        }
                    }
                    Op::Read(n) => {
                        let mut out = vec![0.0; n];
                        let enough = model.len() >= n;
                        prop_assert_eq!(cons.read(&mut out), enough);
                        if enough {
                            let want: Vec<f32> = model.drain(..n).collect();
                            prop_assert_eq!(out, want);
                        } else {
                            expected_underruns += 1;
                        }
                    }
                }
            }

            prop_assert_eq!(prod.stats().overruns(), expected_overruns);
            prop_assert_eq!(cons.stats().underruns(), expected_underruns);
            prop_assert_eq!(cons.available(), model.len());
        }
    }
}
