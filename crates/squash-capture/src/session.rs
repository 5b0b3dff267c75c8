//! Capture session: ring, encoder and output file under one state machine.
//!
//! ```text
//! Idle -> Initializing -> Recording <-> Paused
//!                          Recording -> Finalizing -> Completed
//! any active state -> Cancelled (output deleted)
//! I/O failure      -> Error     (output deleted)
//! ```
//!
//! The real-time side only ever touches [`CaptureInput`]. Everything on
//! [`CaptureSession`] runs on the control thread.

use crate::audio::CapturedAudio;
use crate::config::{CaptureConfig, OverwritePolicy};
use crate::error::{Error, Result};
use crate::events::{
    CaptureEvent, CaptureEvents, CaptureMetrics, CaptureProgress, CaptureResult, EventHub,
};
use crate::state::CaptureState;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use squash_core::{
    AtomicFlag, AtomicLevels, CaptureConsumer, CaptureProducer, CpuMeter, LevelSnapshot,
    RingCapture, RingStats,
};
use squash_export::{ContainerWriter, EncodePipeline, ProcessingParams};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Captured audio between progress events.
const PROGRESS_INTERVAL_MS: u64 = 100;
/// Processed blocks between metrics events.
const METRICS_INTERVAL_BLOCKS: u64 = 100;

/// Status shared with the audio thread and other observers.
#[derive(Debug, Default)]
struct SessionShared {
    state: AtomicU8,
    cancel_requested: AtomicFlag,
    frames_recorded: AtomicU64,
    target_frames: AtomicU64,
    sample_rate: AtomicU32,
    levels: AtomicLevels,
    last_error: Mutex<Option<String>>,
}

impl SessionShared {
    fn state(&self) -> CaptureState {
        CaptureState::from(self.state.load(Ordering::Acquire))
    }

    fn progress(&self) -> CaptureProgress {
        let recorded = self.frames_recorded.load(Ordering::Acquire);
        let target = self.target_frames.load(Ordering::Acquire);
        let rate = self.sample_rate.load(Ordering::Relaxed).max(1) as u64;

        let fraction = if target == 0 {
            0.0
        } else {
            (recorded as f64 / target as f64).min(1.0) as f32
        };
        let elapsed_ms = recorded * 1000 / rate;
        let target_ms = target * 1000 / rate;

        CaptureProgress {
            fraction,
            frames_recorded: recorded,
            target_frames: target,
            elapsed_ms,
            remaining_ms: target_ms.saturating_sub(elapsed_ms),
        }
    }
}

/// Real-time producer handle.
///
/// Lives in the audio callback. Writes are dropped unless the session is
/// recording; a full ring counts an overrun and drops the block.
pub struct CaptureInput {
    producer: CaptureProducer,
    shared: Arc<SessionShared>,
}

impl CaptureInput {
    /// Queue one interleaved block. Never blocks or allocates.
    #[inline]
    pub fn push_block(&mut self, block: &[f32]) -> bool {
        if self.shared.state() != CaptureState::Recording {
            return false;
        }
        self.producer.write(block)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.state() == CaptureState::Recording
    }

    /// Free ring space in frames.
    pub fn free_space(&self) -> usize {
        self.producer.free_space()
    }
}

/// Cloneable observer/cancel handle for other threads.
#[derive(Clone)]
pub struct CaptureControl {
    shared: Arc<SessionShared>,
}

impl CaptureControl {
    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    pub fn progress(&self) -> CaptureProgress {
        self.shared.progress()
    }

    /// Ask the session to cancel. Takes effect on the next processed block.
    pub fn request_cancel(&self) {
        self.shared.cancel_requested.set(true);
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Levels as of the last encoded block.
    pub fn levels(&self) -> LevelSnapshot {
        self.shared.levels.load()
    }
}

/// One capture at a time: encode incoming blocks to a file and keep the
/// processed audio for hand-off.
pub struct CaptureSession {
    config: CaptureConfig,
    shared: Arc<SessionShared>,
    pipeline: EncodePipeline,
    consumer: CaptureConsumer,
    ring_stats: Arc<RingStats>,
    input: Option<CaptureInput>,

    writer: Option<ContainerWriter<BufWriter<File>>>,
    output_path: Option<PathBuf>,
    captured: Vec<f32>,
    captured_audio: Option<CapturedAudio>,
    last_result: Option<CaptureResult>,
    pump_buffer: Vec<f32>,

    cpu: CpuMeter,
    events: EventHub,
    blocks_processed: u64,
    next_progress_frame: u64,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig, params: ProcessingParams) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(SessionShared::default());
        shared.sample_rate.store(config.sample_rate, Ordering::Relaxed);

        let pipeline = EncodePipeline::new(config.encode_options(params))?;
        let (producer, consumer) =
            RingCapture::with_capacity(config.buffer_frames, config.channels as usize)?;

        Ok(Self {
            ring_stats: Arc::clone(consumer.stats()),
            input: Some(CaptureInput {
                producer,
                shared: Arc::clone(&shared),
            }),
            pump_buffer: vec![0.0; config.max_block_frames * config.channels as usize],
            cpu: CpuMeter::new(config.source_sample_rate),
            consumer,
            pipeline,
            shared,
            config,
            writer: None,
            output_path: None,
            captured: Vec::new(),
            captured_audio: None,
            last_result: None,
            events: EventHub::default(),
            blocks_processed: 0,
            next_progress_frame: 0,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Replace the configuration. Rebuilds the ring, so the previous
    /// [`CaptureInput`] stops feeding this session; take a new one.
    pub fn set_config(&mut self, config: CaptureConfig) -> Result<()> {
        if self.state().is_active() {
            return Err(Error::SessionActive);
        }
        config.validate()?;

        let params = *self.pipeline.params();
        self.pipeline = EncodePipeline::new(config.encode_options(params))?;
        let (producer, consumer) =
            RingCapture::with_capacity(config.buffer_frames, config.channels as usize)?;
        self.ring_stats = Arc::clone(consumer.stats());
        self.consumer = consumer;
        self.input = Some(CaptureInput {
            producer,
            shared: Arc::clone(&self.shared),
        });
        self.pump_buffer = vec![0.0; config.max_block_frames * config.channels as usize];
        self.cpu = CpuMeter::new(config.source_sample_rate);
        self.shared
            .sample_rate
            .store(config.sample_rate, Ordering::Relaxed);
        self.config = config;
        Ok(())
    }

    pub fn processing_params(&self) -> &ProcessingParams {
        self.pipeline.params()
    }

    /// Out-of-range values are clamped.
    pub fn set_processing_params(&mut self, params: ProcessingParams) {
        self.pipeline.set_params(params);
    }

    /// The real-time producer handle. Available once per ring.
    pub fn take_input(&mut self) -> Option<CaptureInput> {
        self.input.take()
    }

    pub fn control(&self) -> CaptureControl {
        CaptureControl {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn subscribe(&mut self) -> CaptureEvents {
        self.events.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    fn set_state(&mut self, state: CaptureState, message: impl Into<String>) {
        self.shared.state.store(state as u8, Ordering::Release);
        let message = message.into();
        debug!("capture -> {state}: {message}");
        self.events
            .emit(CaptureEvent::StateChanged { state, message });
    }

    fn check_path(&self, path: &Path) -> Result<()> {
        let expected = self.config.format.extension();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(expected));
        if !matches {
            return Err(Error::InvalidPath(format!(
                "{} does not end in .{}",
                path.display(),
                expected
            )));
        }
        if path.exists() && self.config.overwrite == OverwritePolicy::Forbid {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        Ok(())
    }

    /// Begin capturing `duration_ms` of audio to `path`.
    ///
    /// Durations above the configured ceiling are clamped. Admission
    /// failures leave the state untouched; failing to create the file moves
    /// the session to [`CaptureState::Error`].
    pub fn start_capture(&mut self, path: impl AsRef<Path>, duration_ms: u64) -> Result<()> {
        let path = path.as_ref();

        if self.state().is_active() {
            warn!("capture rejected: session already active");
            return Err(Error::SessionActive);
        }
        if duration_ms == 0 {
            return Err(Error::InvalidDuration(duration_ms));
        }
        self.check_path(path)?;

        if duration_ms > self.config.max_duration_ms {
            warn!(
                "capture duration {} ms clamped to {} ms",
                duration_ms, self.config.max_duration_ms
            );
        }
        let target = self.config.target_frames(duration_ms);
        let channels = self.config.channels as usize;

        self.reset_for_capture(path, target);
        self.set_state(CaptureState::Initializing, "Creating output file");

        // Reserve the whole capture up front so block processing never grows it
        let slack = self.pipeline.options().max_output_frames();
        self.captured
            .reserve_exact((target as usize + slack) * channels);

        match ContainerWriter::create(path, self.pipeline.container_spec()) {
            Ok(writer) => self.writer = Some(writer),
            Err(e) => {
                self.fail(format!("Failed to create {}: {e}", path.display()));
                return Err(e.into());
            }
        }

        self.set_state(CaptureState::Recording, "Recording");
        info!(
            "capture started: {} ({} frames at {} Hz)",
            path.display(),
            target,
            self.config.sample_rate
        );
        Ok(())
    }

    fn reset_for_capture(&mut self, path: &Path, target: u64) {
        self.pipeline.reset();
        self.consumer.reset();
        self.ring_stats.reset();
        self.cpu.reset();
        self.captured = Vec::new();
        self.captured_audio = None;
        self.last_result = None;
        self.output_path = Some(path.to_path_buf());
        self.blocks_processed = 0;
        self.next_progress_frame = self.progress_interval();

        self.shared.cancel_requested.set(false);
        self.shared.frames_recorded.store(0, Ordering::Release);
        self.shared.target_frames.store(target, Ordering::Release);
        self.shared.levels.reset();
        *self.shared.last_error.lock() = None;
    }

    fn progress_interval(&self) -> u64 {
        (self.config.sample_rate as u64 * PROGRESS_INTERVAL_MS / 1000).max(1)
    }

    pub fn pause(&mut self) -> bool {
        if self.state() != CaptureState::Recording {
            return false;
        }
        self.set_state(CaptureState::Paused, "Paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state() != CaptureState::Paused {
            return false;
        }
        self.set_state(CaptureState::Recording, "Recording");
        true
    }

    /// Finish early. Audio still queued in the ring is encoded first.
    pub fn stop(&mut self) -> Result<CaptureResult> {
        match self.state() {
            CaptureState::Recording | CaptureState::Paused => {
                self.drain_ring();
            }
            other => {
                return Err(Error::InvalidState(format!("cannot stop while {other}")));
            }
        }
        // Pumping may have reached the target and finalised already
        if let Some(result) = self.finished_result() {
            return Ok(result);
        }
        self.finalize()
    }

    fn finished_result(&self) -> Option<CaptureResult> {
        if self.state().is_terminal() {
            self.last_result.clone()
        } else {
            None
        }
    }

    /// Abort the capture and delete the partial file.
    pub fn cancel(&mut self) -> bool {
        let state = self.state();
        if !state.is_active() {
            return false;
        }

        self.discard_output();
        self.captured = Vec::new();
        self.shared.cancel_requested.set(false);

        let result = self.result_for(CaptureState::Cancelled, None);
        self.set_state(CaptureState::Cancelled, "Capture cancelled");
        self.complete(result);
        info!("capture cancelled");
        true
    }

    fn discard_output(&mut self) {
        // Close before deleting
        drop(self.writer.take());
        if let Some(path) = self.output_path.as_ref() {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("failed to delete partial capture {}: {e}", path.display());
                }
            }
        }
    }

    fn fail(&mut self, message: String) {
        error!("capture failed: {message}");
        self.discard_output();
        self.captured = Vec::new();
        *self.shared.last_error.lock() = Some(message.clone());

        let result = self.result_for(CaptureState::Error, Some(message.clone()));
        self.set_state(CaptureState::Error, message);
        self.complete(result);
    }

    fn complete(&mut self, result: CaptureResult) {
        self.events.emit(CaptureEvent::Completed(result.clone()));
        self.last_result = Some(result);
    }

    fn result_for(&self, state: CaptureState, error: Option<String>) -> CaptureResult {
        let levels = self.pipeline.levels();
        let frames = self.shared.frames_recorded.load(Ordering::Acquire);
        CaptureResult {
            state,
            path: self.output_path.clone().unwrap_or_default(),
            frames,
            duration_ms: frames * 1000 / self.config.sample_rate.max(1) as u64,
            peak: levels.peak,
            rms: levels.integrated_rms,
            file_size_bytes: self.writer.as_ref().map_or(0, |w| w.total_bytes()),
            error,
        }
    }

    fn finalize(&mut self) -> Result<CaptureResult> {
        self.set_state(CaptureState::Finalizing, "Finalizing");

        let Some(writer) = self.writer.take() else {
            let message = "no output file to finalize".to_string();
            self.fail(message.clone());
            return Err(Error::InvalidState(message));
        };
        let file_size = writer.total_bytes();

        if let Err(e) = writer.finalize() {
            self.fail(format!("Failed to finalize output: {e}"));
            return Err(e.into());
        }

        let mut result = self.result_for(CaptureState::Completed, None);
        result.file_size_bytes = file_size;

        self.captured_audio = Some(CapturedAudio {
            samples: std::mem::take(&mut self.captured),
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            format: self.config.format,
            peak: result.peak,
            rms: result.rms,
            path: result.path.clone(),
        });

        self.set_state(CaptureState::Completed, "Capture complete");
        self.events
            .emit(CaptureEvent::Progress(self.shared.progress()));
        self.complete(result.clone());
        info!(
            "capture complete: {} frames, {} bytes, peak {:.3}",
            result.frames, result.file_size_bytes, result.peak
        );
        Ok(result)
    }

    /// Encode one interleaved block of `frames` frames.
    ///
    /// No-op unless recording. A pending cancel request is honoured first.
    /// Returns whether the block was consumed; failures move the session to
    /// [`CaptureState::Error`] and are reported through events and
    /// [`CaptureSession::last_result`].
    pub fn process_audio_block(&mut self, block: &[f32], frames: usize) -> bool {
        if self.shared.cancel_requested.take() {
            self.cancel();
            return false;
        }
        if self.state() != CaptureState::Recording {
            return false;
        }

        let len = frames * self.config.channels as usize;
        if len > block.len() {
            warn!(
                "block claims {} frames but holds {} samples",
                frames,
                block.len()
            );
            return false;
        }
        self.encode(&block[..len], frames)
    }

    /// Encode whatever the real-time side has queued. Returns frames consumed.
    pub fn pump(&mut self) -> usize {
        if self.shared.cancel_requested.take() {
            self.cancel();
            return 0;
        }
        if self.state() != CaptureState::Recording {
            return 0;
        }
        self.drain_ring()
    }

    /// Encode queued audio regardless of pause, until the ring is empty or
    /// the session finishes.
    fn drain_ring(&mut self) -> usize {
        let channels = self.config.channels as usize;
        let chunk_frames = self.config.max_block_frames;
        let mut consumed = 0;

        while matches!(self.state(), CaptureState::Recording | CaptureState::Paused) {
            let frames = self.consumer.available().min(chunk_frames);
            if frames == 0 {
                break;
            }

            let len = frames * channels;
            let mut buffer = std::mem::take(&mut self.pump_buffer);
            let read = self.consumer.read(&mut buffer[..len]);
            let ok = read && self.encode(&buffer[..len], frames);
            self.pump_buffer = buffer;

            if !ok {
                break;
            }
            consumed += frames;
        }
        consumed
    }

    fn encode(&mut self, block: &[f32], frames: usize) -> bool {
        let started = Instant::now();
        let chunk_len = self.config.max_block_frames * self.config.channels as usize;

        for chunk in block.chunks(chunk_len) {
            if let Err(e) = self.encode_chunk(chunk) {
                self.fail(format!("Encoding failed: {e}"));
                return false;
            }
            if self.target_reached() {
                break;
            }
        }

        self.cpu.record(frames, started.elapsed());
        self.shared.levels.publish(&self.pipeline.levels());
        self.blocks_processed += 1;
        self.emit_periodic();

        if self.target_reached() {
            // Errors are already reported through `fail`
            return self.finalize().is_ok();
        }
        true
    }

    fn encode_chunk(&mut self, chunk: &[f32]) -> Result<()> {
        let channels = self.config.channels as usize;
        let bytes_per_frame = self.pipeline.bytes_per_frame();
        let remaining = self
            .shared
            .target_frames
            .load(Ordering::Acquire)
            .saturating_sub(self.shared.frames_recorded.load(Ordering::Acquire));

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no output file".into()))?;
        let block = self.pipeline.process_block(chunk)?;

        // Trim the last block so the file holds exactly the target length
        let frames = (block.frames as u64).min(remaining) as usize;
        writer.write_bytes(&block.bytes[..frames * bytes_per_frame])?;
        self.captured
            .extend_from_slice(&block.samples[..frames * channels]);

        self.shared
            .frames_recorded
            .fetch_add(frames as u64, Ordering::AcqRel);
        Ok(())
    }

    fn target_reached(&self) -> bool {
        self.shared.frames_recorded.load(Ordering::Acquire)
            >= self.shared.target_frames.load(Ordering::Acquire)
    }

    fn emit_periodic(&mut self) {
        let recorded = self.shared.frames_recorded.load(Ordering::Acquire);
        if recorded >= self.next_progress_frame {
            self.events
                .emit(CaptureEvent::Progress(self.shared.progress()));
            let interval = self.progress_interval();
            self.next_progress_frame = (recorded / interval + 1) * interval;
        }
        if self.blocks_processed % METRICS_INTERVAL_BLOCKS == 0 {
            let metrics = self.metrics();
            self.events.emit(CaptureEvent::Metrics(metrics));
        }
    }

    pub fn progress(&self) -> CaptureProgress {
        self.shared.progress()
    }

    pub fn metrics(&self) -> CaptureMetrics {
        let levels = self.pipeline.levels();
        let queued = self.consumer.available() as f32;
        CaptureMetrics {
            current_peak: levels.block_peak,
            peak: levels.peak,
            rms: levels.rms,
            frames_processed: self.shared.frames_recorded.load(Ordering::Acquire),
            buffer_overruns: self.ring_stats.overruns(),
            buffer_underruns: self.ring_stats.underruns(),
            cpu_load_percent: self.cpu.average_percent(),
            latency_ms: queued * 1000.0 / self.config.source_sample_rate.max(1) as f32,
        }
    }

    /// Move the finished capture out. `None` until a session completes.
    pub fn take_captured_audio(&mut self) -> Option<CapturedAudio> {
        self.captured_audio.take()
    }

    pub fn last_result(&self) -> Option<&CaptureResult> {
        self.last_result.as_ref()
    }

    /// Heap held by the ring, scratch buffers and captured audio.
    pub fn estimated_memory_usage(&self) -> usize {
        let float = std::mem::size_of::<f32>();
        let ring = self.consumer.capacity_frames() * self.config.channels as usize * float;
        let captured = self.captured.capacity() * float
            + self
                .captured_audio
                .as_ref()
                .map_or(0, |a| a.memory_bytes());
        ring + captured + self.pump_buffer.capacity() * float + self.pipeline.scratch_bytes()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.state().is_active() {
            self.cancel();
        }
    }
}
