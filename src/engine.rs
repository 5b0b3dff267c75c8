//! SquashEngine that ties admission, capture and commit together.

use crate::{Error, Result, SquashEngineBuilder};
use log::{info, warn};
use squash_capture::{CaptureControl, CaptureSession, CaptureState, CapturedAudio};
use squash_limiter::{ResourceSelector, SquashAnalysis};
use squash_pattern::{
    Pattern, PatternTransaction, ReplacementConfig, ReplacementResult, ReplacementType,
    SelectionBounds,
};
use std::path::Path;
use std::time::Instant;

/// Receives finished captures and places them in a sample slot.
///
/// Slot assignment, trimming and naming are the loader's business. The
/// returned slot is what the committed trigger plays.
pub trait SampleLoader {
    fn load(&mut self, audio: CapturedAudio, source: &str) -> Result<u8>;
}

impl<F> SampleLoader for F
where
    F: FnMut(CapturedAudio, &str) -> Result<u8>,
{
    fn load(&mut self, audio: CapturedAudio, source: &str) -> Result<u8> {
        self(audio, source)
    }
}

/// Admitted operation waiting for its capture to finish.
#[derive(Debug, Clone)]
struct PendingSquash {
    selection: SelectionBounds,
    analysis: SquashAnalysis,
    started: Instant,
}

/// Context object for one pattern and its tape-squash workflow.
///
/// Owns the pattern, the resource selector, the capture session and the
/// transaction (with its backup pool and undo history). Everything here runs
/// on the control thread; the audio callback only sees the session's
/// [`CaptureInput`](squash_capture::CaptureInput).
///
/// # Example
///
/// ```ignore
/// use tapesquash::prelude::*;
///
/// let mut engine = SquashEngine::builder()
///     .pattern(Pattern::new(8)?)
///     .limit_mode(LimitMode::StrictLimit)
///     .build()?;
///
/// let selection = SelectionBounds::new(0, 3, 0, 15);
/// engine.begin_capture(selection, "squash.wav", 2000)?;
/// while engine.session().is_active() {
///     engine.session_mut().process_audio_block(&block, frames);
/// }
/// let result = engine.commit_capture(&mut loader, selection, None)?;
/// ```
pub struct SquashEngine {
    pattern: Pattern,
    selector: ResourceSelector,
    session: CaptureSession,
    transaction: PatternTransaction,
    pending: Option<PendingSquash>,
}

impl SquashEngine {
    pub fn builder() -> SquashEngineBuilder {
        SquashEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        pattern: Pattern,
        selector: ResourceSelector,
        session: CaptureSession,
        transaction: PatternTransaction,
    ) -> Self {
        Self {
            pattern,
            selector,
            session,
            transaction,
            pending: None,
        }
    }

    /// Estimate the cost of squashing `tracks` over `start_step..=end_step`.
    pub fn analyze(&mut self, tracks: &[usize], start_step: usize, end_step: usize) -> SquashAnalysis {
        self.selector.refresh_dynamic_limits();
        self.selector
            .analyze_squash_operation(&self.pattern, tracks, start_step, end_step)
    }

    /// Admit `selection` and start capturing it to `path`.
    ///
    /// Under an enforcing limit mode a selection over budget is refused with
    /// [`Error::Admission`] and nothing changes. The analysis is returned so
    /// the caller can show warnings and the proposed reduced selection.
    pub fn begin_capture(
        &mut self,
        selection: SelectionBounds,
        path: impl AsRef<Path>,
        duration_ms: u64,
    ) -> Result<SquashAnalysis> {
        let report = self.transaction.validate_selection(&self.pattern, &selection);
        if !report.is_valid {
            return Err(squash_pattern::Error::InvalidSelection(report.errors.join("; ")).into());
        }

        let tracks: Vec<usize> = selection.tracks().collect();
        let analysis = self.analyze(&tracks, selection.start_step, selection.end_step);
        self.selector.ensure_allowed(&analysis)?;
        for warning in &analysis.warnings {
            warn!("{selection}: {warning}");
        }

        self.session.start_capture(path, duration_ms)?;
        self.selector.record_operation_admitted(&analysis);
        info!(
            "capturing {selection} ({})",
            self.selector
                .format_resource_usage(analysis.total_memory_kb, analysis.total_cpu_load)
        );
        self.pending = Some(PendingSquash {
            selection,
            analysis: analysis.clone(),
            started: Instant::now(),
        });
        Ok(analysis)
    }

    /// Hand the finished capture to `loader` and replace `selection` with a
    /// trigger of the slot it returns.
    ///
    /// The region is cleared first. The trigger lands on `target_track`, or
    /// the selection's first track.
    pub fn commit_capture(
        &mut self,
        loader: &mut impl SampleLoader,
        selection: SelectionBounds,
        target_track: Option<usize>,
    ) -> Result<ReplacementResult> {
        let config = ReplacementConfig {
            replacement_type: ReplacementType::ClearAndSample,
            target_track,
            ..*self.transaction.default_config()
        };
        self.commit_capture_with(loader, selection, config)
    }

    /// Like [`commit_capture`](Self::commit_capture) with an explicit
    /// replacement config. Its `sample_slot` is overwritten by the loader's.
    ///
    /// A failed replacement has already been rolled back; it comes back as
    /// `Ok` with `success == false` and the reason in `error`.
    pub fn commit_capture_with(
        &mut self,
        loader: &mut impl SampleLoader,
        selection: SelectionBounds,
        config: ReplacementConfig,
    ) -> Result<ReplacementResult> {
        if self.session.state() != CaptureState::Completed {
            return Err(Error::NoCapturedAudio);
        }
        let audio = self
            .session
            .take_captured_audio()
            .ok_or(Error::NoCapturedAudio)?;

        let pending = self.pending.take();
        let (memory_kb, cpu_load, started) = match &pending {
            Some(p) if p.selection == selection => (
                p.analysis.total_memory_kb,
                p.analysis.total_cpu_load,
                p.started,
            ),
            _ => (0, 0.0, Instant::now()),
        };

        let source = format!("Tape squash {} ({} ms)", selection, audio.duration_ms());
        let slot = match loader.load(audio, &source) {
            Ok(slot) => slot,
            Err(e) => {
                self.selector
                    .record_operation_complete(false, started.elapsed(), memory_kb, cpu_load);
                return Err(e);
            }
        };

        let config = ReplacementConfig {
            sample_slot: slot,
            ..config
        };
        let result = self.transaction.replace(&mut self.pattern, &selection, &config);
        self.selector.record_operation_complete(
            result.success,
            started.elapsed(),
            memory_kb,
            cpu_load,
        );
        if let Some(error) = &result.error {
            warn!("commit of {selection} failed: {error}");
        }
        Ok(result)
    }

    /// Stop the running capture and forget the admitted operation.
    pub fn abort_capture(&mut self) -> bool {
        self.pending = None;
        self.session.cancel()
    }

    pub fn undo(&mut self) -> bool {
        self.transaction.undo(&mut self.pattern)
    }

    pub fn redo(&mut self) -> bool {
        self.transaction.redo(&mut self.pattern)
    }

    pub fn can_undo(&self) -> bool {
        self.transaction.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.transaction.can_redo()
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn pattern_mut(&mut self) -> &mut Pattern {
        &mut self.pattern
    }

    pub fn selector(&self) -> &ResourceSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut ResourceSelector {
        &mut self.selector
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CaptureSession {
        &mut self.session
    }

    /// Cloneable handle for cancelling or polling from other threads.
    pub fn capture_control(&self) -> CaptureControl {
        self.session.control()
    }

    pub fn transaction(&self) -> &PatternTransaction {
        &self.transaction
    }

    pub fn transaction_mut(&mut self) -> &mut PatternTransaction {
        &mut self.transaction
    }

    /// Backups, undo history and capture buffers, in bytes.
    pub fn estimated_memory_usage(&self) -> usize {
        self.transaction.estimated_memory_usage() + self.session.estimated_memory_usage()
    }
}
