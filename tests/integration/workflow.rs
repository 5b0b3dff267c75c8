//! End-to-end squash through `SquashEngine`.

use crate::helpers::*;
use tapesquash::prelude::*;
use tapesquash::PatternEvent;

fn engine() -> SquashEngine {
    SquashEngine::builder()
        .pattern(busy_pattern())
        .capture_config(transparent_config(AudioFormat::wav(BitDepth::Int16), 1))
        .processing_params(ProcessingParams::transparent())
        .limit_config(LimitConfig {
            max_tracks: 6,
            recommended_tracks: 6,
            mode: LimitMode::StrictLimit,
            max_cpu_percent: 95.0,
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn capture(engine: &mut SquashEngine, duration_ms: usize) {
    let frames = TEST_SAMPLE_RATE as usize * duration_ms / 1000 + TEST_BLOCK_FRAMES;
    let signal = generate_sine(110.0, 0.4, TEST_SAMPLE_RATE, frames);
    drive_session(engine.session_mut(), &signal, 1);
    assert_eq!(engine.session().state(), CaptureState::Completed);
}

#[test]
fn test_analyse_capture_commit_undo() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine();
    let original = engine.pattern().clone();
    let events = engine.transaction_mut().subscribe();

    let all: Vec<usize> = (0..8).collect();
    let analysis = engine.analyze(&all, 0, 15);
    assert!(!analysis.within_limits);
    assert_eq!(analysis.recommended_tracks, vec![0, 1, 2, 3, 4, 5]);

    let too_wide = SelectionBounds::new(0, 7, 0, 15);
    assert!(matches!(
        engine.begin_capture(too_wide, dir.path().join("wide.wav"), 1000),
        Err(Error::Admission(_))
    ));
    assert!(!dir.path().join("wide.wav").exists());

    let selection = SelectionBounds::new(0, 5, 0, 15);
    let path = dir.path().join("squash.wav");
    let admitted = engine.begin_capture(selection, &path, 1000).unwrap();
    assert!(admitted.within_limits);
    capture(&mut engine, 1000);

    let mut loader = MockLoader {
        next_slot: 3,
        ..Default::default()
    };
    let result = engine.commit_capture(&mut loader, selection, None).unwrap();

    assert!(result.success);
    assert!(result.backup_id.is_some());
    assert_eq!(result.affected_region, selection);
    assert_eq!(loader.loaded.len(), 1);
    assert_eq!(loader.loaded[0].0, 48_000);
    assert_eq!(loader.loaded[0].1, 48_000);
    assert!(loader.loaded[0].2.contains("tracks 0-5, steps 0-15"));

    let pattern = engine.pattern();
    assert_eq!(pattern.step(0, 0).and_then(|s| s.sample_slot), Some(3));
    assert_eq!(pattern.count_active_steps(0, 0..=15), 1);
    for track in 1..=5 {
        assert!(pattern.is_track_empty(track), "track {track} not cleared");
    }
    for track in 6..8 {
        for step in 0..16 {
            assert_eq!(pattern.step(track, step), original.step(track, step));
        }
    }

    let emitted = events.drain();
    assert!(emitted
        .iter()
        .any(|e| matches!(e, PatternEvent::BackupCreated(_))));
    assert!(emitted
        .iter()
        .any(|e| matches!(e, PatternEvent::ReplacementComplete(r) if r.success)));

    let metrics = engine.selector().performance_metrics();
    assert_eq!(metrics.successful_operations, 1);
    assert_eq!(metrics.rejected_operations, 1);

    assert!(engine.undo());
    assert_eq!(engine.pattern(), &original);
    assert!(engine.redo());
    assert_eq!(engine.pattern().step(0, 0).and_then(|s| s.sample_slot), Some(3));
    assert!(engine.undo());
    assert_eq!(engine.pattern(), &original);
    assert!(!engine.can_undo());
}

#[test]
fn test_commit_past_pattern_end_grows_and_undo_shrinks() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine();
    assert_eq!(engine.pattern().length(), 16);

    let selection = SelectionBounds::new(2, 3, 8, 31);
    engine
        .begin_capture(selection, dir.path().join("long.wav"), 200)
        .unwrap();
    capture(&mut engine, 200);

    let mut loader = MockLoader::default();
    let result = engine
        .commit_capture(&mut loader, selection, Some(3))
        .unwrap();

    assert!(result.success);
    assert_eq!(result.original_length, 16);
    assert_eq!(result.new_length, 32);
    assert_eq!(engine.pattern().step(3, 8).and_then(|s| s.sample_slot), Some(0));

    assert!(engine.undo());
    assert_eq!(engine.pattern().length(), 16);
    assert_eq!(engine.pattern(), &busy_pattern());
}

#[test]
fn test_failed_loader_keeps_pattern_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine();
    let selection = SelectionBounds::new(0, 1, 0, 15);

    engine
        .begin_capture(selection, dir.path().join("take.wav"), 100)
        .unwrap();
    capture(&mut engine, 100);

    let mut loader = MockLoader {
        fail: true,
        ..Default::default()
    };
    assert!(matches!(
        engine.commit_capture(&mut loader, selection, None),
        Err(Error::Loader(_))
    ));
    assert_eq!(engine.pattern(), &busy_pattern());
    assert!(!engine.can_undo());

    // The capture was consumed; a second commit has nothing to hand over
    let mut loader = MockLoader::default();
    assert!(matches!(
        engine.commit_capture(&mut loader, selection, None),
        Err(Error::NoCapturedAudio)
    ));
}

#[test]
fn test_rejecting_validator_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = SquashEngine::builder()
        .pattern(busy_pattern())
        .capture_config(transparent_config(AudioFormat::wav(BitDepth::Int16), 1))
        .validator(|pattern: &Pattern, selection: &SelectionBounds| {
            let mut report = tapesquash::ValidationReport::new(selection);
            if pattern.step(0, 0).is_some_and(|s| s.is_sample_trigger()) {
                report.error("sample triggers not allowed here");
            }
            report
        })
        .build()
        .unwrap();
    let selection = SelectionBounds::new(0, 2, 0, 15);

    engine
        .begin_capture(selection, dir.path().join("take.wav"), 100)
        .unwrap();
    capture(&mut engine, 100);

    let mut loader = MockLoader::default();
    let result = engine.commit_capture(&mut loader, selection, None).unwrap();

    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(engine.pattern(), &busy_pattern());
    assert_eq!(engine.selector().performance_metrics().failed_operations, 1);
}

#[test]
fn test_two_squashes_share_the_backup_pool() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine();
    let mut loader = MockLoader::default();

    for (i, selection) in [SelectionBounds::new(0, 1, 0, 15), SelectionBounds::new(4, 5, 0, 15)]
        .into_iter()
        .enumerate()
    {
        engine
            .begin_capture(selection, dir.path().join(format!("take{i}.wav")), 100)
            .unwrap();
        capture(&mut engine, 100);
        assert!(engine.commit_capture(&mut loader, selection, None).unwrap().success);
    }

    assert_eq!(engine.transaction().backups().count(), 2);
    assert!(engine.estimated_memory_usage() > 0);

    assert!(engine.undo());
    assert!(engine.undo());
    assert_eq!(engine.pattern(), &busy_pattern());
    assert!(engine.redo());
    assert_eq!(engine.pattern().step(0, 0).and_then(|s| s.sample_slot), Some(0));
    assert!(engine.pattern().is_track_empty(1));
    assert!(!engine.pattern().is_track_empty(5));
}
