//! Resource selection against real patterns.

use crate::helpers::*;
use tapesquash::prelude::*;
use tapesquash::{FixedMonitor, ResourceSelector, TrackConfig};

fn strict(max_tracks: usize) -> ResourceSelector {
    ResourceSelector::new(LimitConfig {
        max_tracks,
        mode: LimitMode::StrictLimit,
        ..Default::default()
    })
}

#[test]
fn test_strict_eight_of_six_is_reduced_by_priority() {
    let pattern = busy_pattern();
    let selector = strict(6);
    let tracks: Vec<usize> = (0..8).collect();

    let analysis = selector.analyze_squash_operation(&pattern, &tracks, 0, 15);

    assert!(!analysis.within_limits);
    assert!(analysis.requires_optimization);
    assert!(analysis.recommended_tracks.len() <= 6);
    assert_eq!(analysis.recommended_tracks, vec![0, 1, 2, 3]);
    assert_eq!(analysis.alternative_selection, vec![0, 1, 2, 3, 4, 5]);
    assert!(analysis.warning.is_some());
    assert_eq!(analysis.total_memory_kb, 696);
}

#[test]
fn test_recommendation_follows_score_not_track_order() {
    let mut pattern = busy_pattern();
    // Low-index track made heavy enough to fall behind
    pattern
        .set_track_config(
            0,
            TrackConfig {
                effect_count: 8,
                priority: Some(100),
                muted: false,
            },
        )
        .unwrap();
    let selector = strict(6);

    let analysis = selector.analyze_squash_operation(&pattern, &(0..8).collect::<Vec<_>>(), 0, 15);

    assert!(!analysis.recommended_tracks.contains(&0));
    assert_eq!(analysis.recommended_tracks, vec![1, 2, 3, 4]);
}

#[test]
fn test_warning_mode_never_blocks() {
    let pattern = busy_pattern();
    let mut selector = ResourceSelector::new(LimitConfig::default());

    let analysis = selector.analyze_squash_operation(&pattern, &(0..8).collect::<Vec<_>>(), 0, 15);

    assert!(analysis.within_limits);
    assert!(!analysis.warnings.is_empty());
    assert!(selector.ensure_allowed(&analysis).is_ok());
    assert_eq!(selector.performance_metrics().warning_operations, 0);

    selector.record_operation_admitted(&analysis);
    assert_eq!(selector.performance_metrics().warning_operations, 1);
}

#[test]
fn test_dynamic_limit_shrinks_under_load() {
    let pattern = busy_pattern();
    let mut selector = ResourceSelector::new(LimitConfig {
        mode: LimitMode::DynamicLimit,
        max_cpu_percent: 95.0,
        ..Default::default()
    })
    .with_monitor(FixedMonitor {
        cpu_load: 0.95,
        memory_usage_kb: 0,
    });

    assert_eq!(selector.effective_track_limit(), 3);
    assert!(selector.is_dynamic_limiting_active());

    let four = selector.analyze_squash_operation(&pattern, &[4, 5, 6, 7], 0, 15);
    assert!(!four.within_limits);
    assert!(selector.ensure_allowed(&four).is_err());

    selector.set_monitor(FixedMonitor {
        cpu_load: 0.1,
        memory_usage_kb: 0,
    });
    assert_eq!(selector.effective_track_limit(), 6);
    let four = selector.analyze_squash_operation(&pattern, &[4, 5, 6, 7], 0, 15);
    assert!(four.within_limits);
}

#[test]
fn test_empty_tracks_are_cheap() {
    let pattern = Pattern::new(4).unwrap();
    let selector = strict(4);

    let analysis = selector.analyze_squash_operation(&pattern, &[0, 1, 2, 3], 0, 15);

    assert!(analysis.within_limits);
    assert_eq!(analysis.total_memory_kb, 4 * 64);
    assert!(analysis.tracks.iter().all(|t| !t.is_recommended));
}
