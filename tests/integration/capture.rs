//! Capture session output on disk.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::{assert_abs_diff_eq, assert_relative_eq};
use tapesquash::prelude::*;
use tapesquash::{CaptureSession, OverwritePolicy};

#[test]
fn test_two_second_wav_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let config = transparent_config(AudioFormat::wav(BitDepth::Int16), 2);
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();

    session.start_capture(&path, 2000).unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    let mono = generate_sine(440.0, 0.5, TEST_SAMPLE_RATE, 100_000);
    let signal = interleave(&mono, 2);
    drive_session(&mut session, &signal, 2);

    assert_eq!(session.state(), CaptureState::Completed);
    let result = session.last_result().unwrap().clone();
    assert!(result.is_success());
    assert_eq!(result.frames, 96_000);
    assert_eq!(result.duration_ms, 2000);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 44 + 96_000 * 4);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32_le(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(u32_le(&bytes, 40), 96_000 * 4);

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len(), 192_000);

    for (i, sample) in reader.samples::<i16>().enumerate() {
        let decoded = sample.unwrap() as f32 / 32767.0;
        assert!(
            (decoded - signal[i]).abs() <= INT16_EPSILON,
            "sample {i}: {decoded} vs {}",
            signal[i]
        );
    }

    let audio = session.take_captured_audio().unwrap();
    assert_eq!(audio.frames(), 96_000);
    assert_eq!(audio.channels, 2);
    assert_relative_eq!(audio.peak, 0.5, epsilon = 0.01);
    assert!(session.take_captured_audio().is_none());
}

#[test]
fn test_aiff_header_and_big_endian_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.AIFF");
    let config = transparent_config(AudioFormat::aiff(BitDepth::Int16), 1);
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();

    session.start_capture(&path, 500).unwrap();
    let signal = vec![0.25f32; 30_000];
    drive_session(&mut session, &signal, 1);
    assert_eq!(session.state(), CaptureState::Completed);

    let bytes = std::fs::read(&path).unwrap();
    let data_len = 24_000 * 2;
    assert_eq!(bytes.len(), 54 + data_len);
    assert_eq!(&bytes[0..4], b"FORM");
    assert_eq!(u32_be(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(&bytes[8..16], b"AIFFCOMM");
    assert_eq!(u16::from_be_bytes([bytes[20], bytes[21]]), 1);
    assert_eq!(u32_be(&bytes, 22), 24_000);
    assert_eq!(u16::from_be_bytes([bytes[26], bytes[27]]), 16);
    assert_eq!(&bytes[28..32], &[0x40, 0x0E, 0xBB, 0x80]);
    assert_eq!(&bytes[38..42], b"SSND");
    assert_eq!(u32_be(&bytes, 42) as usize, 8 + data_len);

    // round(0.25 * 32767) = 8192
    assert_eq!(i16::from_be_bytes([bytes[54], bytes[55]]), 8192);
}

#[test]
fn test_raw_24_bit_has_no_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.pcm");
    let config = transparent_config(AudioFormat::raw(BitDepth::Int24), 1);
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();

    session.start_capture(&path, 100).unwrap();
    let signal = vec![-0.5f32; 6000];
    drive_session(&mut session, &signal, 1);
    assert_eq!(session.state(), CaptureState::Completed);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 4800 * 3);
    let first = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
    let decoded = first as f32 / 8_388_607.0;
    assert_abs_diff_eq!(decoded, -0.5, epsilon = INT24_EPSILON);
}

#[test]
fn test_resampled_capture_hits_target_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let config = CaptureConfig {
        source_sample_rate: 44_100,
        ..transparent_config(AudioFormat::wav(BitDepth::Int16), 1)
    };
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();

    session.start_capture(&path, 1000).unwrap();
    let signal = generate_sine(220.0, 0.5, 44_100, 46_000);
    drive_session(&mut session, &signal, 1);

    assert_eq!(session.state(), CaptureState::Completed);
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, 48_000);
    assert_eq!(reader.duration(), 48_000);
}

#[test]
fn test_cancel_request_from_control_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let config = transparent_config(AudioFormat::wav(BitDepth::Int16), 2);
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();
    let events = session.subscribe();
    let control = session.control();

    session.start_capture(&path, 2000).unwrap();
    let signal = interleave(&generate_sine(440.0, 0.5, TEST_SAMPLE_RATE, 4096), 2);
    drive_session(&mut session, &signal, 2);
    assert!(path.exists());

    let worker = std::thread::spawn(move || control.request_cancel());
    worker.join().unwrap();

    assert!(!session.process_audio_block(&signal[..1024], 512));
    assert_eq!(session.state(), CaptureState::Cancelled);
    assert!(!path.exists());
    assert!(session.take_captured_audio().is_none());

    let completed: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            CaptureEvent::Completed(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].state, CaptureState::Cancelled);
}

#[test]
fn test_ring_hand_off_matches_direct_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ring.wav");
    let config = transparent_config(AudioFormat::wav(BitDepth::Int16), 2);
    let mut session = CaptureSession::new(config, ProcessingParams::transparent()).unwrap();
    let mut input = session.take_input().unwrap();

    session.start_capture(&path, 250).unwrap();
    let signal = interleave(&generate_sine(1000.0, 0.3, TEST_SAMPLE_RATE, 16_000), 2);
    for block in signal.chunks(TEST_BLOCK_FRAMES * 2) {
        if !input.is_recording() {
            break;
        }
        assert!(input.push_block(block));
        session.pump();
    }

    assert_eq!(session.state(), CaptureState::Completed);
    assert_eq!(session.metrics().buffer_overruns, 0);
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.duration(), 12_000);
    assert!(!input.push_block(&signal[..1024]));
}

#[test]
fn test_existing_file_respects_overwrite_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    std::fs::write(&path, b"keep me").unwrap();

    let config = transparent_config(AudioFormat::wav(BitDepth::Int16), 1);
    let mut session = CaptureSession::new(config.clone(), ProcessingParams::transparent()).unwrap();
    assert!(session.start_capture(&path, 100).is_err());
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");

    let config = CaptureConfig {
        overwrite: OverwritePolicy::Replace,
        ..config
    };
    session.set_config(config).unwrap();
    session.start_capture(&path, 100).unwrap();
    drive_session(&mut session, &vec![0.0; 6000], 1);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 44 + 4800 * 2);
}

#[test]
fn test_silence_stays_silent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    let config = CaptureConfig {
        dither: false,
        ..transparent_config(AudioFormat::wav(BitDepth::Int16), 1)
    };
    let mut session = CaptureSession::new(config, ProcessingParams::default()).unwrap();

    session.start_capture(&path, 100).unwrap();
    drive_session(&mut session, &vec![0.0; 6000], 1);

    let audio = session.take_captured_audio().unwrap();
    assert!(audio.peak < SILENCE_THRESHOLD);
    assert!(audio.samples.iter().all(|s| s.abs() < FLOAT_EPSILON));
}
