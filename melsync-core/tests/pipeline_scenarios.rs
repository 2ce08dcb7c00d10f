use std::io::Cursor;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use approx::assert_abs_diff_eq;
use melsync_core::audio::wav::encode_pcm16;
use melsync_core::export::{read_tensor_dump, write_tensor_dump};
use melsync_core::{
    MelsyncError, Pipeline, PipelineConfig, Stage, StyleId, SynthHandle, ToneSynthesizer,
};

const SILENT_LOG: f32 = -18.420_681; // ln(1e-8)

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).expect("default config is valid")
}

fn tone(len: usize, rate: u32, hz: f32) -> Vec<f32> {
    (0..len)
        .map(|i| 0.4 * (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
        .collect()
}

fn stereo_wav(frames: usize, rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
        for s in tone(frames, rate, 440.0) {
            let v = (s * i16::MAX as f32) as i16;
            writer.write_sample(v).expect("left");
            writer.write_sample(v).expect("right");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

#[test]
fn one_second_of_silence_gives_fifty_tiles() {
    let bytes = encode_pcm16(&vec![0.0; 16_000], 16_000).unwrap();
    let tiles = pipeline().run(&bytes).unwrap();

    assert_eq!(tiles.len(), 50);
    for (i, tile) in tiles.iter().enumerate() {
        assert_eq!(tile.index, i);
        assert_eq!(tile.shape(), (80, 4));
        for v in tile.values() {
            assert_abs_diff_eq!(v, SILENT_LOG, epsilon = 1e-4);
        }
    }
}

#[test]
fn partial_tail_adds_one_padded_frame() {
    let bytes = encode_pcm16(&tone(16_010, 16_000, 300.0), 16_000).unwrap();
    let p = pipeline();
    let tiles = p.run(&bytes).unwrap();

    assert_eq!(tiles.len(), 51);
    assert!(tiles.iter().all(|t| t.shape() == (80, 4)));
    let snap = p.diagnostics_snapshot();
    assert_eq!(snap.frames_chunked, 51);
    assert_eq!(snap.frames_padded, 1);
}

#[test]
fn stereo_44k_is_normalized_to_16k_mono() {
    let p = pipeline();
    let mut session = p.session();
    session.load_bytes(&stereo_wav(44_100, 44_100)).unwrap();

    let audio = session.normalize().unwrap();
    assert_eq!(audio.sample_rate(), 16_000);
    assert_eq!(audio.channels(), 1);
    assert!((audio.len() as i64 - 16_000).abs() <= 1, "len {}", audio.len());

    assert_eq!(session.chunk().unwrap().len(), 50);
    assert!(session
        .featurize()
        .unwrap()
        .iter()
        .all(|t| t.shape() == (80, 4)));
    assert_abs_diff_eq!(session.duration_secs(), 1.0, epsilon = 1e-3);
}

#[test]
fn empty_wav_gives_no_tiles() {
    let bytes = encode_pcm16(&[], 16_000).unwrap();
    assert!(pipeline().run(&bytes).unwrap().is_empty());
}

#[test]
fn garbage_bytes_fail_at_load() {
    let err = pipeline().run(b"definitely not a wav file").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Load));
    assert!(matches!(err.root(), MelsyncError::Decode(_)));
}

#[test]
fn empty_bytes_fail_at_load() {
    let err = pipeline().run(&[]).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Load));
}

#[test]
fn missing_file_fails_at_load() {
    let err = pipeline()
        .run_file(std::path::Path::new("/nonexistent/melsync/input.wav"))
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Load));
    assert!(matches!(err.root(), MelsyncError::Io(_)));
}

#[test]
fn blank_text_is_rejected_before_synthesis() {
    let tts = SynthHandle::new(ToneSynthesizer::default());
    for text in ["", "   \n\t"] {
        let err = pipeline().run_text(&tts, text, StyleId(0)).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Synthesize));
        assert!(matches!(err.root(), MelsyncError::EmptyInput(_)));
    }
}

#[test]
fn text_runs_through_synthesizer() {
    // 24 kHz stub, 60 ms per char: "hi" = 120 ms = 6 frames at 16 kHz.
    let tts = SynthHandle::new(ToneSynthesizer::default());
    let tiles = pipeline().run_text(&tts, "hi", StyleId(3)).unwrap();
    assert_eq!(tiles.len(), 6);
    assert!(tiles.iter().all(|t| t.shape() == (80, 4)));
}

#[test]
fn cleared_running_flag_cancels_featurize() {
    let bytes = encode_pcm16(&vec![0.1; 3_200], 16_000).unwrap();
    let running = AtomicBool::new(false);
    let p = pipeline();
    let err = p.run_with_cancel(&bytes, &running).unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Featurize));
    assert!(matches!(err.root(), MelsyncError::Cancelled));
    assert_eq!(p.diagnostics_snapshot().runs_cancelled, 1);
    assert_eq!(p.diagnostics_snapshot().tiles_emitted, 0);
}

#[test]
fn parallel_workers_match_sequential() {
    let bytes = encode_pcm16(&tone(8_123, 16_000, 523.0), 16_000).unwrap();
    let sequential = pipeline().run(&bytes).unwrap();

    let mut config = PipelineConfig::default();
    config.workers = 4;
    let parallel = Pipeline::new(config).unwrap().run(&bytes).unwrap();

    assert_eq!(sequential, parallel);
}

#[test]
fn concurrent_runs_share_one_pipeline() {
    let p = Arc::new(pipeline());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                let bytes = encode_pcm16(&tone(3_200 * (n + 1), 16_000, 200.0), 16_000).unwrap();
                p.run(&bytes).unwrap().len()
            })
        })
        .collect();

    let counts: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("run thread panicked"))
        .collect();
    assert_eq!(counts, vec![10, 20, 30, 40]);

    let snap = p.diagnostics_snapshot();
    assert_eq!(snap.runs_started, 4);
    assert_eq!(snap.tiles_emitted, 100);
    assert_eq!(snap.runs_failed, 0);
}

#[test]
fn failures_and_reset_are_counted() {
    let p = pipeline();
    let _ = p.run(b"nope");
    let snap = p.diagnostics_snapshot();
    assert_eq!((snap.runs_started, snap.runs_failed), (1, 1));

    p.reset_diagnostics();
    assert_eq!(p.diagnostics_snapshot().runs_started, 0);
}

#[tokio::test]
async fn blocking_run_from_async_context() {
    let p = Arc::new(pipeline());
    let bytes = encode_pcm16(&vec![0.0; 960], 16_000).unwrap();
    let tiles = Arc::clone(&p).run_blocking(bytes).await.unwrap();
    assert_eq!(tiles.len(), 3);
}

#[test]
fn tiles_survive_tensor_dump() {
    let bytes = encode_pcm16(&tone(1_000, 16_000, 700.0), 16_000).unwrap();
    let tiles = pipeline().run(&bytes).unwrap();

    let mut dump = Vec::new();
    write_tensor_dump(&mut dump, &tiles).unwrap();
    assert_eq!(dump.len(), 20 + tiles.len() * 80 * 4 * 4);
    assert_eq!(read_tensor_dump(dump.as_slice()).unwrap(), tiles);
}

#[test]
fn config_overrides_change_tile_shape() {
    let config = PipelineConfig::from_pairs([("mel_bands", "40"), ("target_time_steps", "2")])
        .unwrap();
    let bytes = encode_pcm16(&vec![0.0; 640], 16_000).unwrap();
    let tiles = Pipeline::new(config).unwrap().run(&bytes).unwrap();
    assert_eq!(tiles.len(), 2);
    assert!(tiles.iter().all(|t| t.shape() == (40, 2)));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = PipelineConfig::default();
    config.fft_size = 400; // smaller than the 800-sample window
    assert!(matches!(
        Pipeline::new(config).unwrap_err(),
        MelsyncError::InvalidConfig(_)
    ));
}

#[test]
fn running_flag_left_set_completes() {
    let bytes = encode_pcm16(&vec![0.0; 320], 16_000).unwrap();
    let running = AtomicBool::new(true);
    let tiles = pipeline().run_with_cancel(&bytes, &running).unwrap();
    assert_eq!(tiles.len(), 1);
    assert!(running.load(Ordering::Relaxed));
}
