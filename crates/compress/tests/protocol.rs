use flate2::read::GzDecoder;
use rstest::rstest;
use squash_compress::delegate::{Call, ScriptedProvider};
use squash_compress::error::ErrorKind;
use squash_compress::{BatchCompressor, Phase, Progress, Scheme, Status, StreamBuffers, ZopfliBackend};
use std::io::{Cursor, Read};
use std::num::{NonZeroU64, NonZeroUsize};
use std::sync::Arc;
use std::thread;

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut output = Vec::new();
    GzDecoder::new(data).read_to_end(&mut output).unwrap();
    output
}

fn sample(len: usize) -> Vec<u8> {
    b"It was the best of times, it was the worst of times, it was the age of wisdom. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn ready_scheme() -> Scheme {
    let scheme = Scheme::default();
    scheme.initialize().unwrap();
    scheme
}

#[test]
fn test_small_output_area_drains_exact_batch_output() {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    let input = vec![b'A'; 1000];

    assert_eq!(session.compress(&input, &mut [0u8; 16], 8).unwrap(), Progress::pending(1000, 0));

    let mut drained = Vec::new();
    let mut area = [0u8; 16];
    let mut calls = 0;
    let last = loop {
        let progress = session.compress(&[], &mut area, 8).unwrap();
        calls += 1;
        assert!(progress.produced <= 16);
        drained.extend_from_slice(&area[..progress.produced]);
        if progress.status == Status::Complete {
            break progress;
        }
    };

    let expected = ZopfliBackend::new().compress(&input, NonZeroU64::new(10).unwrap()).unwrap();
    assert_eq!(drained, expected);
    assert_eq!(calls, expected.len().div_ceil(16));
    assert!(last.produced > 0);
    assert_eq!(gunzip(&drained), input);
    assert_eq!(session.phase(), Phase::Done);

    // Draining after completion is an idempotent no-op.
    for _ in 0..3 {
        assert_eq!(session.compress(&[], &mut area, 8).unwrap(), Progress::complete(0));
    }
}

#[rstest]
#[case(6, 1)]
#[case(7, 5)]
#[case(10, 20)]
fn test_chunked_input_matches_one_shot_compression(#[case] level: i32, #[case] effort: u64) {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    let input = sample(3000);
    let mut compressed = Vec::new();
    let buffers = StreamBuffers {
        chunk_size: NonZeroUsize::new(97).unwrap(),
        output_capacity: NonZeroUsize::new(31).unwrap(),
    };
    let totals = session.compress_stream(Cursor::new(&input), &mut compressed, level, buffers).unwrap();

    let expected = ZopfliBackend::new().compress(&input, NonZeroU64::new(effort).unwrap()).unwrap();
    assert_eq!(compressed, expected);
    assert_eq!(totals.input_bytes, 3000);
    assert_eq!(totals.output_bytes, expected.len() as u64);
    assert_eq!(gunzip(&compressed), input);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
fn test_fast_path_round_trip(#[case] level: i32) {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    let input = sample(20_000);
    let mut compressed = Vec::new();
    let buffers = StreamBuffers {
        chunk_size: NonZeroUsize::new(4096).unwrap(),
        output_capacity: NonZeroUsize::new(64).unwrap(),
    };
    session.compress_stream(Cursor::new(&input), &mut compressed, level, buffers).unwrap();
    assert_eq!(gunzip(&compressed), input);
    // The batch path was never touched.
    assert_eq!(session.input_len(), 0);
    assert_eq!(session.phase(), Phase::Accumulating);
}

#[test]
fn test_empty_stream_produces_valid_gzip() {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    let mut compressed = Vec::new();
    session.compress_stream(Cursor::new(Vec::new()), &mut compressed, 9, StreamBuffers::default()).unwrap();
    assert!(!compressed.is_empty());
    assert!(gunzip(&compressed).is_empty());
}

#[test]
fn test_non_terminal_empty_chunk_ends_input() {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    session.compress(&[b'x'; 100], &mut [], 6).unwrap();
    let progress = session.compress(&[], &mut [0u8; 8], 6).unwrap();
    assert_eq!(progress.produced, 8);

    let err = session.compress(&[b'y'; 50], &mut [0u8; 8], 6).unwrap_err();
    assert!(matches!(*err, ErrorKind::InvalidArgument(_)));
    assert_eq!(session.input_len(), 100);
    assert_eq!(session.delivered(), 8);
}

#[rstest]
#[case(0)]
#[case(11)]
fn test_invalid_level_is_rejected(#[case] level: i32) {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    let err = session.compress(b"abc", &mut [0u8; 8], level).unwrap_err();
    assert!(matches!(*err, ErrorKind::InvalidArgument(_)));
    assert_eq!(session.input_len(), 0);
    assert_eq!(session.phase(), Phase::Accumulating);
}

#[test]
fn test_destroy_in_any_state() {
    let scheme = ready_scheme();

    let accumulating = scheme.create_session(0).unwrap();
    scheme.destroy_session(accumulating);

    let mut draining = scheme.create_session(0).unwrap();
    draining.compress(&sample(500), &mut [], 7).unwrap();
    draining.compress(&[], &mut [0u8; 4], 7).unwrap();
    assert_eq!(draining.phase(), Phase::Draining);
    scheme.destroy_session(draining);

    let mut fast = scheme.create_session(0).unwrap();
    fast.compress(b"partial", &mut [0u8; 4], 2).unwrap();
    scheme.destroy_session(fast);
}

#[test]
fn test_delegate_lifecycle_follows_sessions() {
    let provider = Arc::new(ScriptedProvider::default());
    let scheme = Scheme::new(provider.clone());
    scheme.initialize().unwrap();

    let mut fast = scheme.create_session(7).unwrap();
    let batch = scheme.create_session(8).unwrap();
    let mut echoed = Vec::new();
    fast.compress_stream(Cursor::new(b"forwarded".to_vec()), &mut echoed, 4, StreamBuffers::default()).unwrap();
    assert_eq!(echoed, b"forwarded");
    scheme.destroy_session(fast);
    scheme.destroy_session(batch);
    scheme.deinitialize();

    assert_eq!(
        provider.calls(),
        [
            Call::Init,
            Call::Create { reserved: 7 },
            Call::Create { reserved: 8 },
            Call::Compress { input: 9, capacity: 4096, intensity: 8 },
            Call::Compress { input: 0, capacity: 4096, intensity: 8 },
            Call::Destroy,
            Call::Destroy,
            Call::Deinit,
        ]
    );
}

#[test]
fn test_sessions_lose_fast_path_after_deinitialize() {
    let provider = Arc::new(ScriptedProvider::default());
    let scheme = Scheme::new(provider.clone());
    scheme.initialize().unwrap();
    let mut session = scheme.create_session(0).unwrap();
    scheme.deinitialize();

    let err = session.compress(b"abc", &mut [0u8; 8], 2).unwrap_err();
    assert_eq!(*err, ErrorKind::DelegateUnavailable);
    assert!(!provider.calls().iter().any(|call| matches!(call, Call::Compress { .. })));

    let mut compressed = Vec::new();
    session.compress_stream(Cursor::new(sample(200)), &mut compressed, 6, StreamBuffers::default()).unwrap();
    assert_eq!(gunzip(&compressed), sample(200));
}

#[test]
fn test_reset_keeps_accumulated_input() {
    let scheme = ready_scheme();
    let mut session = scheme.create_session(0).unwrap();
    session.compress(b"keep me", &mut [], 8).unwrap();
    session.reset().unwrap();
    assert_eq!(session.input_len(), 7);
}

#[test]
fn test_sessions_run_in_parallel() {
    let scheme = ready_scheme();
    let handles: Vec<_> = (1..=10)
        .map(|level| {
            let mut session = scheme.create_session(0).unwrap();
            thread::spawn(move || {
                let input = sample(1000 + level as usize * 10);
                let mut compressed = Vec::new();
                session.compress_stream(Cursor::new(&input), &mut compressed, level, StreamBuffers::default()).unwrap();
                assert_eq!(gunzip(&compressed), input);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
