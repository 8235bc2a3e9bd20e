//! Tests for `sessionwire` metrics.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
#![cfg(feature = "metrics")]

use rstest::rstest;
use sessionwire::{
    config::SessionConfig,
    metrics::{self, BYTES_WRITTEN, Direction, ERRORS_TOTAL, FRAMES_PROCESSED, SESSIONS_ACTIVE},
};
use sessionwire_testing::{
    RecordingHandler,
    frame,
    metrics::{counter_value, debugging_recorder, gauge_value},
    recording_session,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder();
    ::metrics::with_local_recorder(&recorder, || metrics::inc_frames(direction));
    assert_eq!(
        counter_value(&snapshotter, FRAMES_PROCESSED, Some(("direction", label))),
        1
    );
}

#[rstest]
#[case(1)]
#[case(3)]
fn error_metric_counts_by_type(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder();
    ::metrics::with_local_recorder(&recorder, || {
        (0..expected).for_each(|_| metrics::inc_errors("framing"));
    });
    assert_eq!(
        counter_value(&snapshotter, ERRORS_TOTAL, Some(("error_type", "framing"))),
        expected
    );
}

#[test]
fn session_gauge_tracks_open_sessions() {
    let (snapshotter, recorder) = debugging_recorder();
    ::metrics::with_local_recorder(&recorder, || {
        metrics::inc_sessions();
        metrics::inc_sessions();
        metrics::dec_sessions();
    });
    assert_eq!(gauge_value(&snapshotter, SESSIONS_ACTIVE), Some(1.0));
}

/// A served session reports frames, bytes, and its close.
#[test]
fn served_session_records_traffic() {
    let (snapshotter, recorder) = debugging_recorder();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");
    // Session tasks run on this thread, so the local recorder sees them.
    ::metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let handler = RecordingHandler::new().echo();
            let mut pair = recording_session(handler, SessionConfig::default());
            let wire = frame(3, b"ping");
            pair.peer.write_all(&wire).await.expect("write frame");
            let mut echoed = vec![0; wire.len()];
            pair.peer.read_exact(&mut echoed).await.expect("read echo");
            drop(pair.peer);
            pair.task.await.expect("join serve");
        });
    });

    assert_eq!(
        counter_value(&snapshotter, FRAMES_PROCESSED, Some(("direction", "inbound"))),
        1
    );
    assert_eq!(
        counter_value(&snapshotter, FRAMES_PROCESSED, Some(("direction", "outbound"))),
        1
    );
    assert_eq!(counter_value(&snapshotter, BYTES_WRITTEN, None), 6);
    assert_eq!(
        counter_value(&snapshotter, ERRORS_TOTAL, Some(("error_type", "eof"))),
        1
    );
    assert_eq!(gauge_value(&snapshotter, SESSIONS_ACTIVE), Some(0.0));
}
