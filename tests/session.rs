//! End-to-end behaviour of a session over an in-memory pipe.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use rstest::rstest;
use sessionwire::{
    codec::{self, CodecError, EofError, TEXT_MESSAGE_TYPE},
    config::SessionConfig,
    error::{HandlerError, SessionError},
    message::TypedMessage,
    reader::Body,
    registry::MessageRegistry,
    session::{SessionHandle, SessionHandler},
};
use sessionwire_testing::{
    DEFAULT_CAPACITY,
    Event,
    RecordingHandler,
    frame,
    message_frame,
    next_event,
    recording_session,
    spawn_session,
    text_frame,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Notify,
};

async fn closed(events: &mut tokio::sync::mpsc::UnboundedReceiver<Event>) -> Option<SessionError> {
    loop {
        if let Event::Closed(err) = next_event(events).await {
            return err;
        }
    }
}

async fn message(events: &mut tokio::sync::mpsc::UnboundedReceiver<Event>) -> (u32, usize, Bytes) {
    match next_event(events).await {
        Event::Message {
            message_type,
            size,
            body,
        } => (message_type, size, body),
        other => panic!("expected a message, got {other:?}"),
    }
}

#[tokio::test]
async fn frames_are_delivered_in_order_after_ready() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    let mut wire = Vec::new();
    for (ty, body) in [(1_u32, &b"one"[..]), (2, b"two"), (3, b"three")] {
        wire.extend(frame(ty, body));
    }
    pair.peer.write_all(&wire).await.expect("write frames");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(id) if id == pair.handle.id()));
    assert_eq!(message(&mut pair.events).await, (1, 3, Bytes::from_static(b"one")));
    assert_eq!(message(&mut pair.events).await, (2, 3, Bytes::from_static(b"two")));
    assert_eq!(message(&mut pair.events).await, (3, 5, Bytes::from_static(b"three")));

    drop(pair.peer);
    let err = closed(&mut pair.events).await.expect("hang-up is reported");
    assert!(err.is_clean_close());
    pair.task.await.expect("join serve");
}

#[rstest]
#[case::nothing_read(0)]
#[case::partly_read(2)]
#[tokio::test]
async fn unread_body_bytes_never_leak_into_next_frame(#[case] limit: usize) {
    let handler = RecordingHandler::new().read_limit(limit);
    let mut pair = recording_session(handler, SessionConfig::default());
    let mut wire = frame(10, b"abcdef");
    wire.extend(frame(11, b"xyz"));
    pair.peer.write_all(&wire).await.expect("write frames");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    let (ty, size, body) = message(&mut pair.events).await;
    assert_eq!((ty, size), (10, 6));
    assert_eq!(&body[..], &b"abcdef"[..limit]);
    let (ty, size, body) = message(&mut pair.events).await;
    assert_eq!((ty, size), (11, 3));
    assert_eq!(&body[..limit.min(3)], &b"xyz"[..limit.min(3)]);

    pair.handle.close();
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn output_is_flushed_in_order_before_close() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default().with_page_size(64));
    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));

    let mut expected = Vec::new();
    for i in 0..200_u32 {
        let chunk = i.to_be_bytes();
        pair.handle.write(&chunk).expect("open session");
        expected.extend_from_slice(&chunk);
    }
    pair.handle.close();
    assert!(matches!(pair.handle.write(b"late"), Err(SessionError::Closed)));

    let mut received = Vec::new();
    pair.peer.read_to_end(&mut received).await.expect("read output");
    assert_eq!(received, expected);
    assert!(closed(&mut pair.events).await.is_none());
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn concurrent_producers_keep_their_own_order() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));

    let producers: Vec<_> = (0_u8..4)
        .map(|p| {
            let handle = pair.handle.clone();
            tokio::spawn(async move {
                for seq in 0_u8..50 {
                    handle.write(&[p, seq]).expect("open session");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("join producer");
    }
    pair.handle.close();

    let mut received = Vec::new();
    pair.peer.read_to_end(&mut received).await.expect("read output");
    assert_eq!(received.len(), 4 * 50 * 2);
    let mut next_seq = [0_u8; 4];
    for pair_bytes in received.chunks_exact(2) {
        let (p, seq) = (usize::from(pair_bytes[0]), pair_bytes[1]);
        assert_eq!(seq, next_seq[p], "producer {p} reordered");
        next_seq[p] += 1;
    }
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn on_close_runs_exactly_once() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    pair.handle.close();
    pair.handle.close();
    drop(pair.peer);
    pair.task.await.expect("join serve");

    let mut closes = 0;
    while let Ok(event) = pair.events.try_recv() {
        if matches!(event, Event::Closed(_)) {
            closes += 1;
        }
    }
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn handler_error_closes_session() {
    let handler = RecordingHandler::new().fail_on(9);
    let mut pair = recording_session(handler, SessionConfig::default());
    let mut wire = frame(9, b"bad");
    wire.extend(frame(10, b"never"));
    pair.peer.write_all(&wire).await.expect("write frames");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    assert_eq!(message(&mut pair.events).await.0, 9);
    let err = closed(&mut pair.events).await.expect("handler error is reported");
    assert!(matches!(err, SessionError::Handler(ref e) if e.to_string().contains("9")));
    assert_eq!(err.error_type(), "handler");
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn header_overflow_is_a_framing_error() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    pair.peer
        .write_all(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01])
        .await
        .expect("write header");

    let err = closed(&mut pair.events).await.expect("overflow is reported");
    assert!(matches!(err, SessionError::Codec(CodecError::Framing(_))));
    assert!(!err.is_network_error());
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn hang_up_mid_header_is_reported() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    pair.peer.write_all(&[0x81]).await.expect("write partial header");
    drop(pair.peer);

    let err = closed(&mut pair.events).await.expect("truncation is reported");
    assert!(matches!(
        err,
        SessionError::Codec(CodecError::Eof(EofError::MidHeader { .. }))
    ));
    assert!(err.is_network_error());
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn hang_up_mid_body_is_a_network_error() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    let mut wire = bytes::BytesMut::new();
    codec::encode_frame_header(&mut wire, 1, 10);
    wire.extend_from_slice(b"abc");
    pair.peer.write_all(&wire).await.expect("write partial frame");
    drop(pair.peer);

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    let err = closed(&mut pair.events).await.expect("truncation is reported");
    assert!(err.is_network_error());
    assert_eq!(err.error_type(), "io");
    let eof = err
        .io_error()
        .and_then(std::io::Error::get_ref)
        .and_then(|inner| inner.downcast_ref::<EofError>())
        .copied();
    assert_eq!(
        eof,
        Some(EofError::MidFrame {
            remaining: 7,
            expected: 10,
        })
    );
    pair.task.await.expect("join serve");
}

/// Sleeps inside `on_message` so a close can arrive mid-handler.
struct SlowHandler {
    started: Arc<Notify>,
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl SessionHandler for SlowHandler {
    async fn on_message(
        &self,
        _session: &SessionHandle,
        _message_type: u32,
        mut body: Body<'_>,
    ) -> Result<(), HandlerError> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;
        body.read_to_end().await?;
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn on_close(&self, _session: &SessionHandle, _err: Option<SessionError>) {}
}

#[tokio::test]
async fn close_lets_running_handler_finish() {
    let started = Arc::new(Notify::new());
    let finished = Arc::new(AtomicBool::new(false));
    let handler = SlowHandler {
        started: Arc::clone(&started),
        finished: Arc::clone(&finished),
    };
    let (local, mut peer) = tokio::io::duplex(DEFAULT_CAPACITY);
    let (handle, task) = spawn_session(local, handler, SessionConfig::default());
    peer.write_all(&frame(1, b"slow")).await.expect("write frame");

    tokio::time::timeout(Duration::from_secs(1), started.notified())
        .await
        .expect("handler started");
    handle.close();
    task.await.expect("join serve");
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn idle_sessions_time_out() {
    let config = SessionConfig::default().with_read_timeout(Some(Duration::from_secs(5)));
    let mut pair = recording_session(RecordingHandler::new(), config);
    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));

    tokio::time::advance(Duration::from_secs(6)).await;
    let err = closed(&mut pair.events).await.expect("timeout is reported");
    assert_eq!(
        err.io_error().map(std::io::Error::kind),
        Some(std::io::ErrorKind::TimedOut)
    );
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn text_lines_reach_text_handlers() {
    let handler = RecordingHandler::new().accept_text();
    let mut pair = recording_session(handler, SessionConfig::default());
    let mut wire = text_frame("hello world\r");
    wire.extend(frame(4, b"bin"));
    pair.peer.write_all(&wire).await.expect("write frames");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    assert!(matches!(
        next_event(&mut pair.events).await,
        Event::Text(line) if line == "hello world"
    ));
    assert_eq!(message(&mut pair.events).await, (4, 3, Bytes::from_static(b"bin")));
    pair.handle.close();
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn text_type_is_an_ordinary_frame_without_opt_in() {
    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    pair.peer
        .write_all(&frame(TEXT_MESSAGE_TYPE, b"raw"))
        .await
        .expect("write frame");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    assert_eq!(
        message(&mut pair.events).await,
        (TEXT_MESSAGE_TYPE, 3, Bytes::from_static(b"raw"))
    );
    pair.handle.close();
    pair.task.await.expect("join serve");
}

#[derive(bincode::Encode, bincode::Decode, Debug, Default, PartialEq)]
struct Pair {
    a: i32,
    b: String,
}

impl TypedMessage for Pair {
    const TYPE: u32 = 7;
}

#[tokio::test]
async fn registered_messages_survive_the_wire() {
    let mut registry = MessageRegistry::new();
    registry.register_type::<Pair>("demo");

    let handler = RecordingHandler::new().echo();
    let mut pair = recording_session(handler, SessionConfig::default());
    let sent = Pair {
        a: 14,
        b: "x".into(),
    };
    let wire = message_frame(&sent);
    pair.peer.write_all(&wire).await.expect("write frame");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    let (ty, _, body) = message(&mut pair.events).await;
    assert_eq!(ty, 7);
    let decoded = codec::decode_body(ty, &body, &registry).expect("decode body");
    assert_eq!(decoded.downcast_ref::<Pair>(), Some(&sent));

    let mut echoed = vec![0; wire.len()];
    pair.peer.read_exact(&mut echoed).await.expect("read echo");
    assert_eq!(echoed, wire);

    pair.handle.send(&sent).expect("send typed message");
    let mut sent_again = vec![0; wire.len()];
    pair.peer.read_exact(&mut sent_again).await.expect("read sent frame");
    assert_eq!(sent_again, wire);

    pair.handle.close();
    pair.task.await.expect("join serve");
}

#[tokio::test]
async fn encoded_messages_travel_as_frame_bodies() {
    let mut registry = MessageRegistry::new();
    registry.register_type::<Pair>("demo");

    let mut pair = recording_session(RecordingHandler::new(), SessionConfig::default());
    let sent = Pair {
        a: 14,
        b: "x".into(),
    };
    let encoded = codec::encode(&sent, 0).expect("encode message");
    pair.peer
        .write_all(&frame(Pair::TYPE, &encoded))
        .await
        .expect("write frame");

    assert!(matches!(next_event(&mut pair.events).await, Event::Ready(_)));
    let (ty, size, body) = message(&mut pair.events).await;
    assert_eq!((ty, size), (Pair::TYPE, encoded.len()));
    let (consumed, decoded) = codec::decode(&body, &registry).expect("decode message");
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded.downcast_ref::<Pair>(), Some(&sent));

    pair.handle.close();
    pair.task.await.expect("join serve");
}
