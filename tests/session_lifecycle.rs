//! End-to-end session behavior over the in-memory port backend.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use serial_console::device::DeviceHandle;
use serial_console::port::{MockFailure, MockPortOpener};
use serial_console::render::Direction;
use serial_console::session::{SessionError, SessionEvent, SessionOptions, TeeOptions, View};
use serial_console::state::ConnectionState;
use std::collections::BTreeMap;
use std::time::Duration;

#[tokio::test]
async fn test_device_loss_tears_down_once() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);
    let mut device = connected(&opener, &session).await;

    // Unplug straight after the last write: the pending line still has to
    // come out finalized before the session goes away.
    device.feed(b"boot ok\r\npartial").await.unwrap();
    device.unplug();
    let seen = wait_for_state(&mut events, ConnectionState::Disconnected).await;

    assert_eq!(finalized_text(&seen), vec!["boot ok", "partial"]);
    assert_eq!(
        states(&seen),
        vec![ConnectionState::Disconnecting, ConnectionState::Disconnected]
    );
    let disconnecting_at = seen
        .iter()
        .position(|e| *e == SessionEvent::State(ConnectionState::Disconnecting))
        .unwrap();
    assert!(seen[disconnecting_at..]
        .iter()
        .all(|e| !matches!(e, SessionEvent::Text(_) | SessionEvent::Binary(_))));
    let cleared_at = seen
        .iter()
        .position(|e| *e == SessionEvent::Cleared(View::Both))
        .expect("views cleared on teardown");
    assert!(states(&seen[cleared_at..]).contains(&ConnectionState::Disconnected));

    assert!(session.device().is_none());
    assert!(!session.disconnect().await);
    assert!(session.controls().device_selection_enabled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_output_sent_just_before_close_reaches_both_views() {
    const LINES: usize = 200;
    let options = SessionOptions {
        tee: TeeOptions {
            chunk_size: 4,
            ..TeeOptions::default()
        },
        ..SessionOptions::default()
    };
    let payload: String = (0..LINES).map(|i| format!("line{i}\n")).collect();

    for _ in 0..5 {
        let opener = MockPortOpener::new();
        let (session, mut events) = controller_with(&opener, options.clone());
        let mut device = connected(&opener, &session).await;

        device.feed(payload.as_bytes()).await.unwrap();
        device.unplug();
        let seen = wait_for_state(&mut events, ConnectionState::Disconnected).await;

        let mut lines: Vec<_> = seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Text(line) if line.finalized => Some((line.id, line.text())),
                _ => None,
            })
            .collect();
        lines.dedup();
        let expected: Vec<_> = (0..LINES).map(|i| format!("line{i}")).collect();
        assert_eq!(lines.into_iter().map(|(_, text)| text).collect::<Vec<_>>(), expected);

        let mut rows = BTreeMap::new();
        for event in &seen {
            if let SessionEvent::Binary(row) = event {
                rows.insert(row.id, row.bytes.clone());
            }
        }
        let bytes: Vec<u8> = rows.into_values().flatten().collect();
        assert_eq!(bytes, payload.as_bytes());
    }
}

#[tokio::test]
async fn test_no_events_after_disconnect() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);
    let mut device = connected(&opener, &session).await;
    device.feed(b"hello\n").await.unwrap();

    assert!(session.disconnect().await);
    let seen = drain(&mut events);
    assert_eq!(seen.last(), Some(&SessionEvent::State(ConnectionState::Disconnected)));

    // The device keeps talking, but nobody is listening any more.
    let _ = device.feed(b"late data\n").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_reconnect_after_device_loss() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);
    connected(&opener, &session).await.unplug();
    wait_for_state(&mut events, ConnectionState::Disconnected).await;

    let mut device = connected(&opener, &session).await;
    assert_eq!(opener.open_count(), 2);
    device.feed(b"again\n").await.unwrap();
    let seen = collect_until(&mut events, |e| {
        matches!(e, SessionEvent::Text(l) if l.finalized && l.text() == "again")
    })
    .await;
    assert!(!seen.iter().any(|e| *e == SessionEvent::Cleared(View::Both)));
}

#[tokio::test]
async fn test_concurrent_writes_do_not_interleave() {
    // A small pipe forces every write to be split into many partial writes.
    let opener = MockPortOpener::with_buffer_size(8);
    let (session, _events) = controller(&opener);
    let mut device = connected(&opener, &session).await;

    let writers: Vec<_> = [b'a', b'b', b'c', b'd']
        .into_iter()
        .map(|byte| {
            let session = session.clone();
            tokio::spawn(async move { session.write(&[byte; 64]).await })
        })
        .collect();

    let written = device.read_written(256).await.unwrap();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    for run in written.chunks(64) {
        assert!(run.iter().all(|b| *b == run[0]), "interleaved write: {run:?}");
    }
}

#[tokio::test]
async fn test_try_write_reports_busy_channel() {
    let opener = MockPortOpener::with_buffer_size(8);
    let (session, _events) = controller(&opener);
    let mut device = connected(&opener, &session).await;

    let blocked = {
        let session = session.clone();
        tokio::spawn(async move { session.write(&[0x55; 32]).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(matches!(
        session.try_write(b"x").await,
        Err(SessionError::ChannelBusy)
    ));

    assert_eq!(device.read_written(32).await.unwrap(), vec![0x55; 32]);
    blocked.await.unwrap().unwrap();
    session.try_write(b"x").await.unwrap();
    assert_eq!(device.read_written(1).await.unwrap(), b"x");
}

#[tokio::test]
async fn test_disconnect_interrupts_blocked_write() {
    let opener = MockPortOpener::with_buffer_size(4);
    let (session, _events) = controller(&opener);
    let _device = connected(&opener, &session).await;

    let blocked = {
        let session = session.clone();
        tokio::spawn(async move { session.write(&[0u8; 64]).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(session.disconnect().await);
    assert!(matches!(
        blocked.await.unwrap(),
        Err(SessionError::Interrupted)
    ));
    assert!(matches!(
        session.write(b"x").await,
        Err(SessionError::WriteAfterClose)
    ));
}

#[tokio::test]
async fn test_outgoing_is_mirrored_in_order() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);
    let mut device = connected(&opener, &session).await;

    session.write(b"first\r\n").await.unwrap();
    session.write(b"second\r\n").await.unwrap();
    device.read_written(15).await.unwrap();

    let seen = collect_until(&mut events, |e| {
        matches!(e, SessionEvent::Text(l) if l.finalized && l.text() == "second")
    })
    .await;
    let mut outgoing: Vec<(u64, String)> = seen
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Text(l) if l.finalized && l.direction == Direction::Outgoing => {
                Some((l.id.0, l.text()))
            }
            _ => None,
        })
        .collect();
    outgoing.dedup_by_key(|(id, _)| *id);
    let texts: Vec<&str> = outgoing.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn test_failed_opens_leave_controller_usable() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);

    opener.fail_next_open(MockFailure::Busy);
    let err = session
        .connect(DeviceHandle::unknown(MOCK_PATH))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Open(_)));
    assert!(err.is_user_facing());

    opener.fail_next_open(MockFailure::PermissionDenied);
    let err = session
        .connect(DeviceHandle::unknown(MOCK_PATH))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied(_)));

    let seen = drain(&mut events);
    assert!(seen
        .iter()
        .any(|e| matches!(e, SessionEvent::Notice(m) if m.contains("denied"))));
    assert_eq!(session.state(), ConnectionState::Disconnected);

    connected(&opener, &session).await;
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_clear_while_connected_empties_both_views() {
    let opener = MockPortOpener::new();
    let (session, mut events) = controller(&opener);
    let mut device = connected(&opener, &session).await;
    device.feed(b"noise\n").await.unwrap();
    collect_until(&mut events, |e| matches!(e, SessionEvent::Binary(_))).await;

    session.clear();
    let mut cleared = Vec::new();
    while cleared.len() < 2 {
        let seen = collect_until(&mut events, |e| matches!(e, SessionEvent::Cleared(_))).await;
        if let Some(SessionEvent::Cleared(view)) = seen.last() {
            cleared.push(*view);
        }
    }
    assert!(cleared.contains(&View::Text));
    assert!(cleared.contains(&View::Binary));
}
