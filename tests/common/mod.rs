//! Shared test utilities.
//!
//! Builds sessions on the in-memory port backend and collects the events
//! they emit.

#![allow(dead_code)]

use serial_console::device::DeviceHandle;
use serial_console::port::{MockDevice, MockPortOpener};
use serial_console::render::TextLine;
use serial_console::session::{SessionController, SessionEvent, SessionOptions, SessionSettings};
use serial_console::state::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const MOCK_PATH: &str = "/dev/ttyMOCK0";

/// A controller on `opener` with default settings.
pub fn controller(opener: &MockPortOpener) -> (SessionController, UnboundedReceiver<SessionEvent>) {
    SessionController::new(
        Arc::new(opener.clone()),
        SessionSettings::default(),
        SessionOptions::default(),
    )
}

/// A controller on `opener` with custom engine options.
pub fn controller_with(
    opener: &MockPortOpener,
    options: SessionOptions,
) -> (SessionController, UnboundedReceiver<SessionEvent>) {
    SessionController::new(Arc::new(opener.clone()), SessionSettings::default(), options)
}

/// Connect to the mock path and hand back the device end.
pub async fn connected(opener: &MockPortOpener, session: &SessionController) -> MockDevice {
    session
        .connect(DeviceHandle::unknown(MOCK_PATH))
        .await
        .expect("connect to mock device");
    opener.take_device().expect("mock device after open")
}

/// Every event already queued.
pub fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Collect events until `done` returns true for one of them, or time out.
pub async fn collect_until(
    events: &mut UnboundedReceiver<SessionEvent>,
    done: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) => {
                let stop = done(&event);
                out.push(event);
                if stop {
                    return out;
                }
            }
            Ok(None) | Err(_) => panic!("timed out waiting for event; got {out:#?}"),
        }
    }
}

/// Wait for the controller to report `state`.
pub async fn wait_for_state(
    events: &mut UnboundedReceiver<SessionEvent>,
    state: ConnectionState,
) -> Vec<SessionEvent> {
    collect_until(events, |e| *e == SessionEvent::State(state)).await
}

pub fn states(events: &[SessionEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}

/// The final text of each finalized line, in emission order.
pub fn finalized_text(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Text(line) if line.finalized => Some(TextLine::text(line)),
            _ => None,
        })
        .collect()
}
