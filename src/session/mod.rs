//! Session controller.
//!
//! Owns the one active connection: opens the channel, starts the byte pump
//! and both read loops, serializes writes and tears everything down again.
//! Every way a session can end (user disconnect, device loss, too many read
//! errors) goes through the same teardown path.
//!
//! # Example
//!
//! ```no_run
//! use serial_console::device::DeviceHandle;
//! use serial_console::port::TokioSerialOpener;
//! use serial_console::session::{SessionController, SessionOptions, SessionSettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (session, mut events) = SessionController::new(
//!     Arc::new(TokioSerialOpener::new()),
//!     SessionSettings::default(),
//!     SessionOptions::default(),
//! );
//! session.connect(DeviceHandle::unknown("/dev/ttyUSB0")).await?;
//! session.write(b"AT\r\n").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod loops;
pub mod tee;

pub use error::{SessionError, SessionResult};
pub use events::{SessionEvent, View};
pub use tee::{Branch, PumpExit, Tee, TeeOptions};

use crate::decode::TextEncoding;
use crate::device::DeviceHandle;
use crate::port::{BoxedWriter, PortConfiguration, PortOpener};
use crate::render::{
    BinaryRenderer, SeverityPolicy, TextRenderer, DEFAULT_MAX_LINE_CHARS, DEFAULT_ROW_WIDTH,
    DEFAULT_SCROLLBACK_LINES,
};
use crate::state::{ConnectionState, Controls, InvalidTransition, StateMachine};
use loops::{EventSender, LoopCommand};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Settings snapshotted when a session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub port: PortConfiguration,
    pub encoding: TextEncoding,
}

/// Engine tuning, fixed for the controller's lifetime.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tee: TeeOptions,
    pub hex_row_width: usize,
    pub scrollback_lines: usize,
    /// Longest text line before it is wrapped.
    pub max_line_chars: usize,
    pub severity: Arc<SeverityPolicy>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tee: TeeOptions::default(),
            hex_row_width: DEFAULT_ROW_WIDTH,
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            severity: Arc::new(SeverityPolicy::default()),
        }
    }
}

struct ActiveSession {
    id: u64,
    device: DeviceHandle,
    settings: SessionSettings,
    token: CancellationToken,
    writer: Arc<tokio::sync::Mutex<BoxedWriter>>,
    text_commands: mpsc::UnboundedSender<LoopCommand>,
    binary_commands: mpsc::UnboundedSender<LoopCommand>,
    tasks: Vec<JoinHandle<()>>,
}

/// What a writer needs, cloned out of the active session so no lock is held
/// across an await.
struct WriteHandle {
    writer: Arc<tokio::sync::Mutex<BoxedWriter>>,
    token: CancellationToken,
    text_commands: mpsc::UnboundedSender<LoopCommand>,
    binary_commands: mpsc::UnboundedSender<LoopCommand>,
}

struct Inner {
    opener: Arc<dyn PortOpener>,
    options: SessionOptions,
    pending: Mutex<SessionSettings>,
    state: StateMachine,
    events: EventSender,
    active: Mutex<Option<ActiveSession>>,
    next_session_id: AtomicU64,
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, to: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        let from = self.state.transition(to)?;
        debug!(%from, %to, "connection state changed");
        self.emit(SessionEvent::State(to));
        Ok(from)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.token.cancel();
        }
    }
}

/// Reverts `Connecting` if a connect attempt is abandoned midway.
struct ConnectingGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.inner.set_state(ConnectionState::Disconnected);
        }
    }
}

/// Handle to the session engine. Clones share the same engine.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("device", &self.device())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(
        opener: Arc<dyn PortOpener>,
        settings: SessionSettings,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            opener,
            options,
            pending: Mutex::new(settings),
            state: StateMachine::new(),
            events,
            active: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        });
        (Self { inner }, rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    pub fn controls(&self) -> Controls {
        self.inner.state.controls()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Device of the live session.
    pub fn device(&self) -> Option<DeviceHandle> {
        self.inner.active.lock().as_ref().map(|s| s.device.clone())
    }

    /// Settings the live session was opened with.
    pub fn active_settings(&self) -> Option<SessionSettings> {
        self.inner.active.lock().as_ref().map(|s| s.settings)
    }

    /// Settings the next connect will use.
    pub fn pending_settings(&self) -> SessionSettings {
        *self.inner.pending.lock()
    }

    /// Change the encoding for the next session. A live session keeps its
    /// own.
    pub fn set_encoding(&self, encoding: TextEncoding) {
        self.inner.pending.lock().encoding = encoding;
    }

    /// Change the line parameters for the next session.
    pub fn update_settings(&self, port: PortConfiguration) {
        self.inner.pending.lock().port = port;
    }

    /// Replace the pending settings and connect.
    pub async fn connect_with(
        &self,
        device: DeviceHandle,
        settings: SessionSettings,
    ) -> SessionResult<()> {
        let state = self.state();
        if state != ConnectionState::Disconnected {
            return Err(SessionError::Busy(state));
        }
        *self.inner.pending.lock() = settings;
        self.connect(device).await
    }

    /// Open `device` with the pending settings and start the read loops.
    pub async fn connect(&self, device: DeviceHandle) -> SessionResult<()> {
        let settings = self.pending_settings();
        self.inner
            .set_state(ConnectionState::Connecting)
            .map_err(|e| SessionError::Busy(e.from))?;
        let mut guard = ConnectingGuard {
            inner: &self.inner,
            armed: true,
        };

        info!(port = %device.path(), settings = %settings.port, encoding = %settings.encoding, "connecting");
        let channel = match self.inner.opener.open(&device, &settings.port).await {
            Ok(channel) => channel,
            Err(e) => {
                guard.armed = false;
                let _ = self.inner.set_state(ConnectionState::Disconnected);
                warn!(port = %device.path(), error = %e, "failed to open port");
                if e.is_permission_denied() {
                    let message = format!("Access to {} was denied", device.path());
                    self.inner.emit(SessionEvent::Notice(message));
                    return Err(SessionError::PermissionDenied(device.path().to_string()));
                }
                return Err(SessionError::Open(e));
            }
        };

        let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let options = &self.inner.options;
        let tee = Tee::spawn(channel.reader, options.tee, token.clone());
        let ended = tee.ended.clone();

        let (text_commands, text_rx) = mpsc::unbounded_channel();
        let (binary_commands, binary_rx) = mpsc::unbounded_channel();

        // Each loop holds a sender until it returns; `recv` yields `None`
        // once both are done.
        let (loops_alive, loops_done) = mpsc::channel::<()>(1);

        let text_loop = tokio::spawn({
            let alive = loops_alive.clone();
            let run = loops::run_text_loop(
                id,
                tee.text,
                text_rx,
                TextRenderer::new(options.scrollback_lines, Arc::clone(&options.severity))
                    .with_max_line_chars(options.max_line_chars),
                settings.encoding,
                self.inner.events.clone(),
                token.clone(),
            );
            async move {
                run.await;
                drop(alive);
            }
        });
        let binary_loop = tokio::spawn({
            let alive = loops_alive;
            let run = loops::run_binary_loop(
                id,
                tee.raw,
                binary_rx,
                BinaryRenderer::new(options.hex_row_width, options.scrollback_lines),
                self.inner.events.clone(),
                token.clone(),
            );
            async move {
                run.await;
                drop(alive);
            }
        });
        let pump = tokio::spawn(async move {
            match tee.task.await {
                Ok(exit) => debug!(session_id = id, ?exit, "byte pump stopped"),
                Err(e) => warn!(session_id = id, error = %e, "byte pump task failed"),
            }
        });

        *self.inner.active.lock() = Some(ActiveSession {
            id,
            device: device.clone(),
            settings,
            token: token.clone(),
            writer: Arc::new(tokio::sync::Mutex::new(channel.writer)),
            text_commands,
            binary_commands,
            tasks: vec![pump, text_loop, binary_loop],
        });

        guard.armed = false;
        if let Err(e) = self.inner.set_state(ConnectionState::Connected) {
            // Only reachable if something bypassed the state machine.
            error!(error = %e, "connected session in unexpected state");
        }
        info!(session_id = id, port = %device.path(), "connected");

        tokio::spawn(supervise(
            Arc::downgrade(&self.inner),
            id,
            token,
            ended,
            loops_done,
        ));
        Ok(())
    }

    /// Close the session. Returns `false` when there was nothing to do.
    pub async fn disconnect(&self) -> bool {
        teardown(&self.inner, None).await
    }

    /// Write `payload`, waiting for any write already in flight.
    pub async fn write(&self, payload: &[u8]) -> SessionResult<()> {
        let handle = self.write_handle()?;
        let mut writer = tokio::select! {
            biased;
            _ = handle.token.cancelled() => return Err(SessionError::Interrupted),
            writer = handle.writer.lock() => writer,
        };
        write_locked(&mut writer, &handle, payload).await
    }

    /// Write `payload` unless another write is in flight.
    pub async fn try_write(&self, payload: &[u8]) -> SessionResult<()> {
        let handle = self.write_handle()?;
        let mut writer = handle
            .writer
            .try_lock()
            .map_err(|_| SessionError::ChannelBusy)?;
        write_locked(&mut writer, &handle, payload).await
    }

    /// Empty both views.
    pub fn clear(&self) {
        let active = self.inner.active.lock();
        match active.as_ref() {
            Some(session) => {
                let _ = session.text_commands.send(LoopCommand::Clear);
                let _ = session.binary_commands.send(LoopCommand::Clear);
            }
            None => self.inner.emit(SessionEvent::Cleared(View::Both)),
        }
    }

    fn write_handle(&self) -> SessionResult<WriteHandle> {
        let active = self.inner.active.lock();
        match active.as_ref() {
            Some(session) if self.is_connected() => Ok(WriteHandle {
                writer: Arc::clone(&session.writer),
                token: session.token.clone(),
                text_commands: session.text_commands.clone(),
                binary_commands: session.binary_commands.clone(),
            }),
            _ => {
                error!(state = %self.state(), "write issued without a connected session");
                Err(SessionError::WriteAfterClose)
            }
        }
    }
}

async fn write_locked(
    writer: &mut BoxedWriter,
    handle: &WriteHandle,
    payload: &[u8],
) -> SessionResult<()> {
    if payload.is_empty() {
        return Ok(());
    }

    let result = tokio::select! {
        biased;
        _ = handle.token.cancelled() => return Err(SessionError::Interrupted),
        result = async {
            writer.write_all(payload).await?;
            writer.flush().await
        } => result,
    };
    result?;
    debug!(bytes = payload.len(), "wrote payload");

    // Still under the write lock, so mirrors reach the loops in write order.
    let mirror: Arc<[u8]> = Arc::from(payload);
    let _ = handle
        .text_commands
        .send(LoopCommand::Outgoing(Arc::clone(&mirror)));
    let _ = handle.binary_commands.send(LoopCommand::Outgoing(mirror));
    Ok(())
}

/// Waits for the byte stream to end on its own and tears the session down.
///
/// The loops are left to drain whatever the pump already queued before the
/// session token is cancelled, so bytes sent just before the device closed
/// still reach both views.
async fn supervise(
    inner: Weak<Inner>,
    session_id: u64,
    token: CancellationToken,
    ended: CancellationToken,
    mut loops_done: mpsc::Receiver<()>,
) {
    tokio::select! {
        biased;
        _ = token.cancelled() => return,
        _ = ended.cancelled() => {}
    }
    debug!(session_id, "byte stream ended, draining read loops");
    tokio::select! {
        biased;
        _ = token.cancelled() => return,
        _ = loops_done.recv() => {}
    }
    if token.is_cancelled() {
        return;
    }
    let Some(inner) = inner.upgrade() else {
        return;
    };
    info!(session_id, "device closed the stream");
    teardown(&inner, Some(session_id)).await;
}

/// The single teardown path. With `expected` set, only that session is torn
/// down; a later session is left alone.
async fn teardown(inner: &Inner, expected: Option<u64>) -> bool {
    let session = {
        let mut active = inner.active.lock();
        match active.as_ref() {
            Some(session) if expected.map_or(true, |id| id == session.id) => {}
            _ => return false,
        }
        if inner.set_state(ConnectionState::Disconnecting).is_err() {
            return false;
        }
        match active.take() {
            Some(session) => session,
            None => return false,
        }
    };

    let ActiveSession {
        id,
        device,
        token,
        writer,
        tasks,
        ..
    } = session;
    debug!(session_id = id, "tearing down session");

    token.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(session_id = id, error = %e, "session task failed");
        }
    }

    inner.emit(SessionEvent::Cleared(View::Both));

    {
        let mut writer = writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(session_id = id, error = %e, "ignoring error while closing channel");
        }
    }
    drop(writer);

    if let Err(e) = inner.set_state(ConnectionState::Disconnected) {
        error!(error = %e, "teardown finished in unexpected state");
    }
    info!(session_id = id, port = %device.path(), "disconnected");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockFailure, MockPortOpener};
    use std::time::Duration;

    fn controller(opener: &MockPortOpener) -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
        SessionController::new(
            Arc::new(opener.clone()),
            SessionSettings::default(),
            SessionOptions::default(),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let opener = MockPortOpener::new();
        let (session, mut events) = controller(&opener);

        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.device().unwrap().path(), "MOCK0");

        assert!(session.disconnect().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let states: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::State(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnecting,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_second_disconnect_is_noop() {
        let opener = MockPortOpener::new();
        let (session, mut events) = controller(&opener);
        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();

        assert!(session.disconnect().await);
        drain(&mut events);
        assert!(!session.disconnect().await);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_busy() {
        let opener = MockPortOpener::new();
        let (session, _events) = controller(&opener);
        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();

        let err = session
            .connect(DeviceHandle::unknown("MOCK1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Busy(ConnectionState::Connected)));
        assert_eq!(opener.open_count(), 1);
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_open_failure_reverts_state() {
        let opener = MockPortOpener::new();
        opener.fail_next_open(MockFailure::Busy);
        let (session, _events) = controller(&opener);

        let err = session
            .connect(DeviceHandle::unknown("MOCK0"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Open(_)));
        assert!(err.is_user_facing());
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_permission_denied_emits_notice() {
        let opener = MockPortOpener::new();
        opener.fail_next_open(MockFailure::PermissionDenied);
        let (session, mut events) = controller(&opener);

        let err = session
            .connect(DeviceHandle::unknown("COM3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PermissionDenied(ref p) if p == "COM3"));
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Notice(m) if m.contains("COM3"))));
    }

    #[tokio::test]
    async fn test_write_after_close() {
        let opener = MockPortOpener::new();
        let (session, _events) = controller(&opener);
        let err = session.write(b"hi").await.unwrap_err();
        assert!(matches!(err, SessionError::WriteAfterClose));
    }

    #[tokio::test]
    async fn test_write_reaches_device_and_is_mirrored() {
        let opener = MockPortOpener::new();
        let (session, mut events) = controller(&opener);
        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();
        let mut device = opener.take_device().unwrap();

        session.write(b"AT\r\n").await.unwrap();
        assert_eq!(device.read_written(4).await.unwrap(), b"AT\r\n");

        let mirrored = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Some(SessionEvent::Text(line)) if line.text() == "AT" => return line,
                    Some(_) => continue,
                    None => panic!("event stream closed"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(mirrored.direction, crate::render::Direction::Outgoing);
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_pending_settings_do_not_touch_live_session() {
        let opener = MockPortOpener::new();
        let (session, _events) = controller(&opener);
        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();

        session.set_encoding(TextEncoding::windows_1252());
        session.update_settings(PortConfiguration {
            baud_rate: 9600,
            ..Default::default()
        });

        let live = session.active_settings().unwrap();
        assert_eq!(live.encoding, TextEncoding::utf_8());
        assert_eq!(live.port.baud_rate, 115_200);
        assert_eq!(session.pending_settings().port.baud_rate, 9600);
        session.disconnect().await;

        session.connect(DeviceHandle::unknown("MOCK0")).await.unwrap();
        assert_eq!(opener.last_open().unwrap().1.baud_rate, 9600);
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_clear_while_disconnected() {
        let opener = MockPortOpener::new();
        let (session, mut events) = controller(&opener);
        session.clear();
        assert_eq!(drain(&mut events), vec![SessionEvent::Cleared(View::Both)]);
    }
}
