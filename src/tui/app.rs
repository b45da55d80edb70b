//! TUI Application state and main loop.

use crate::config::Config;
use crate::device::{
    Capabilities, DeviceDiscovery, DeviceEvent, DeviceHandle, DeviceWatcher, SystemDiscovery,
};
use crate::error::AppResult;
use crate::input::{parse_hex_bytes, LineEnding};
use crate::port::{PortOpener, TokioSerialOpener};
use crate::render::{HexRow, TextLine};
use crate::session::{SessionController, SessionEvent, View};
use crate::state::{ConnectionState, Controls};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::event::{Event, EventHandler};
use super::history::InputHistory;
use super::pane::OutputPane;
use super::settings::SettingsField;
use super::theme::Theme;
use super::ui;

/// Lines moved by PageUp/PageDown.
const PAGE_LINES: usize = 10;

/// Application mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Navigation and viewing
    #[default]
    Normal,
    /// Typing input for the device
    Insert,
    /// Help overlay
    Help,
}

/// Focus area in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusArea {
    /// Port list panel
    #[default]
    PortList,
    /// Settings panel (only while disconnected)
    Settings,
    /// Text output
    Text,
    /// Hex output
    Hex,
}

/// How typed input is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Encoded text plus the line ending
    #[default]
    Text,
    /// Hex byte string such as `0d 0a`
    Bytes,
}

/// Application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Application is running
    Running,
    /// Application should quit
    Quitting,
}

/// Main TUI application.
pub struct App {
    /// Current app state
    pub state: AppState,
    /// Current mode
    pub mode: Mode,
    /// Current theme
    pub theme: Theme,
    /// Focus area
    pub focus: FocusArea,

    /// Configuration
    pub config: Config,
    /// Platform features
    pub capabilities: Capabilities,

    session: SessionController,
    discovery: Arc<dyn DeviceDiscovery>,
    events: EventHandler,
    watcher: Option<DeviceWatcher>,
    /// Payloads waiting for the writer task, in the order they were entered.
    outgoing: mpsc::UnboundedSender<Vec<u8>>,

    /// Last state reported by the session
    pub connection: ConnectionState,
    /// Enablement derived from `connection`
    pub controls: Controls,

    /// Text view
    pub text_pane: OutputPane<TextLine>,
    /// Hex view
    pub hex_pane: OutputPane<HexRow>,

    /// Current input text
    pub input: String,
    /// Cursor position in input, in characters
    pub cursor_pos: usize,
    /// Sent input, most recent first
    pub history: InputHistory,
    pub input_mode: InputMode,
    pub line_ending: LineEnding,

    /// Available ports (for port list)
    pub devices: Vec<DeviceHandle>,
    /// Selected port index
    pub selected_port: usize,
    /// Selected settings row
    pub selected_field: usize,

    /// Device of the live session
    pub connected_device: Option<DeviceHandle>,
    /// Connection start time (for uptime display)
    pub connect_time: Option<Instant>,

    /// Status message to display
    pub status_message: Option<String>,

    pub show_non_printable: bool,
    pub show_timestamps: bool,
}

impl App {
    /// Create an application talking to real serial ports.
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_backends(
            config,
            Arc::new(TokioSerialOpener::new()),
            Arc::new(SystemDiscovery),
            Capabilities::detect(),
        )
    }

    /// Create an application on the given port backend and device source.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_backends(
        config: Config,
        opener: Arc<dyn PortOpener>,
        discovery: Arc<dyn DeviceDiscovery>,
        capabilities: Capabilities,
    ) -> AppResult<Self> {
        let theme = Theme::by_name(&config.tui.theme)
            .cloned()
            .unwrap_or_default();
        let (session, session_events) =
            SessionController::new(opener, config.session_settings()?, config.session_options()?);

        let events = EventHandler::new();
        events.bridge(session_events, Event::Session);
        let outgoing = spawn_writer(session.clone(), events.sender());

        let devices = if capabilities.serial {
            discovery.list_known_devices()
        } else {
            Vec::new()
        };
        let connection = session.state();
        let scrollback = config.render.scrollback_lines;

        Ok(Self {
            state: AppState::Running,
            mode: Mode::Normal,
            theme,
            focus: FocusArea::PortList,
            capabilities,
            session,
            discovery,
            events,
            watcher: None,
            outgoing,
            connection,
            controls: connection.controls(),
            text_pane: OutputPane::new(scrollback),
            hex_pane: OutputPane::new(scrollback),
            input: String::new(),
            cursor_pos: 0,
            history: InputHistory::new(config.tui.history_size),
            input_mode: InputMode::Text,
            line_ending: config.tui.line_ending,
            devices,
            selected_port: 0,
            selected_field: 0,
            connected_device: None,
            connect_time: None,
            status_message: None,
            show_non_printable: config.render.show_non_printable,
            show_timestamps: config.tui.show_timestamps,
            config,
        })
    }

    /// The session engine behind this UI.
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Run the application main loop.
    ///
    /// Needs the multi-threaded runtime: waiting for the next event blocks
    /// this worker while the session tasks run on the others.
    pub async fn run(&mut self) -> AppResult<()> {
        // Set up terminal
        let mut terminal = ui::setup_terminal()?;

        self.events
            .spawn_terminal_input(self.config.tui.refresh_interval());
        if self.capabilities.serial {
            let (watcher, device_events) = DeviceWatcher::spawn(
                Arc::clone(&self.discovery),
                self.config.serial.discovery_interval(),
            );
            self.events.bridge(device_events, Event::Device);
            self.watcher = Some(watcher);
        }

        // Main loop
        while self.state == AppState::Running {
            terminal.draw(|frame| ui::render(self, frame))?;

            match tokio::task::block_in_place(|| self.events.next()) {
                Ok(event) => {
                    self.handle_event(event);
                    // Drain whatever else is queued before redrawing.
                    while let Some(event) = self.events.try_next() {
                        self.handle_event(event);
                    }
                }
                Err(_) => self.state = AppState::Quitting,
            }
        }

        if self.session.disconnect().await {
            debug!("session closed on exit");
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.stop().await;
        }

        // Restore terminal
        ui::restore_terminal(terminal)?;

        Ok(())
    }

    /// Apply one event to the application state.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick | Event::Mouse(_) | Event::Resize(_, _) => {}
            Event::Key(key) => self.handle_key(key),
            Event::Session(event) => self.handle_session_event(event),
            Event::Device(event) => self.handle_device_event(event),
            Event::Error(err) => {
                self.status_message = Some(format!("Error: {}", err));
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::State(state) => self.on_state(state),
            SessionEvent::Text(line) => self.text_pane.upsert(line),
            SessionEvent::Binary(row) => self.hex_pane.upsert(row),
            SessionEvent::Cleared(view) => {
                if view.includes(View::Text) {
                    self.text_pane.clear();
                }
                if view.includes(View::Binary) {
                    self.hex_pane.clear();
                }
            }
            SessionEvent::Notice(message) => self.status_message = Some(message),
        }
    }

    fn on_state(&mut self, state: ConnectionState) {
        let previous = self.connection;
        self.connection = state;
        self.controls = state.controls();

        match state {
            ConnectionState::Connecting => {
                self.status_message = Some("Connecting...".to_string());
            }
            ConnectionState::Connected => {
                self.connected_device = self.session.device();
                self.connect_time = Some(Instant::now());
                if let Some(device) = &self.connected_device {
                    self.status_message = Some(format!("Connected to {}", device.path()));
                }
                if self.mode == Mode::Normal {
                    self.mode = Mode::Insert;
                }
            }
            ConnectionState::Disconnecting => {}
            ConnectionState::Disconnected => {
                let device = self.connected_device.take();
                if let (Some(device), ConnectionState::Disconnecting) = (device, previous) {
                    self.status_message = Some(format!("Disconnected from {}", device.path()));
                }
                self.connect_time = None;
                if self.mode == Mode::Insert {
                    self.mode = Mode::Normal;
                }
            }
        }

        if self.focus == FocusArea::Settings && !self.controls.settings_visible {
            self.focus = FocusArea::Text;
        }
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Added(device) => {
                if !self.devices.iter().any(|d| d.path() == device.path()) {
                    self.devices.push(device);
                    self.devices.sort_by(|a, b| a.path().cmp(b.path()));
                }
            }
            DeviceEvent::Removed(device) => {
                self.devices.retain(|d| d.path() != device.path());
                if self.selected_port >= self.devices.len() {
                    self.selected_port = self.devices.len().saturating_sub(1);
                }
            }
        }
    }

    /// Handle keyboard input.
    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.state = AppState::Quitting;
            return;
        }
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Insert => self.handle_insert_key(key),
            Mode::Help => self.handle_help_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.state = AppState::Quitting,
            KeyCode::Char('i') => self.mode = Mode::Insert,
            KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.session.clear();
            }
            KeyCode::F(1) | KeyCode::Char('?') => self.mode = Mode::Help,
            KeyCode::Tab => self.cycle_focus(),
            KeyCode::Char('c') => self.connect_selected_port(),
            KeyCode::Char('d') => self.disconnect(),
            KeyCode::Char('e') => {
                self.line_ending = self.line_ending.cycle();
                self.status_message = Some(format!("Line ending: {}", self.line_ending));
            }
            KeyCode::Char('b') => self.toggle_input_mode(),
            KeyCode::Char('n') => self.show_non_printable = !self.show_non_printable,
            KeyCode::Char('t') => self.show_timestamps = !self.show_timestamps,
            KeyCode::Char('r') => self.refresh_ports(),
            KeyCode::Up | KeyCode::Char('k') => self.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(),
            KeyCode::Left | KeyCode::Char('h') => self.adjust_setting(false),
            KeyCode::Right => self.adjust_setting(true),
            KeyCode::PageUp => self.page(true),
            KeyCode::PageDown => self.page(false),
            KeyCode::End | KeyCode::Char('G') => match self.focus {
                FocusArea::Hex => self.hex_pane.scroll_to_bottom(),
                _ => self.text_pane.scroll_to_bottom(),
            },
            KeyCode::Enter => {
                if self.focus == FocusArea::PortList && self.controls.device_selection_enabled {
                    self.connect_selected_port();
                } else {
                    self.mode = Mode::Insert;
                }
            }
            _ => {}
        }
    }

    fn handle_insert_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => self.send_input(),
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input.chars().count() {
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            KeyCode::Left => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                }
            }
            KeyCode::Right => {
                if self.cursor_pos < self.input.chars().count() {
                    self.cursor_pos += 1;
                }
            }
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input.chars().count(),
            KeyCode::Up => {
                if let Some(entry) = self.history.older() {
                    self.input = entry.to_string();
                    self.cursor_pos = self.input.chars().count();
                }
            }
            KeyCode::Down => {
                self.input = self.history.newer().unwrap_or_default().to_string();
                self.cursor_pos = self.input.chars().count();
            }
            KeyCode::Tab => self.toggle_input_mode(),
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.input.insert(at, c);
                self.cursor_pos += 1;
            }
            _ => {}
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('q') | KeyCode::Char('?') => {
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    /// Cycle through focus areas.
    fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusArea::PortList if self.controls.settings_visible => FocusArea::Settings,
            FocusArea::PortList | FocusArea::Settings => FocusArea::Text,
            FocusArea::Text => FocusArea::Hex,
            FocusArea::Hex => FocusArea::PortList,
        };
    }

    fn toggle_input_mode(&mut self) {
        self.input_mode = match self.input_mode {
            InputMode::Text => InputMode::Bytes,
            InputMode::Bytes => InputMode::Text,
        };
    }

    fn move_up(&mut self) {
        match self.focus {
            FocusArea::PortList => self.selected_port = self.selected_port.saturating_sub(1),
            FocusArea::Settings => self.selected_field = self.selected_field.saturating_sub(1),
            FocusArea::Text => self.text_pane.scroll_up(1),
            FocusArea::Hex => self.hex_pane.scroll_up(1),
        }
    }

    fn move_down(&mut self) {
        match self.focus {
            FocusArea::PortList => {
                if self.selected_port < self.devices.len().saturating_sub(1) {
                    self.selected_port += 1;
                }
            }
            FocusArea::Settings => {
                if self.selected_field < SettingsField::ALL.len() - 1 {
                    self.selected_field += 1;
                }
            }
            FocusArea::Text => self.text_pane.scroll_down(1),
            FocusArea::Hex => self.hex_pane.scroll_down(1),
        }
    }

    /// Page the hex view when it has focus, the text view otherwise.
    fn page(&mut self, up: bool) {
        match (self.focus == FocusArea::Hex, up) {
            (true, true) => self.hex_pane.scroll_up(PAGE_LINES),
            (true, false) => self.hex_pane.scroll_down(PAGE_LINES),
            (false, true) => self.text_pane.scroll_up(PAGE_LINES),
            (false, false) => self.text_pane.scroll_down(PAGE_LINES),
        }
    }

    /// Change the selected setting for the next connection.
    fn adjust_setting(&mut self, forward: bool) {
        if self.focus != FocusArea::Settings || !self.controls.settings_visible {
            return;
        }
        let Some(field) = SettingsField::ALL.get(self.selected_field).copied() else {
            return;
        };
        let mut settings = self.session.pending_settings();
        field.adjust(&mut settings, forward);
        self.session.update_settings(settings.port);
        self.session.set_encoding(settings.encoding);
    }

    /// Send the current input.
    fn send_input(&mut self) {
        if self.input.is_empty() && self.input_mode == InputMode::Bytes {
            return;
        }
        if !self.controls.write_enabled {
            self.status_message = Some("Not connected".to_string());
            return;
        }

        let payload = match self.input_mode {
            InputMode::Text => {
                let encoding = self
                    .session
                    .active_settings()
                    .unwrap_or_else(|| self.session.pending_settings())
                    .encoding;
                self.line_ending.encode_text(&self.input, encoding)
            }
            InputMode::Bytes => match parse_hex_bytes(&self.input) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.status_message = Some(e.to_string());
                    return;
                }
            },
        };

        self.history.push(&self.input);
        self.input.clear();
        self.cursor_pos = 0;
        self.text_pane.scroll_to_bottom();
        self.hex_pane.scroll_to_bottom();

        if self.outgoing.send(payload).is_err() {
            warn!("writer task is gone, input dropped");
            self.status_message = Some("Input could not be sent".to_string());
        }
    }

    /// Refresh the list of available ports.
    fn refresh_ports(&mut self) {
        if !self.capabilities.serial {
            self.status_message = Some("Serial ports are not supported here".to_string());
            return;
        }
        self.devices = self.discovery.list_known_devices();
        if self.selected_port >= self.devices.len() {
            self.selected_port = self.devices.len().saturating_sub(1);
        }
    }

    /// Connect to the selected port.
    fn connect_selected_port(&mut self) {
        if !self.controls.device_selection_enabled {
            return;
        }
        let Some(device) = self.devices.get(self.selected_port).cloned() else {
            self.status_message = Some("No ports available".to_string());
            return;
        };

        let session = self.session.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            if let Err(e) = session.connect(device).await {
                let _ = sender.send(Event::Error(e.to_string()));
            }
        });
    }

    fn disconnect(&mut self) {
        if !self.controls.write_enabled {
            return;
        }
        let session = self.session.clone();
        tokio::spawn(async move {
            session.disconnect().await;
        });
    }

    /// Get uptime string.
    pub fn uptime_string(&self) -> String {
        match self.connect_time {
            Some(start) => {
                let elapsed = start.elapsed();
                let secs = elapsed.as_secs();
                let hours = secs / 3600;
                let mins = (secs % 3600) / 60;
                let secs = secs % 60;
                format!("{:02}:{:02}:{:02}", hours, mins, secs)
            }
            None => "--:--:--".to_string(),
        }
    }
}

/// One task performs every write, so payloads reach the device in the
/// order the user entered them.
fn spawn_writer(
    session: SessionController,
    errors: std::sync::mpsc::Sender<Event>,
) -> mpsc::UnboundedSender<Vec<u8>> {
    let (outgoing, mut payloads) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(async move {
        while let Some(payload) = payloads.recv().await {
            if let Err(e) = session.write(&payload).await {
                warn!(error = %e, "write failed");
                if errors.send(Event::Error(e.to_string())).is_err() {
                    break;
                }
            }
        }
        debug!("writer task stopped");
    });
    outgoing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceDescriptor, StaticDiscovery};
    use crate::port::MockPortOpener;
    use crossterm::event::KeyEventKind;
    use std::time::Duration;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
    }

    fn test_app(opener: &MockPortOpener) -> App {
        let discovery = StaticDiscovery::new(vec![DeviceHandle::new(
            "/dev/ttyACM0",
            DeviceDescriptor::Usb {
                vendor_id: 0x2341,
                product_id: 0x0043,
                manufacturer: None,
                product: None,
            },
        )]);
        App::with_backends(
            Config::default(),
            Arc::new(opener.clone()),
            Arc::new(discovery),
            Capabilities {
                serial: true,
                bluetooth: false,
            },
        )
        .unwrap()
    }

    /// Apply queued events until `done` holds or a second passes.
    async fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            while let Some(event) = app.events.try_next() {
                app.handle_event(event);
            }
            if done(app) {
                return true;
            }
            if tokio::time::Instant::now() > deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_connect_send_and_receive() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        assert!(app.controls.device_selection_enabled);

        app.handle_event(key(KeyCode::Char('c')));
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Connected).await);
        assert_eq!(app.mode, Mode::Insert);
        assert!(app.controls.write_enabled);
        assert!(!app.controls.settings_visible);

        let mut device = opener.take_device().unwrap();
        type_text(&mut app, "AT");
        app.handle_event(key(KeyCode::Enter));
        assert_eq!(device.read_written(4).await.unwrap(), b"AT\r\n");
        assert_eq!(app.history.entries().collect::<Vec<_>>(), vec!["AT"]);
        assert!(app.input.is_empty());

        device.feed(b"OK\r\n").await.unwrap();
        assert!(
            pump_until(&mut app, |a| a
                .text_pane
                .visible(10)
                .any(|l| l.text() == "OK" && l.finalized))
            .await
        );
        assert!(!app.hex_pane.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_inputs_reach_the_device_in_entry_order() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(key(KeyCode::Char('c')));
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Connected).await);
        let mut device = opener.take_device().unwrap();

        let entries: Vec<String> = (0..200).map(|i| format!("{i:03}")).collect();
        for entry in &entries {
            type_text(&mut app, entry);
            app.handle_event(key(KeyCode::Enter));
        }

        let expected: Vec<u8> = entries
            .iter()
            .flat_map(|entry| format!("{entry}\r\n").into_bytes())
            .collect();
        let written = tokio::time::timeout(
            Duration::from_secs(5),
            device.read_written(expected.len()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(String::from_utf8_lossy(&written), String::from_utf8_lossy(&expected));
    }

    #[tokio::test]
    async fn test_device_loss_returns_to_port_list() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(key(KeyCode::Char('c')));
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Connected).await);

        opener.take_device().unwrap().unplug();
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Disconnected).await);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.controls.device_selection_enabled);
        assert!(app.connected_device.is_none());
    }

    #[tokio::test]
    async fn test_settings_only_change_while_disconnected() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);

        app.handle_event(key(KeyCode::Tab));
        assert_eq!(app.focus, FocusArea::Settings);
        app.handle_event(key(KeyCode::Right));
        assert_eq!(app.session().pending_settings().port.baud_rate, 57_600);

        app.handle_event(key(KeyCode::Char('c')));
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Connected).await);
        assert_eq!(opener.last_open().unwrap().1.baud_rate, 57_600);
        // Settings panel is hidden, so focus moved away from it.
        assert_eq!(app.focus, FocusArea::Text);
        app.handle_event(key(KeyCode::Esc));
        app.handle_event(key(KeyCode::Right));
        assert_eq!(app.session().pending_settings().port.baud_rate, 57_600);
    }

    #[tokio::test]
    async fn test_bad_hex_input_is_not_sent() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(key(KeyCode::Char('c')));
        assert!(pump_until(&mut app, |a| a.connection == ConnectionState::Connected).await);

        app.handle_event(key(KeyCode::Tab));
        assert_eq!(app.input_mode, InputMode::Bytes);
        type_text(&mut app, "0g");
        app.handle_event(key(KeyCode::Enter));
        assert!(app.status_message.as_deref().unwrap_or("").contains("invalid hex"));
        assert_eq!(app.input, "0g");
        assert!(app.history.is_empty());
    }

    #[tokio::test]
    async fn test_write_refused_while_disconnected() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(key(KeyCode::Char('i')));
        type_text(&mut app, "hello");
        app.handle_event(key(KeyCode::Enter));
        assert_eq!(app.status_message.as_deref(), Some("Not connected"));
        assert_eq!(opener.open_count(), 0);
    }

    #[tokio::test]
    async fn test_insert_handles_multibyte_cursor() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(key(KeyCode::Char('i')));
        type_text(&mut app, "é1");
        app.handle_event(key(KeyCode::Left));
        app.handle_event(key(KeyCode::Backspace));
        assert_eq!(app.input, "1");
        assert_eq!(app.cursor_pos, 0);
    }

    #[tokio::test]
    async fn test_device_events_update_port_list() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        app.handle_event(Event::Device(DeviceEvent::Added(DeviceHandle::unknown(
            "/dev/ttyS0",
        ))));
        assert_eq!(app.devices.len(), 2);
        app.selected_port = 1;
        app.handle_event(Event::Device(DeviceEvent::Removed(DeviceHandle::unknown(
            "/dev/ttyS0",
        ))));
        assert_eq!(app.devices.len(), 1);
        assert_eq!(app.selected_port, 0);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let opener = MockPortOpener::new();
        let mut app = test_app(&opener);
        let mut event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        event.kind = KeyEventKind::Press;
        app.handle_event(Event::Key(event));
        assert_eq!(app.state, AppState::Quitting);
        assert_eq!(opener.open_count(), 0);
    }
}
