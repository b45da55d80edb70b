//! Event handling for the TUI.
//!
//! Terminal input, session output, device hot-plug and background task
//! results all arrive on one std channel so the draw loop has a single
//! place to wait.

use crate::device::DeviceEvent;
use crate::session::SessionEvent;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, MouseEvent};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc as async_mpsc;

/// Terminal events.
#[derive(Debug, Clone)]
pub enum Event {
    /// Terminal tick for UI refresh
    Tick,
    /// Keyboard input
    Key(KeyEvent),
    /// Mouse input
    Mouse(MouseEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// Output or state change from the session engine
    Session(SessionEvent),
    /// A port appeared or disappeared
    Device(DeviceEvent),
    /// A background action failed
    Error(String),
}

/// Event handler that polls for terminal events.
pub struct EventHandler {
    /// Event sender
    sender: mpsc::Sender<Event>,
    /// Event receiver
    receiver: mpsc::Receiver<Event>,
    /// Terminal input thread, once started
    input: Option<thread::JoinHandle<()>>,
}

impl EventHandler {
    /// Create a handler with no terminal input attached yet.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            input: None,
        }
    }

    /// Start reading terminal events and emitting ticks at `tick_rate`.
    pub fn spawn_terminal_input(&mut self, tick_rate: Duration) {
        if self.input.is_some() {
            return;
        }
        let handler_sender = self.sender.clone();

        let handler = thread::spawn(move || {
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);

                if event::poll(timeout).unwrap_or(false) {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) => handler_sender.send(Event::Key(key)),
                        Ok(CrosstermEvent::Mouse(mouse)) => {
                            handler_sender.send(Event::Mouse(mouse))
                        }
                        Ok(CrosstermEvent::Resize(width, height)) => {
                            handler_sender.send(Event::Resize(width, height))
                        }
                        Ok(_) => Ok(()),
                        Err(e) => handler_sender.send(Event::Error(e.to_string())),
                    };
                    if forwarded.is_err() {
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if handler_sender.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        self.input = Some(handler);
    }

    /// Forward items from an async channel into this handler.
    pub fn bridge<T, F>(&self, mut source: async_mpsc::UnboundedReceiver<T>, wrap: F)
    where
        T: Send + 'static,
        F: Fn(T) -> Event + Send + 'static,
    {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            while let Some(item) = source.recv().await {
                if sender.send(wrap(item)).is_err() {
                    break;
                }
            }
        });
    }

    /// Get the next event, blocking until one is available.
    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to get the next event without blocking.
    pub fn try_next(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Get a sender for pushing custom events.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.sender.clone()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
