//! Terminal user interface for the serial console.
//!
//! A ratatui front end over [`SessionController`](crate::session::SessionController):
//! a port list with hot-plug updates, a settings panel that is only shown
//! while disconnected, separate text and hex views that each keep their own
//! scroll position, and an input line that sends either encoded text or raw
//! hex bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_console::config::Config;
//! use serial_console::tui::App;
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> serial_console::AppResult<()> {
//!     App::new(Config::default())?.run().await
//! }
//! ```

mod app;
mod event;
mod history;
mod pane;
mod settings;
mod theme;
mod ui;

pub use app::{App, AppState, FocusArea, InputMode, Mode};
pub use event::{Event, EventHandler};
pub use history::InputHistory;
pub use pane::{OutputPane, PaneItem};
pub use settings::SettingsField;
pub use theme::{Theme, THEMES};
pub use ui::render;
