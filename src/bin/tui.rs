//! Interactive terminal front end.
//!
//! ```bash
//! cargo run --bin serial-tui --features tui
//! ```

use serial_console::config::ConfigLoader;
use serial_console::logging::{self, LogTarget};
use serial_console::tui::App;
use std::process::ExitCode;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let config = match ConfigLoader::load() {
        Ok(loader) => loader.into_config(),
        Err(e) => {
            eprintln!("Warning: Failed to load config, using defaults: {}", e);
            ConfigLoader::with_defaults().into_config()
        }
    };

    // Only log to a file: stderr would draw over the screen.
    if let Err(e) = logging::init(&config.logging, LogTarget::FileOnly) {
        eprintln!("Warning: Failed to open log file: {}", e);
    }

    let result = match App::new(config) {
        Ok(mut app) => app.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
