use clap::{Args, Parser, Subcommand};
use regex::Regex;
use serial_console::allowlist::{AddResult, BluetoothAllowList};
use serial_console::config::{Config, ConfigLoader};
use serial_console::device::{DeviceDiscovery, DeviceFilter, DeviceHandle, SystemDiscovery};
use serial_console::input::{parse_hex_bytes, LineEnding};
use serial_console::logging::{self, LogTarget};
use serial_console::port::{DataBits, FlowControl, Parity, StopBits, TokioSerialOpener};
use serial_console::prompt::{Outcome, Prompter};
use serial_console::render::Direction;
use serial_console::session::{SessionController, SessionEvent};
use serial_console::state::ConnectionState;
use serial_console::store::FileSettingsStore;
use serial_console::{AppError, AppResult, TextEncoding};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-console",
    version,
    about = "Interactive serial console with text and hex views of the device output.",
    long_about = "Talks to one serial device at a time. Incoming bytes are rendered as severity-tagged text lines or as a hex dump; lines typed on stdin are sent to the device."
)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports the system reports.
    Ports {
        /// Print one JSON object per port.
        #[arg(long)]
        json: bool,
    },
    /// Open a port and relay stdin to it until Ctrl+C or device loss.
    Connect(ConnectArgs),
    /// Manage the Bluetooth service-class allow-list.
    Allowlist {
        #[command(subcommand)]
        action: AllowlistAction,
    },
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Port name or configured alias, e.g. /dev/ttyUSB0, COM3.
    port: String,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits (7 or 8).
    #[arg(long)]
    data_bits: Option<u8>,

    /// Stop bits (1 or 2).
    #[arg(long)]
    stop_bits: Option<u8>,

    #[arg(long, value_enum)]
    parity: Option<Parity>,

    #[arg(long, value_enum)]
    flow_control: Option<FlowControl>,

    /// Text encoding, e.g. utf-8, windows-1252, utf-16le.
    #[arg(short, long)]
    encoding: Option<TextEncoding>,

    /// Line ending appended to each stdin line.
    #[arg(long, value_enum)]
    eol: Option<LineEnding>,

    /// Print the hex view instead of text lines.
    #[arg(long)]
    hex: bool,

    /// Show control characters as visible symbols.
    #[arg(long)]
    show_non_printable: bool,

    /// Print every session event as a JSON line.
    #[arg(long, conflicts_with = "hex")]
    json: bool,

    /// Treat stdin lines as hex bytes (e.g. "0d 0a") instead of text.
    #[arg(long)]
    hex_input: bool,
}

#[derive(Subcommand, Debug)]
enum AllowlistAction {
    /// Show the stored UUIDs.
    List,
    /// Add a UUID; prompts when none is given.
    Add { uuid: Option<String> },
    /// Remove a UUID.
    Remove { uuid: String },
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = match cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    }
    .into_config();
    logging::init(&config.logging, LogTarget::Stderr)?;

    match cli.command {
        Command::Ports { json } => list_ports(json),
        Command::Connect(args) => connect(&config, args).await,
        Command::Allowlist { action } => allowlist(action),
    }
}

fn list_ports(json: bool) -> AppResult<()> {
    let devices = SystemDiscovery.list_known_devices();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        for device in &devices {
            writeln!(out, "{}", serde_json::to_string(device)?)?;
        }
    } else if devices.is_empty() {
        writeln!(out, "No serial ports found.")?;
    } else {
        for device in &devices {
            writeln!(out, "{:<24} {}", device.path(), device.descriptor())?;
        }
    }
    Ok(())
}

async fn connect(config: &Config, args: ConnectArgs) -> AppResult<()> {
    let path = config.serial.resolve_port(&args.port);
    let device = match SystemDiscovery.request_new_device(&DeviceFilter::by_path(&path)) {
        Outcome::Value(device) => device,
        // Not every openable path is enumerated (ptys, some adapters).
        Outcome::Cancelled => {
            debug!(port = %path, "port not enumerated, opening by path");
            DeviceHandle::unknown(&path)
        }
    };

    let mut settings = config.session_settings()?;
    if let Some(baud) = args.baud {
        settings.port.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        settings.port.data_bits = DataBits::try_from(bits)?;
    }
    if let Some(bits) = args.stop_bits {
        settings.port.stop_bits = StopBits::try_from(bits)?;
    }
    if let Some(parity) = args.parity {
        settings.port.parity = parity;
    }
    if let Some(flow) = args.flow_control {
        settings.port.flow_control = flow;
    }
    if let Some(encoding) = args.encoding {
        settings.encoding = encoding;
    }
    let eol = args.eol.unwrap_or(config.tui.line_ending);
    let show_non_printable = args.show_non_printable || config.render.show_non_printable;

    let (session, events) = SessionController::new(
        Arc::new(TokioSerialOpener::new()),
        settings,
        config.session_options()?,
    );
    let output = if args.json {
        Output::Json
    } else if args.hex {
        Output::Hex(config.render.hex_row_width)
    } else {
        Output::Text { show_non_printable }
    };
    let printer = tokio::spawn(print_events(events, output));

    session.connect(device.clone()).await?;
    eprintln!(
        "Connected to {} ({}, {}). Press Ctrl+C to quit.",
        device,
        settings.port,
        settings.encoding
    );

    let device_lost = relay_stdin(&session, eol, settings.encoding, args.hex_input).await?;

    session.disconnect().await;
    drop(session);
    if tokio::time::timeout(Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        warn!("output task did not finish after disconnect");
    }

    if device_lost {
        eprintln!("Device disconnected.");
    }
    Ok(())
}

/// Forward stdin to the device. Returns `true` when the session ended on its
/// own rather than by Ctrl+C.
async fn relay_stdin(
    session: &SessionController,
    eol: LineEnding,
    encoding: TextEncoding,
    hex_input: bool,
) -> AppResult<bool> {
    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut state = session.subscribe_state();
    if !session.is_connected() {
        return Ok(true);
    }
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupt received, disconnecting");
                return Ok(false);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(true);
                }
                let current = *state.borrow_and_update();
                if current == ConnectionState::Disconnected {
                    return Ok(true);
                }
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) => {
                    let payload = if hex_input {
                        match parse_hex_bytes(&line) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                eprintln!("{e}");
                                continue;
                            }
                        }
                    } else {
                        eol.encode_text(&line, encoding)
                    };
                    if let Err(e) = session.write(&payload).await {
                        warn!(error = %e, "write failed");
                        if !session.is_connected() {
                            return Ok(true);
                        }
                    }
                }
                None => {
                    debug!("stdin closed, waiting for Ctrl+C or device loss");
                    stdin_open = false;
                }
            },
        }
    }
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

#[derive(Debug, Clone, Copy)]
enum Output {
    Text { show_non_printable: bool },
    Hex(usize),
    Json,
}

async fn print_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    output: Output,
) {
    let stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        let mut out = stdout.lock();
        let result = match (&event, output) {
            (_, Output::Json) => match serde_json::to_string(&event) {
                Ok(line) => writeln!(out, "{line}"),
                Err(e) => {
                    warn!(error = %e, "failed to serialize event");
                    Ok(())
                }
            },
            (SessionEvent::Text(line), Output::Text { show_non_printable }) if line.finalized => {
                let marker = match line.direction {
                    Direction::Incoming => "",
                    Direction::Outgoing => "> ",
                };
                writeln!(out, "{marker}{}", line.display(show_non_printable))
            }
            (SessionEvent::Binary(row), Output::Hex(width)) if row.finalized => {
                let marker = match row.direction {
                    Direction::Incoming => ' ',
                    Direction::Outgoing => '>',
                };
                writeln!(out, "{marker} {:<pad$}  {}", row.hex(), row.ascii(), pad = width * 3)
            }
            (SessionEvent::Notice(message), _) => {
                eprintln!("{message}");
                Ok(())
            }
            _ => Ok(()),
        };
        if result.and_then(|_| out.flush()).is_err() {
            // stdout is gone (closed pipe); nothing left to show output on.
            break;
        }
    }
}

fn allowlist(action: AllowlistAction) -> AppResult<()> {
    let store = Arc::new(FileSettingsStore::open_default()?);
    let mut list = BluetoothAllowList::load(store);

    match action {
        AllowlistAction::List => {
            if list.uuids().is_empty() {
                println!("The allow-list is empty.");
            }
            for uuid in list.uuids() {
                println!("{uuid}");
            }
        }
        AllowlistAction::Add { uuid } => {
            let result = match uuid {
                Some(uuid) => list.add(&uuid)?,
                None => match list.add_interactive(&StdinPrompter)? {
                    Outcome::Value(result) => result,
                    Outcome::Cancelled => {
                        println!("Cancelled.");
                        return Ok(());
                    }
                },
            };
            match result {
                AddResult::Added(uuid) => println!("Added {uuid}"),
                AddResult::Duplicate(uuid) => println!("{uuid} is already allowed"),
                AddResult::Invalid => {
                    return Err(AppError::InvalidInput(
                        "expected a UUID or a short hex id such as 0x1101".to_string(),
                    ))
                }
            }
        }
        AllowlistAction::Remove { uuid } => {
            if list.remove(&uuid)? {
                println!("Removed {uuid}");
            } else {
                println!("{uuid} was not in the allow-list");
            }
        }
    }
    Ok(())
}

/// Line prompt on the controlling terminal. An empty line or EOF cancels.
struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt_user(&self, title: &str, validation_pattern: &str) -> Outcome<String> {
        let pattern = match Regex::new(validation_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(error = %e, "invalid prompt validation pattern");
                return Outcome::Cancelled;
            }
        };
        let stdin = std::io::stdin();
        loop {
            eprint!("{title} (empty to cancel): ");
            let _ = std::io::stderr().flush();

            let mut answer = String::new();
            match stdin.lock().read_line(&mut answer) {
                Ok(0) | Err(_) => return Outcome::Cancelled,
                Ok(_) => {}
            }
            let answer = answer.trim();
            if answer.is_empty() {
                return Outcome::Cancelled;
            }
            if pattern.is_match(answer) {
                return Outcome::Value(answer.to_string());
            }
            eprintln!("'{answer}' does not look right, try again.");
        }
    }
}
