//! tirc - a tiling terminal IRC client
//!
//! tirc renders multiple conversation buffers into a recursively split
//! terminal screen. The compositor draws one complete frame per tick
//! and emits only the escape sequences needed to update the terminal.
//!
//! # Quick Start
//!
//! ```text
//! tirc                   # Connect to the networks in ~/.tirc/config.toml
//! tirc -c other.toml     # Use an alternative config file
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Ctrl+Q / Ctrl+V | Split window horizontally / vertically |
//! | Ctrl+X | Close window |
//! | Ctrl+R | Resize mode (Shift+arrows grow) |
//! | Shift+arrows | Move between windows |
//! | Alt+Left/Right | Previous / next buffer |
//! | Ctrl+N | Jump to buffer with activity |
//! | Ctrl+S | Jump to server buffer |
//! | Ctrl+W | Leave buffer |
//! | Ctrl+B | Toggle buffer list |
//! | Ctrl+F | Search mode |
//! | PageUp / PageDown | Scroll history |
//! | Ctrl+C | Quit |

mod client;
mod config;
mod ui;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::client::input::handle_key;
use crate::client::Client;
use crate::config::Config;
use crate::ui::{Ui, WindowTree};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("tirc {}", VERSION);
}

fn print_help() {
    eprintln!("tirc {} - a tiling terminal IRC client", VERSION);
    eprintln!();
    eprintln!("Usage: tirc [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <FILE>   Use an alternative config file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keybindings:");
    eprintln!("  Ctrl+Q                Split window horizontally");
    eprintln!("  Ctrl+V                Split window vertically");
    eprintln!("  Ctrl+X                Close window");
    eprintln!("  Ctrl+R                Resize mode (Shift+arrows grow the window)");
    eprintln!("  Shift+arrows          Move between windows");
    eprintln!("  Alt+Left/Right        Previous / next buffer");
    eprintln!("  Ctrl+N                Jump to buffer with activity");
    eprintln!("  Ctrl+S                Jump to the server buffer");
    eprintln!("  Ctrl+W                Leave current buffer");
    eprintln!("  Ctrl+B                Toggle the buffer list");
    eprintln!("  Ctrl+F                Filter history by the input line");
    eprintln!("  PageUp/PageDown       Scroll history");
    eprintln!("  Ctrl+C                Quit");
    eprintln!();
    eprintln!("Configuration: ~/.tirc/config.toml");
}

fn parse_args() -> Result<Option<PathBuf>, String> {
    let args: Vec<String> = env::args().collect();
    let mut config_path = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config file argument".to_string());
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(config_path)
}

fn init_logging() {
    let log_path = config::home_dir()
        .map(|h| h.join(".tirc").join("tirc.log"))
        .unwrap_or_else(|| PathBuf::from("tirc.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let config_path = match parse_args() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("tirc starting...");

    let config = match config_path {
        Some(path) => match Config::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::load(),
    };

    if config.networks.is_empty() {
        eprintln!("No networks configured.");
        eprintln!(
            "Add at least one [[networks]] entry to {}",
            Config::get_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "~/.tirc/config.toml".to_string())
        );
        std::process::exit(1);
    }

    let mut client = Client::new(&config);
    client.connect_all();
    client.join_channels();

    terminal::enable_raw_mode()?;
    print!("\x1b[?1049h");
    let _ = std::io::stdout().flush();

    let result = run(&mut client);

    print!("\x1b[?1049l");
    print!("\x1b[0m");
    let _ = std::io::stdout().flush();
    let _ = terminal::disable_raw_mode();

    info!("tirc exiting");
    result
}

/// The single-threaded event loop: drain input and sockets, then
/// compose exactly one frame.
fn run(client: &mut Client) -> anyhow::Result<()> {
    let (cols, rows) = terminal::size()?;

    let mut ui = Ui::new(rows, cols);
    let mut tree = WindowTree::new(rows, cols, client.first_buffer());
    let mut focus = tree.root();
    let mut dirty = true;

    loop {
        let mut pending = event::poll(Duration::from_millis(20))?;
        while pending {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press
                        && handle_key(client, &mut tree, &mut focus, &mut ui, key)
                    {
                        return Ok(());
                    }
                    dirty = true;
                }
                Event::Resize(cols, rows) => {
                    ui.resize(rows, cols);
                    tree.resize(rows, cols);
                    dirty = true;
                }
                _ => {}
            }
            pending = event::poll(Duration::from_millis(0))?;
        }

        let focused_buffer = tree.leaf(focus).buffer;
        let outcome = client.poll(focused_buffer);
        if outcome.dirty {
            dirty = true;
        }
        if let Some(id) = outcome.switch_to {
            tree.leaf_mut(focus).buffer = id;
        }
        if outcome.bell {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(b"\x07");
            let _ = stdout.flush();
        }

        if dirty {
            ui.draw(client, &tree, focus)?;
            client.clear_activity(tree.leaf(focus).buffer);
            dirty = false;
        }
    }
}
