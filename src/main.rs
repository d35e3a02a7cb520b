//! dockterm - an interactive terminal client for Docker containers
//!
//! dockterm attaches a terminal session to a named container and runs each
//! submitted command inside it through `docker exec`, rendering streamed
//! output with content-based coloring.
//!
//! # Features
//!
//! - **Command History**: bounded recall ring navigated with Up/Down
//! - **Tab Completion**: prefix completion for common shell commands
//! - **Colored Output**: error/warning/success highlighting, SGR stripping
//! - **Status Bar**: Docker daemon and container state at a glance
//!
//! # Quick Start
//!
//! ```text
//! dockterm web-1              # attach to container "web-1"
//! dockterm -u deploy web-1    # prompt as deploy@web-1
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Submit the current command |
//! | Up/Down | Recall history |
//! | Tab | Complete against builtin commands |
//! | Ctrl+L | Clear the pane |
//! | Ctrl+V | Paste from clipboard |
//! | Ctrl+Q / Ctrl+C | Quit |

mod channel;
mod complete;
mod config;
mod core;
mod history;
mod ui;

use std::env;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::channel::exec::{ExecOptions, ExecService};
use crate::channel::Connection;
use crate::config::{ColorScheme, Config};
use crate::core::client::{SessionClient, SessionOptions};
use crate::ui::Renderer;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line arguments
#[derive(Default)]
struct CliArgs {
    /// Container to attach to
    target: Option<String>,
    user: Option<String>,
    shell: Option<String>,
    timeout: Option<u64>,
    theme: Option<String>,
    no_status: bool,
}

fn print_version() {
    eprintln!("dockterm {}", VERSION);
}

fn print_help() {
    eprintln!("dockterm {} - an interactive terminal client for Docker containers", VERSION);
    eprintln!();
    eprintln!("Usage: dockterm [OPTIONS] <CONTAINER>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -u, --user <USER>      Display user for the prompt (default: root)");
    eprintln!("  -s, --shell <SHELL>    Shell used inside the container (default: bash)");
    eprintln!("  -t, --timeout <SECS>   Per-command timeout (default: 30)");
    eprintln!("      --theme <NAME>     Color scheme");
    eprintln!("      --no-status        Hide the status bar");
    eprintln!("  -v, --version          Show version");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Enter                  Submit the current command");
    eprintln!("  Up/Down                Recall command history");
    eprintln!("  Tab                    Complete against builtin commands");
    eprintln!("  Ctrl+L                 Clear the pane");
    eprintln!("  Ctrl+V                 Paste from clipboard");
    eprintln!("  Ctrl+Q, Ctrl+C         Quit");
    eprintln!();
    eprintln!("Configuration: ~/.dockterm/config.toml");
    eprintln!("Log file:      ~/.dockterm/dockterm.log");
    eprintln!();
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = CliArgs::default();
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
            "-u" | "--user" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing user argument".to_string());
                }
                cli.user = Some(args[i].clone());
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                cli.shell = Some(args[i].clone());
            }
            "-t" | "--timeout" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing timeout argument".to_string());
                }
                cli.timeout = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid timeout: {}", args[i]))?,
                );
            }
            "--theme" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing theme argument".to_string());
                }
                cli.theme = Some(args[i].clone());
            }
            "--no-status" => {
                cli.no_status = true;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => {
                if cli.target.is_some() {
                    return Err(format!("Unexpected extra argument: {}", arg));
                }
                cli.target = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(cli)
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let Some(target) = cli.target.clone() else {
        eprintln!("Error: missing container name");
        eprintln!("Use --help for usage information");
        std::process::exit(1);
    };

    // Initialize logging to file
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from);
    let log_path = home
        .map(|h| h.join(".dockterm").join("dockterm.log"))
        .unwrap_or_else(|| PathBuf::from("dockterm.log"));
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();
    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    info!("dockterm {} starting", VERSION);

    // Merge: command line arguments override the config file
    let mut config = Config::load();
    if let Some(user) = cli.user {
        config.user = user;
    }
    if let Some(shell) = cli.shell {
        config.shell = shell;
    }
    if let Some(timeout) = cli.timeout {
        config.command_timeout = timeout;
    }
    if let Some(theme) = cli.theme {
        config.color_scheme = theme;
    }
    if cli.no_status {
        config.status_bar.visible = false;
    }

    info!("Target container: {}", target);
    info!("Shell: {} (timeout {}s)", config.shell, config.command_timeout);
    info!("Color scheme: {}", config.color_scheme);

    run_terminal(target, config)
}

fn run_terminal(target: String, config: Config) -> anyhow::Result<()> {
    let scheme = config.get_color_scheme();

    let (conn, endpoint) = Connection::pair();
    let conn = Rc::new(conn);
    let service = ExecService::spawn(
        endpoint,
        ExecOptions {
            shell: config.shell.clone(),
            timeout: Duration::from_secs(config.command_timeout),
        },
    );

    let mut client = SessionClient::new(
        Rc::clone(&conn),
        target,
        SessionOptions {
            user: config.user.clone(),
            path: config.start_path.clone(),
        },
    );

    let mut renderer = Renderer::new();
    renderer.init()?;
    let result = run_event_loop(
        &conn,
        &mut client,
        &mut renderer,
        &scheme,
        config.status_bar.visible,
    );
    renderer.cleanup()?;

    // Dropping the client and the connection detaches the service loop.
    drop(client);
    drop(conn);
    if service.join().is_err() {
        warn!("service thread panicked");
    }

    info!("dockterm exiting");
    result
}

fn run_event_loop(
    conn: &Connection,
    client: &mut SessionClient,
    renderer: &mut Renderer,
    scheme: &ColorScheme,
    status_visible: bool,
) -> anyhow::Result<()> {
    client.start()?;
    renderer.draw(&client.state(), scheme, status_visible)?;

    loop {
        let mut dirty = conn.dispatch_pending() > 0;

        if event::poll(Duration::from_millis(30))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Release
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
                    {
                        info!("exit requested");
                        break;
                    }
                    dirty |= client.handle_key(&key);
                }
                Event::Paste(text) => {
                    client.insert_text(&text);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        if dirty {
            renderer.draw(&client.state(), scheme, status_visible)?;
        }
    }
    Ok(())
}
