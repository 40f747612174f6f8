//! Revisit Daemon (revisitd)
//!
//! Long-running fingerprint check service. Owns the known-identity store and
//! answers newline-delimited JSON requests on a Unix domain socket.
//!
//! # Security Model
//! - **Socket**: group read/write only (0660), symlink attack prevention
//! - **Validation**: every request is validated before it reaches the engine
//! - **Limits**: connection limits, message size limits, read/write timeouts
//! - **Isolation**: restrictive umask for the store and capture files
//! - **Signals**: graceful shutdown with socket cleanup

mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rv_core::{load_settings, CheckOptions, CsvStore, Settings};
use tracing::{debug, error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Security Hardening
// ============================================================================

/// Set restrictive umask
fn set_secure_umask() {
    // 0077 = owner has all permissions, group/other have none.
    // The socket gets its own mode after bind.
    // SAFETY: umask is always safe to call - it simply sets the file creation mask for the process.
    unsafe { libc::umask(0o077) };
    debug!("Umask set to 0077");
}

/// Validate socket path for security
fn validate_socket_path(path: &str) -> Result<(), String> {
    let p = Path::new(path);

    if !p.is_absolute() {
        return Err("Socket path must be absolute".into());
    }

    if path.contains("..") {
        return Err("Socket path contains path traversal".into());
    }

    if path.contains('\0') {
        return Err("Socket path contains null byte".into());
    }

    let safe_dirs = ["/run/", "/var/run/", "/tmp/"];
    if !safe_dirs.iter().any(|d| path.starts_with(d)) {
        return Err(format!("Socket path must be under {:?}", safe_dirs));
    }

    // Refuse symlinks at the socket location
    if p.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
        return Err("Socket path is a symlink - refusing for security".into());
    }

    Ok(())
}

/// Create the socket's parent directory when missing
fn ensure_socket_dir(path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            debug!("Created socket directory {:?}", parent);
        }
    }
    Ok(())
}

// ============================================================================
// Cleanup
// ============================================================================

fn cleanup(socket_path: &str) {
    debug!("Starting cleanup...");

    if Path::new(socket_path).exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!("Failed to remove socket: {}", e);
        }
    }

    info!("Cleanup complete");
}

// ============================================================================
// CLI
// ============================================================================

fn print_help() {
    eprintln!("revisitd {} - Revisit fingerprint check daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    revisitd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -s, --socket PATH        Socket path (default from settings)");
    eprintln!("    -S, --store PATH         Known-identity store CSV");
    eprintln!("    -c, --capture-dir PATH   Directory for named captures");
    eprintln!("    -v, --version            Print version");
    eprintln!("    -h, --help               Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    REVISIT_LOG              Log filter (trace, debug, info, warn, error)");
    eprintln!("    REVISIT_STORE            Store path override");
    eprintln!("    REVISIT_CAPTURE_DIR      Capture directory override");
    eprintln!("    REVISIT_SOCKET           Socket path override");
}

fn print_version() {
    println!("revisitd {}", VERSION);
}

/// Command-line overrides on top of settings
#[derive(Debug, Default)]
struct Overrides {
    socket: Option<String>,
    store: Option<PathBuf>,
    capture_dir: Option<PathBuf>,
}

enum Parsed {
    Run(Overrides),
    Exit,
}

fn parse_args(args: &[String]) -> Result<Parsed, String> {
    let mut overrides = Overrides::default();
    let mut i = 1;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => {
                print_help();
                return Ok(Parsed::Exit);
            }
            "-v" | "--version" => {
                print_version();
                return Ok(Parsed::Exit);
            }
            "-s" | "--socket" | "-S" | "--store" | "-c" | "--capture-dir" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| format!("{} requires a path argument", flag))?
                    .clone();
                match flag {
                    "-s" | "--socket" => overrides.socket = Some(value),
                    "-S" | "--store" => overrides.store = Some(PathBuf::from(value)),
                    _ => overrides.capture_dir = Some(PathBuf::from(value)),
                }
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }

    Ok(Parsed::Run(overrides))
}

fn resolve_settings(overrides: Overrides) -> anyhow::Result<Settings> {
    let mut settings = load_settings().context("Failed to load settings")?;
    if let Some(socket) = overrides.socket {
        settings.socket_path = PathBuf::from(socket);
    }
    if let Some(store) = overrides.store {
        settings.store_path = store;
    }
    if let Some(dir) = overrides.capture_dir {
        settings.capture_dir = dir;
    }
    Ok(settings)
}

// ============================================================================
// Logging
// ============================================================================

/// Journald when available, stdout otherwise. Returns true for journald.
fn init_logging(filter: &str) -> bool {
    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(filter))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
    false
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        // stderr is captured by journald when running as a service
        eprintln!("PANIC at {}: {}", location, message);
    }));

    set_secure_umask();

    let args: Vec<String> = std::env::args().collect();
    let overrides = match parse_args(&args) {
        Ok(Parsed::Run(overrides)) => overrides,
        Ok(Parsed::Exit) => return Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let settings = match resolve_settings(overrides) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let use_journald = init_logging(&settings.log_level);

    info!("STARTUP: revisitd {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });

    let socket_path = settings.socket_path.display().to_string();

    if let Err(e) = validate_socket_path(&socket_path) {
        error!("Invalid socket path: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = ensure_socket_dir(&socket_path) {
        error!("Could not create socket directory: {}", e);
        std::process::exit(1);
    }

    let socket_path_clone = socket_path.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        cleanup(&socket_path_clone);
        info!("SHUTDOWN: Daemon terminated gracefully");
        std::process::exit(0);
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    info!("STARTUP: Socket path: {}", socket_path);
    info!("STARTUP: Store: {}", settings.store_path.display());
    info!("STARTUP: Captures: {}", settings.capture_dir.display());
    info!("STARTUP: PID: {}", std::process::id());

    let store = CsvStore::new(&settings.store_path);
    let state = Arc::new(server::ServerState::new(
        Box::new(store),
        CheckOptions::from_settings(&settings),
    ));

    let result = server::run_server(&socket_path, state).await;

    cleanup(&socket_path);

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
