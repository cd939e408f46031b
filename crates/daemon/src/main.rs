// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobd: user-space service supervisor daemon.
//!
//! Architecture:
//! - Listener task: socket I/O, forwards requests into the multiplexer
//! - Engine loop: main task, pulls one event at a time and dispatches it
//!   through the job manager

use jobd_daemon::engine::LoopAction;
use jobd_daemon::env::VERSION;
use jobd_daemon::lifecycle::{self, Config, LifecycleError};
use jobd_daemon::listener::Listener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Handle info flags before any config/lock acquisition.
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("jobd {VERSION}");
                return;
            }
            "--help" | "-h" | "help" => {
                println!("jobd {VERSION}");
                println!("User-space service supervisor daemon");
                println!();
                println!("USAGE:");
                println!("    jobd");
                println!();
                println!("The daemon loads job manifests from the manifest directory and");
                println!("listens on a Unix socket for commands from `jobctl`.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: jobd [--help | --version]");
                std::process::exit(2);
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jobd: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config.log_path);
    let log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("jobd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    info!(version = VERSION, "starting jobd");

    let result = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.pidfile_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("jobd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {}", e);
            eprintln!("jobd: {e}");
            std::process::exit(1);
        }
    };

    let lifecycle::StartupResult { mut daemon, listener, mut mux } = result;

    // Spawn the listener task; requests flow into the multiplexer.
    tokio::spawn(Listener::new(listener, mux.sender()).run());

    info!(socket = %daemon.config.socket_path.display(), "daemon ready");

    // Signal readiness to whoever started us (CLI, test harness, init).
    println!("READY");

    // Engine loop: exactly one event per iteration; nothing else blocks.
    let exit_code = loop {
        let event = mux.next().await;
        match daemon.manager.handle_event(event, &mut mux) {
            LoopAction::Continue => {}
            LoopAction::Exit(code) => break code,
        }
    };

    daemon.shutdown();
    info!(exit_code, "daemon stopped");
    // Flush the non-blocking appender before exiting; process::exit skips
    // destructors.
    drop(log_guard);
    std::process::exit(exit_code);
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log at startup if it has grown too large.
///
/// Shifts `jobd.log` → `jobd.log.1` → `jobd.log.2` → `jobd.log.3`,
/// deleting the oldest. Best-effort: the daemon starts even if rotation
/// fails.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Append a startup marker to the log before tracing takes over, so the
/// current attempt is findable even if the process dies during init.
fn write_startup_marker(log_path: &std::path::Path) {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "--- jobd: starting (pid: {}) ---", std::process::id());
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config
        .log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent directory"))?;
    std::fs::create_dir_all(dir)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
