// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobctl: control utility for the jobd service supervisor.
//!
//! A thin RPC client: every verb is one request over the daemon's Unix
//! socket. Exit code 0 on success, 1 on any error (message on stderr).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod command;

use clap::Parser;
use client::DaemonClient;
use command::Invocation;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

#[derive(Parser)]
#[command(
    name = "jobctl",
    version = VERSION,
    about = "Control utility for the jobd service supervisor",
    disable_version_flag = true,
    override_usage = "jobctl <label> <enable|disable|clear|status>\n       \
                      jobctl load <manifest-path>\n       \
                      jobctl unload <label>\n       \
                      jobctl list"
)]
struct Cli {
    /// A job label, or one of: load, unload, list
    first: String,

    /// The verb for a label, or the argument of load/unload
    second: Option<String>,

    /// Print the version number
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() {
    // clap exits 2 on usage errors; the contract here is 0 or 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            print!("{e}");
            return;
        }
        Err(e) => {
            eprint!("{e}");
            std::process::exit(1);
        }
    };
    let invocation = match command::resolve(&cli.first, cli.second.as_deref()) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("jobctl: {message}");
            std::process::exit(1);
        }
    };

    if let Err(e) = execute(invocation).await {
        eprintln!("jobctl: {e}");
        std::process::exit(1);
    }
}

async fn execute(invocation: Invocation) -> anyhow::Result<()> {
    let client = DaemonClient::new()?;
    let result = client.call(invocation.method, invocation.params).await?;

    match invocation.method {
        "status" => command::print_status(&result),
        "list" => command::print_list(&result),
        // Mutations are silent on success.
        _ => {}
    }
    Ok(())
}
