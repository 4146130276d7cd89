mod app;
mod console;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const USAGE: &str = "\
usage: cdp-debug [--config FILE] [--attach WS_URL] [PROGRAM [ARGS...]]

Launches PROGRAM under the configured runtime (or attaches to WS_URL) and
reads debugger commands from stdin. Type `help` for the command list.";

/// Command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CliArgs {
    /// Explicit config file instead of the global + project lookup.
    pub(crate) config: Option<PathBuf>,
    /// Connect to an existing debugger socket instead of launching.
    pub(crate) attach: Option<String>,
    /// Overrides `launcher.program`.
    pub(crate) program: Option<String>,
    /// Overrides `launcher.args` when a program is given.
    pub(crate) args: Vec<String>,
    pub(crate) help: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => cli.help = true,
            "-c" | "--config" => {
                let path = args.next().context("--config needs a file")?;
                cli.config = Some(PathBuf::from(path));
            }
            "-a" | "--attach" => {
                cli.attach = Some(args.next().context("--attach needs a WebSocket URL")?);
            }
            flag if flag.starts_with('-') && cli.program.is_none() => {
                bail!("unknown option: {}", flag)
            }
            _ => {
                cli.program = Some(arg);
                cli.args = args.by_ref().collect();
            }
        }
    }
    Ok(cli)
}

#[tokio::main]
async fn main() {
    let cli = match parse_args(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("cdp-debug: {:#}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if cli.help {
        println!("{}", USAGE);
        return;
    }

    if let Err(e) = console::run_console(cli).await {
        eprintln!("cdp-debug: {:#}", e);
        std::process::exit(1);
    }
}
