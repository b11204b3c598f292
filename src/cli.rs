//! Command line front end: argument handling, diagnostics and exit codes.

use clap::Parser;
use colored::Colorize;
use nix::unistd::Uid;
use std::ffi::OsString;
use tracing_subscriber::EnvFilter;

use crate::args::{normalize_args, usage, Args, Invocation};
use crate::error::{ClickError, DeviceStage};

/// Exit status for a usage or help request.
pub const EXIT_USAGE: u8 = 1;
/// Exit status for anything clap itself rejects.
pub const EXIT_PARSE: u8 = 2;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mclick={level}")));

    // a second call in the same process keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn report(err: &ClickError) {
    eprintln!("{}", format!("[ERROR] {err}").red());

    match err {
        ClickError::Device(device) if device.stage == DeviceStage::Open => {
            if device.is_permission_denied() || !Uid::effective().is_root() {
                eprintln!("{}", "[HELP] Try running with sudo".green());
            }
        }
        ClickError::Argument(_) => {
            eprintln!("{}", "[HELP] Run with --help for usage".green());
        }
        _ => {}
    }
}

fn fail(err: ClickError) -> u8 {
    report(&err);
    err.exit_code()
}

/// Runs the whole program for `args` (including the program name) and
/// returns the process exit status.
pub fn run_from_args<I, T>(args: I) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = match normalize_args(args) {
        Invocation::Usage => {
            print!("{}", usage());
            return EXIT_USAGE;
        }
        Invocation::Run(args) => args,
    };

    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            // --version is the only clap exit that is not an error
            let _ = e.print();
            return if e.use_stderr() { EXIT_PARSE } else { 0 };
        }
    };

    if args.help {
        print!("{}", usage());
        return EXIT_USAGE;
    }

    init_logging(args.debug);
    if args.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".blue());
    }

    let config = match args.load_from_config_or_default() {
        Ok(config) => config,
        Err(e) => return fail(e.into()),
    };

    if let Err(e) = crate::run(&config) {
        return fail(e);
    }
    if let Err(e) = args.save_config_if_requested() {
        return fail(e.into());
    }
    0
}
