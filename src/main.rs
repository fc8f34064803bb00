//! cb: run recipes of operational steps.

use cb::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let host = match cb::context::HostContext::detect(cli.recipes, cli.scripts) {
        Ok(host) => host,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    host.log();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = cb::cli::dispatch(cli.command, &host, &mut out) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
