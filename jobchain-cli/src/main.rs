mod commands;
mod output;

use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use commands::run::RunArgs;

/// Run declarative job chains from a YAML job description
#[derive(Parser, Debug)]
#[command(name = "jobchain", version, about)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.run.check {
        commands::validate::execute(&cli.run)
    } else {
        commands::run::execute(cli.run)
    }
}

/// `RUST_LOG` wins over `-v`. Event handler logs stay visible at the default level.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn,jobchain::event=info",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
