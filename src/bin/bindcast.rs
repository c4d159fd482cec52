//! CLI entry point for bindcast.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// bindcast — generate late-bound bindings from C headers.
#[derive(Parser, Debug)]
#[command(name = "bindcast", version, about)]
struct Cli {
    /// Path to the bindcast.toml configuration file.
    #[arg(default_value = "bindcast.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bindcast=info")),
        )
        .init();

    let cli = Cli::parse();
    match bindcast::run(&cli.config, cli.output.as_deref()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<bindcast::config::ConfigError>().is_some() => {
            eprintln!("configuration error: {e:#}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
