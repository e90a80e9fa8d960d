use std::process::ExitCode;

use clap::Parser;
use twotruths_cli::Cli;
use twotruths_core::config::AppConfig;

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use twotruths_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // stdout carries the command output
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Commands report config errors themselves; logging just falls back to off.
    if let Ok(config) = AppConfig::load(cli.load_options()) {
        init_logging(&config);
    }

    let result = twotruths_cli::execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
