// src/main.rs

use clap::Parser;
use sheetshard::cli::{self, Cli, CliContext, Commands};
use sheetshard::settings::{io, Settings};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, String> {
    let mut settings: Settings = io::load_settings_from_file().unwrap_or_else(|e| {
        warn!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    });
    settings.apply_env().map_err(|e| e.to_string())?;
    cli.apply_to(&mut settings);
    Ok(settings)
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Using document root {:?}", settings.store_root);

    let mut ctx = match CliContext::new(settings) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Could not open document store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let output = match cli::execute(&mut ctx, &cli.command) {
        Ok(output) => output,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if matches!(cli.command, Commands::Init { .. }) {
        if let Err(e) = io::save_settings_to_file(&ctx.settings) {
            error!("Index document created but settings could not be saved: {}", e);
            return ExitCode::FAILURE;
        }
    }

    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to render output: {}", e);
            ExitCode::FAILURE
        }
    }
}
