use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use fillcam::app::{self, AppError, RunMode};
use fillcam_core::Config;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};

/// Timed still captures with ambient-light driven fill lighting.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single round immediately and exit
    #[arg(long)]
    once: bool,
}

fn start(args: Args) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(AppError::Signal)?;
    }

    let mode = if args.once {
        RunMode::Once
    } else {
        RunMode::Continuous
    };
    app::run(config, mode, &stop)
}

fn main() -> ExitCode {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match start(args) {
        Ok(()) => {
            info!("fillcam stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
