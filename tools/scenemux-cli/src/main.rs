//! scenemux CLI: render every scene of a script in parallel, then merge the
//! per-scene videos into one file.
//!
//! Usage:
//!   scenemux <EXECUTABLE> <SCRIPT> <MEDIA_DIR> <OUTPUT> <QUALITY> [FRAME_RATE] [OPTIONS]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use scenemux_common::config::{config_file_path, AppConfig, LoggingConfig};
use scenemux_common::error::SceneMuxError;

mod commands;

use commands::render::RenderArgs;

#[derive(Parser, Debug)]
#[command(
    name = "scenemux",
    about = "Render scenes in parallel and merge them into a single video",
    version,
    author
)]
struct Cli {
    #[command(flatten)]
    render: RenderArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/scenemux/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version are not failures.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let (config, config_error) = load_config(cli.config.as_deref());

    let logging = if cli.verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        }
    } else {
        config.logging.clone()
    };
    scenemux_common::logging::init_logging(&logging);

    let result = match config_error {
        // An explicitly requested config must load.
        Some(err) if cli.config.is_some() => Err(err.into()),
        Some(err) => {
            tracing::warn!(error = %err, "Ignoring config file, using defaults");
            commands::render::run(cli.render, &config).await
        }
        None => commands::render::run(cli.render, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<SceneMuxError>()
                .map(SceneMuxError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

/// Load the config file, keeping the error for after logging is up.
fn load_config(explicit: Option<&std::path::Path>) -> (AppConfig, Option<SceneMuxError>) {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path(),
    };
    if explicit.is_none() && !path.exists() {
        return (AppConfig::default(), None);
    }
    match AppConfig::try_load_from(&path) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}
