use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use retrace_config::{AppConfig, HistorySettings};
use retrace_mod_history::{ClearPolicy, HistoryConfig};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

mod document;
mod script;

use script::{Script, Session};

/// Replays an edit script through the undo/redo engine and prints the results.
#[derive(Parser, Debug)]
#[command(name = "retrace", version, about)]
struct Cli {
    /// JSON edit script to run.
    script: PathBuf,

    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coalescing window in milliseconds, overriding the config file.
    #[arg(long = "window-ms")]
    window_ms: Option<u64>,

    /// Make clear steps discard both stacks entirely.
    #[arg(long)]
    clear_everything: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the config file's filter
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let app_config = load_config(&cli);
    if !from_env {
        filter_handle.reload(EnvFilter::new(&app_config.log_filter))?;
    }

    tracing::info!("Starting retrace with {}", cli.script.display());

    let history_config = history_config(&app_config.history, &cli);
    let script = Script::load(&cli.script)?;
    let mut session = Session::new(history_config);
    session.run(&script)?;

    for line in session.output() {
        println!("{line}");
    }
    println!("final: {}", session.document().render());
    tracing::info!("Done, {} refreshes", session.refreshes());

    Ok(())
}

/// Loads the config named on the command line or at the default location,
/// writing a default file when none exists yet.
fn load_config(cli: &Cli) -> AppConfig {
    let path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    AppConfig::load_or_create(&path)
}

/// Merges file settings with command-line overrides.
fn history_config(settings: &HistorySettings, cli: &Cli) -> HistoryConfig {
    let mut config = HistoryConfig::from(settings);
    if let Some(window_ms) = cli.window_ms {
        config = config.with_coalesce_window(Duration::from_millis(window_ms));
    }
    if cli.clear_everything {
        config = config.with_clear_policy(ClearPolicy::Everything);
    }
    config
}
