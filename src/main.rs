use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use themesync::adapters::{FileStorage, HttpNetwork, StaticEnvironment, SystemClock, TracingDocument};
use themesync::error::{ConfigError, NetworkError};
use themesync::{AccessibilityFlags, EnginePorts, PreferenceEngine, SyncConfig, ThemeName};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("network setup failed: {0}")]
    Network(#[from] NetworkError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "theme-sync", about = "Theme preference sync CLI")]
struct Cli {
    /// Overrides `THEME_SYNC_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `THEME_SYNC_STORAGE_PATH`.
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Treat the host as offline; no requests are made.
    #[arg(long)]
    offline: bool,

    /// System color scheme to report; omit to model a missing probe.
    #[arg(long)]
    system_theme: Option<ThemeName>,

    #[arg(long)]
    reduced_motion: bool,

    #[arg(long)]
    high_contrast: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print local state and preferences.
    Show {
        /// Also fetch the server's preferences.
        #[arg(long)]
        remote: bool,
        /// Skip the cache when fetching.
        #[arg(long, requires = "remote")]
        refresh: bool,
    },
    /// Set the theme.
    Set { theme: ThemeName },
    /// Switch to the opposite theme.
    Toggle,
    /// Reconcile with the server now.
    Sync,
    /// List the themes the server offers.
    Themes,
    /// Follow the system theme.
    AutoSwitch { state: Switch },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutput<'a> {
    state: themesync::ThemeState,
    preferences: themesync::ThemePreferences,
    last_sync: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<&'a themesync::SyncResult<themesync::ThemePreferences>>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(storage) = cli.storage {
        config.storage_path = storage;
    }

    let network = Arc::new(HttpNetwork::from_config(&config)?);
    network.set_online(!cli.offline);
    let ports = EnginePorts {
        storage: Arc::new(FileStorage::new(&config.storage_path)),
        network,
        document: Arc::new(TracingDocument::new()),
        environment: Arc::new(StaticEnvironment {
            system_theme: cli.system_theme,
            accessibility: Some(AccessibilityFlags {
                prefers_reduced_motion: cli.reduced_motion,
                prefers_high_contrast: cli.high_contrast,
            }),
        }),
        clock: Arc::new(SystemClock),
        view_transition: None,
    };

    let engine = PreferenceEngine::new(ports, &config);
    engine.initialize();
    // Let the startup reconcile land before applying the command on top.
    engine.settle().await;

    let result = run(&engine, cli.command).await;
    engine.settle().await;
    engine.shutdown();
    result
}

async fn run(engine: &PreferenceEngine, command: Command) -> Result<(), CliError> {
    match command {
        Command::Show { remote, refresh } => {
            let remote = if remote { Some(engine.remote_preferences(refresh).await) } else { None };
            print_json(&ShowOutput {
                state: engine.state(),
                preferences: engine.preferences(),
                last_sync: engine.last_sync(),
                remote: remote.as_ref(),
            })
        }
        Command::Set { theme } => print_json(&engine.set_theme(theme).await),
        Command::Toggle => print_json(&engine.toggle_theme().await),
        Command::Sync => print_json(&engine.sync_now().await),
        Command::Themes => print_json(&engine.available_themes().await),
        Command::AutoSwitch { state } => print_json(&engine.set_auto_switch(matches!(state, Switch::On)).await),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
