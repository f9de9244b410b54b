//! `applock` developer CLI.
//!
//! Evaluates the lock policy, manages the stored biometrics preference and
//! replays scripted sessions against the real controller.

mod host;
mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use applock_core::{
    next_failure_state_with_limit, should_lock_biometric_session,
    should_relock_on_foreground, AppLockConfig, AppLockController, AppState, Platform,
    SettingsStore, FAILURE_LIMIT,
};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use tracing_subscriber::EnvFilter;

use crate::host::{
    default_settings_path, simulation_settings, FileSettingsStore, LoggingSession,
    ManualLifecycle, ScriptedPrompt,
};
use crate::script::Script;

#[derive(Parser)]
#[command(name = "applock")]
#[command(about = "Biometric app-lock developer tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Controller config as a JSON file
    #[arg(long, global = true, env = "APPLOCK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the pure lock rules
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Read or change the stored biometrics preference
    Settings {
        /// Settings file (defaults to the user config directory)
        #[arg(long, env = "APPLOCK_SETTINGS_PATH")]
        settings_path: Option<PathBuf>,

        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Replay a JSON script of host events and print the state after each step
    Simulate {
        /// Path to the script
        script: PathBuf,

        /// Platform the simulated app runs on
        #[arg(long, default_value = "ios")]
        platform: Platform,

        /// Read and write this settings file instead of the script's `enabled`
        #[arg(long, env = "APPLOCK_SETTINGS_PATH")]
        settings_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Whether biometric locking applies
    ShouldLock {
        /// Running on a native build
        #[arg(long)]
        native: bool,
        /// An authenticated session exists
        #[arg(long)]
        session: bool,
        /// The user opted in
        #[arg(long)]
        enabled: bool,
    },

    /// Record one failed attempt on top of `previous`
    Escalate {
        /// Consecutive failures so far
        previous: u32,
        /// Failures tolerated before a forced re-login
        #[arg(long, default_value_t = FAILURE_LIMIT)]
        limit: u32,
    },

    /// Whether a lifecycle transition re-locks the app
    Relock {
        /// State before the transition (active, background, inactive)
        previous: AppState,
        /// State after the transition
        next: AppState,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print whether biometric locking is enabled
    Get,
    /// Persist the enabled flag
    Enable,
    /// Delete the enabled flag
    Disable,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppLockConfig> {
    let Some(path) = path else {
        return Ok(AppLockConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    Ok(AppLockConfig::from_json(&json)?)
}

fn run_policy(command: PolicyCommands) -> Result<()> {
    match command {
        PolicyCommands::ShouldLock {
            native,
            session,
            enabled,
        } => println!("{}", should_lock_biometric_session(native, session, enabled)),
        PolicyCommands::Escalate { previous, limit } => {
            let outcome = next_failure_state_with_limit(previous, limit);
            println!("{}", serde_json::to_string(&outcome)?);
        }
        PolicyCommands::Relock { previous, next } => {
            println!("{}", should_relock_on_foreground(previous, next));
        }
    }
    Ok(())
}

async fn run_settings(
    config: &AppLockConfig,
    settings_path: Option<PathBuf>,
    action: SettingsAction,
) -> Result<()> {
    let path = settings_path
        .or_else(default_settings_path)
        .ok_or_else(|| eyre!("no config directory, pass --settings-path"))?;
    tracing::debug!(path = %path.display(), "using settings file");
    let store = FileSettingsStore::new(&path);
    let key = config.settings_key.clone();

    match action {
        SettingsAction::Get => println!("{}", store.read_flag(key).await?),
        SettingsAction::Enable => {
            store.write_flag(key, true).await?;
            tracing::info!("biometric lock enabled");
        }
        SettingsAction::Disable => {
            store.write_flag(key, false).await?;
            tracing::info!("biometric lock disabled");
        }
    }
    Ok(())
}

async fn run_simulation(
    config: AppLockConfig,
    script_path: &Path,
    platform: Platform,
    settings_path: Option<&Path>,
) -> Result<()> {
    let script = Script::from_path(script_path)?;
    if let Some(path) = settings_path {
        tracing::debug!(path = %path.display(), "simulating against settings file");
    }
    let settings = simulation_settings(&config.settings_key, script.enabled, settings_path);
    let prompt = Arc::new(ScriptedPrompt::default());
    let lifecycle = Arc::new(ManualLifecycle::default());
    let session = Arc::new(LoggingSession::default());

    let controller = AppLockController::new(
        platform,
        config,
        settings,
        prompt.clone(),
        lifecycle.clone(),
        session.clone(),
    )?;

    let reports = script::run(&controller, &prompt, &lifecycle, &script.steps).await?;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    tracing::info!(
        steps = reports.len(),
        prompts = prompt.shown(),
        relogins = session.relogins(),
        "simulation finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Policy(command) => run_policy(command),
        Commands::Settings {
            settings_path,
            action,
        } => run_settings(&config, settings_path, action).await,
        Commands::Simulate {
            script,
            platform,
            settings_path,
        } => run_simulation(config, &script, platform, settings_path.as_deref()).await,
    }
}
