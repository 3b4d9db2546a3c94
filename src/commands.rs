use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::inject::platform_injector;
use crate::core::launch;
use crate::core::packages::PackageCatalog;
use crate::core::process::{
    ProcessTarget, ProcessTargetTracker, SystemProcessLocator, TrackerEvent,
};
use crate::core::state::{default_data_dir, AppState, InjectMode};
use crate::core::update::{UbermenuPreset, UpdateEvent};

#[derive(Parser, Debug)]
#[command(name = "tribes-launcher")]
#[command(about = "TAMods package updater and injector for Tribes: Ascend", long_about = None)]
pub struct Cli {
    /// Launcher data directory (settings, package state, installed files).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show every known package and whether it needs work.
    Status,
    /// Install everything that is missing or out of date.
    Update,
    /// Install one package together with its missing dependencies.
    Install { id: String },
    /// Forget installed state and run a full update.
    Reinstall,
    /// Inject the TAMods DLL into a running game.
    Inject {
        /// Target process id.
        #[arg(long, conflicts_with = "name")]
        pid: Option<u32>,
        /// Target process image name.
        #[arg(long)]
        name: Option<String>,
        /// DLL to inject instead of the configured channel.
        #[arg(long)]
        module: Option<PathBuf>,
    },
    /// Watch for the game and report (or auto-inject on) start and exit.
    Watch {
        /// Inject after the configured delay even in manual mode.
        #[arg(long)]
        inject: bool,
    },
    /// Start the game, then watch it.
    Launch {
        #[arg(long)]
        inject: bool,
    },
    /// Opt the game config into the Ubermenu preset.
    SetupUbermenu,
    /// Print the active settings.
    Settings {
        /// Write them back to the settings file, filling in defaults.
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    pub async fn execute(self) -> LauncherResult<()> {
        let data_dir = self.data_dir.unwrap_or_else(default_data_dir);
        let state = AppState::new(data_dir)?;

        match self.command {
            Commands::Status => status(&state).await,
            Commands::Update => {
                let catalog = state.load_catalog().await?;
                run_update(&state, catalog, None).await
            }
            Commands::Install { id } => {
                let catalog = state.load_catalog().await?;
                run_update(&state, catalog, Some(id)).await
            }
            Commands::Reinstall => {
                state.reset_installed_state().await?;
                let catalog = state.load_catalog().await?;
                run_update(&state, catalog, None).await
            }
            Commands::Inject { pid, name, module } => inject(&state, pid, name, module).await,
            Commands::Watch { inject } => watch(&state, None, inject).await,
            Commands::Launch { inject } => {
                let settings = &state.launcher_settings;
                let pid = launch::launch_game(
                    &settings.game_path,
                    &settings.login_server_host,
                    &settings.custom_arguments,
                )?;
                println!("Launched game (pid {pid})");
                watch(&state, Some(pid), inject).await
            }
            Commands::SetupUbermenu => {
                let preset = UbermenuPreset::new(
                    &state.launcher_settings.config_dir,
                    &state.data_dir,
                );
                if preset.setup().await? {
                    println!("Ubermenu preset enabled in {}", preset.config_lua().display());
                } else {
                    println!("Ubermenu preset already enabled");
                }
                Ok(())
            }
            Commands::Settings { write } => {
                if write {
                    state.save_settings()?;
                    println!("Settings written to {}", state.settings_path().display());
                } else {
                    println!("{}", serde_json::to_string_pretty(&state.launcher_settings)?);
                }
                Ok(())
            }
        }
    }
}

async fn status(state: &AppState) -> LauncherResult<()> {
    if !state.update_server_reachable().await {
        warn!(
            "Update server {} is not answering",
            state.launcher_settings.update_url
        );
    }
    let catalog = state.load_catalog().await?;
    for package in catalog.packages() {
        let remote = package
            .remote()
            .map(|r| r.version.to_string())
            .unwrap_or_else(|| "-".into());
        let local = package
            .local()
            .map(|l| l.version.to_string())
            .unwrap_or_else(|| "-".into());
        let name = package
            .remote()
            .map(|r| r.display_name.as_str())
            .unwrap_or_else(|| package.id());
        println!(
            "{:<20} {:<28} remote {:<10} installed {:<10} {:?}",
            package.id(),
            name,
            remote,
            local,
            package.status()
        );
    }
    if catalog.update_required() {
        println!("Update required.");
    } else {
        println!("Up to date.");
    }
    Ok(())
}

async fn run_update(
    state: &AppState,
    catalog: PackageCatalog,
    install: Option<String>,
) -> LauncherResult<()> {
    let events = state.updater.subscribe();
    let task = match install {
        Some(id) => state.updater.spawn_install(catalog, id),
        None => state.updater.spawn_update(catalog),
    };
    follow_update(events, task, print_update_event).await
}

/// Feed update events to `on_event` until the task ends, then drain what
/// it published before finishing and return its result.
async fn follow_update(
    mut events: broadcast::Receiver<UpdateEvent>,
    mut task: JoinHandle<LauncherResult<()>>,
    mut on_event: impl FnMut(UpdateEvent),
) -> LauncherResult<()> {
    let joined = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => on_event(event),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut task).await,
            },
            joined = &mut task => break joined,
        }
    };

    loop {
        match events.try_recv() {
            Ok(event) => on_event(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    joined.map_err(|e| LauncherError::Other(format!("update task failed: {e}")))?
}

fn print_update_event(event: UpdateEvent) {
    match event {
        UpdateEvent::PhaseChanged(phase) => info!("Phase: {}", phase),
        UpdateEvent::Progress(p) => info!("Progress: {:>3.0}%", p * 100.0),
        UpdateEvent::PresetPreservationFailed { message } => {
            warn!("Could not preserve Ubermenu config: {}", message)
        }
        UpdateEvent::Completed { installed } => {
            println!("Installed {} package(s)", installed.len());
        }
        // The error itself is returned to the caller.
        UpdateEvent::Failed { .. } => {}
    }
}

async fn inject(
    state: &AppState,
    pid: Option<u32>,
    name: Option<String>,
    module: Option<PathBuf>,
) -> LauncherResult<()> {
    let module = match module {
        Some(path) => path,
        None => state.module_path()?,
    };
    let target = match (pid, name) {
        (Some(pid), _) => ProcessTarget::ById(pid),
        (None, Some(name)) => ProcessTarget::ByName(name),
        (None, None) => state
            .launcher_settings
            .injection
            .process_target(None)
            .ok_or_else(|| LauncherError::Other("Specify --pid or --name".into()))?,
    };

    let injector = state.injector();
    let pid = tokio::task::spawn_blocking(move || {
        let mut locator = SystemProcessLocator::new();
        injector.inject(&mut locator, &target, &module)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("injection task failed: {e}")))??;

    println!("Injected into pid {pid}");
    Ok(())
}

async fn watch(state: &AppState, launched_pid: Option<u32>, force_inject: bool) -> LauncherResult<()> {
    let injection = &state.launcher_settings.injection;
    let target = injection.process_target(launched_pid).ok_or_else(|| {
        LauncherError::Other("Process id detection needs a game started by this launcher".into())
    })?;
    let auto_inject = force_inject || injection.mode == InjectMode::Automatic;
    let delay = injection.auto_inject_delay();
    let module = state.module_path()?;
    let timeout = injection.timeout();

    let mut tracker = ProcessTargetTracker::new(SystemProcessLocator::new());
    tracker.set_target(target.clone());
    let handle = tracker.start(state.launcher_settings.poll_interval());
    let mut events = handle.subscribe();
    println!("Watching for {target} (Ctrl+C to stop)");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Ok(TrackerEvent::Appeared { name, pid }) => {
                println!("Game started: {name} (pid {pid})");
                if auto_inject {
                    tokio::time::sleep(delay).await;
                    let module = module.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        platform_injector()
                            .with_timeout(timeout)
                            .inject_pid(pid, &module)
                    })
                    .await;
                    match outcome {
                        Ok(Ok(())) => println!("Injected into pid {pid}"),
                        Ok(Err(e)) => error!("Injection failed: {}", e),
                        Err(e) => error!("Injection task failed: {}", e),
                    }
                }
            }
            Ok(TrackerEvent::Disappeared { name, pid }) => {
                println!("Game exited: {name} (pid {pid})");
            }
            Ok(TrackerEvent::PollingError {
                message,
                recoverable,
            }) => {
                if !recoverable {
                    return Err(LauncherError::Other(format!("Process polling stopped: {message}")));
                }
                warn!("Process polling error: {}", message);
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}
