// ─── Update Orchestrator ───
// Single-flight install pipeline:
//   Preparing → Downloading → Extracting → Copying → Finalizing → Idle

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::extract::extract_archive;
use super::phase::{UpdateEvent, UpdatePhase};
use super::routing::{copy_package_tree, RouteRoots};
use super::ubermenu::UbermenuPreset;
use crate::core::downloader::{ArchiveDownload, PackageDownloader, DEFAULT_CONCURRENCY};
use crate::core::error::{io_at, LauncherError, LauncherResult};
use crate::core::packages::{
    validate_package_id, InstalledPackage, InstalledStateStore, PackageCatalog, RemotePackage,
};
use crate::core::remote::RemoteObjectStore;

/// Scratch directory under the local root, wiped at the start and end of
/// every run.
pub const WORKING_DIR_NAME: &str = "tmp";

/// Subdirectories of the scratch area, each holding one folder per package id.
const DOWNLOADS_DIR_NAME: &str = "downloads";
const EXTRACTED_DIR_NAME: &str = "extracted";

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct UpdateSettings {
    /// Launcher install root; default destination for package files.
    pub local_root: PathBuf,
    /// Game config directory, target of `!CONFIG/` files.
    pub config_dir: PathBuf,
    /// Path to the game executable; its grandparent's parent is the game
    /// base directory.
    pub game_executable: PathBuf,
    pub concurrency: usize,
    /// Debug switch: log copy destinations instead of writing them.
    pub disable_copy: bool,
}

impl UpdateSettings {
    pub fn new(local_root: PathBuf, config_dir: PathBuf, game_executable: PathBuf) -> Self {
        Self {
            local_root,
            config_dir,
            game_executable,
            concurrency: DEFAULT_CONCURRENCY,
            disable_copy: false,
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.local_root.join(WORKING_DIR_NAME)
    }
}

/// Game install directory for an executable at
/// `<base>/Binaries/Win32/TribesAscend.exe`.
pub fn game_base_dir(executable: &Path) -> LauncherResult<PathBuf> {
    let is_exe = executable
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
    if !is_exe || !executable.is_file() {
        return Err(LauncherError::InvalidGamePath(executable.to_path_buf()));
    }
    executable
        .parent()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| LauncherError::InvalidGamePath(executable.to_path_buf()))
}

/// Drives package installs. At most one run is in flight; a call made while
/// another holds the permit returns immediately without doing anything.
pub struct Updater {
    settings: UpdateSettings,
    store: Arc<dyn RemoteObjectStore>,
    state_store: InstalledStateStore,
    permit: Semaphore,
    phase: Mutex<UpdatePhase>,
    events: broadcast::Sender<UpdateEvent>,
}

impl Updater {
    pub fn new(
        settings: UpdateSettings,
        store: Arc<dyn RemoteObjectStore>,
        state_store: InstalledStateStore,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            store,
            state_store,
            permit: Semaphore::new(1),
            phase: Mutex::new(UpdatePhase::Idle),
            events,
        }
    }

    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    pub fn is_in_progress(&self) -> bool {
        self.permit.available_permits() == 0
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase.lock().map(|p| *p).unwrap_or_default()
    }

    /// Install everything in the catalog's update set.
    pub async fn perform_update(&self, catalog: &PackageCatalog) -> LauncherResult<()> {
        let Ok(_permit) = self.permit.try_acquire() else {
            debug!("Update already in progress, ignoring request");
            return Ok(());
        };
        self.run(catalog.update_plan()).await
    }

    /// Install one package (and its missing dependencies) on request.
    pub async fn install_one(&self, catalog: &PackageCatalog, id: &str) -> LauncherResult<()> {
        let Ok(_permit) = self.permit.try_acquire() else {
            debug!("Update already in progress, ignoring install of {}", id);
            return Ok(());
        };
        match catalog.install_plan(id) {
            Ok(plan) => self.run(plan).await,
            Err(e) => Err(self.fail(e.in_phase(UpdatePhase::Preparing, Some(id)))),
        }
    }

    /// Forget every install record so the next update reinstalls everything.
    /// Refused while a run holds the permit.
    pub async fn clear_installed_state(&self) -> LauncherResult<()> {
        let Ok(_permit) = self.permit.try_acquire() else {
            return Err(LauncherError::Other(
                "Cannot reset package state while an update is running".into(),
            ));
        };
        self.state_store.clear().await
    }

    /// `perform_update` on a background task. The outcome is also published
    /// as `Completed` or `Failed`.
    pub fn spawn_update(self: &Arc<Self>, catalog: PackageCatalog) -> JoinHandle<LauncherResult<()>> {
        let updater = Arc::clone(self);
        tokio::spawn(async move { updater.perform_update(&catalog).await })
    }

    pub fn spawn_install(
        self: &Arc<Self>,
        catalog: PackageCatalog,
        id: String,
    ) -> JoinHandle<LauncherResult<()>> {
        let updater = Arc::clone(self);
        tokio::spawn(async move { updater.install_one(&catalog, &id).await })
    }

    // ── Pipeline ────────────────────────────────────────

    async fn run(&self, plan: Vec<RemotePackage>) -> LauncherResult<()> {
        info!(
            "Starting update of {} package(s): [{}]",
            plan.len(),
            plan.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(", ")
        );

        let preset = UbermenuPreset::new(&self.settings.config_dir, &self.settings.local_root);
        let preserved = self.preserve_preset(&preset).await;

        let progress = ProgressReporter::new(self.events.clone());
        let result = self.execute(&plan, &progress).await;

        if preserved {
            if let Err(e) = preset.restore().await {
                self.preset_failed(e);
            }
        }
        self.set_phase(UpdatePhase::Idle);

        match result {
            Ok(installed) => {
                info!("Update finished, {} package(s) installed", installed.len());
                self.publish(UpdateEvent::Completed { installed });
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Publish `Failed` for `error` and hand it back to the caller.
    fn fail(&self, error: LauncherError) -> LauncherError {
        warn!("{}", error);
        let (phase, package) = match &error {
            LauncherError::UpdateFailed { phase, package, .. } => (*phase, package.clone()),
            _ => (UpdatePhase::Idle, None),
        };
        self.publish(UpdateEvent::Failed {
            phase,
            package,
            message: error.to_string(),
        });
        error
    }

    async fn execute(
        &self,
        plan: &[RemotePackage],
        progress: &ProgressReporter,
    ) -> LauncherResult<Vec<InstalledPackage>> {
        // ── Preparing
        self.enter(UpdatePhase::Preparing, progress);
        let in_preparing = |e: LauncherError| e.in_phase(UpdatePhase::Preparing, None);
        for package in plan {
            validate_package_id(&package.id)
                .map_err(|e| e.in_phase(UpdatePhase::Preparing, Some(&package.id)))?;
        }
        let roots = RouteRoots {
            local_root: self.settings.local_root.clone(),
            config_dir: self.settings.config_dir.clone(),
            game_base_dir: game_base_dir(&self.settings.game_executable).map_err(in_preparing)?,
        };
        let work_dir = self.settings.working_dir();
        reset_dir(&work_dir).await.map_err(in_preparing)?;

        // ── Downloading
        self.enter(UpdatePhase::Downloading, progress);
        let downloads_dir = work_dir.join(DOWNLOADS_DIR_NAME);
        let entries = plan
            .iter()
            .map(|p| ArchiveDownload::into_dir(&p.id, &p.object_key, &downloads_dir))
            .collect();
        let archives = PackageDownloader::new(Arc::clone(&self.store))
            .with_concurrency(self.settings.concurrency)
            .download_batch(entries, &|fraction: f64| {
                progress.report(UpdatePhase::Downloading.scale(fraction))
            })
            .await?;

        // ── Extracting
        self.enter(UpdatePhase::Extracting, progress);
        let mut package_dirs = Vec::with_capacity(archives.len());
        for (done, archive) in archives.into_iter().enumerate() {
            let package_dir = work_dir.join(EXTRACTED_DIR_NAME).join(&archive.package_id);
            let target = package_dir.clone();
            tokio::task::spawn_blocking(move || -> LauncherResult<()> {
                extract_archive(&archive.dest, &target)?;
                std::fs::remove_file(&archive.dest).map_err(io_at(&archive.dest))?;
                Ok(())
            })
            .await
            .map_err(|e| LauncherError::Other(format!("extraction task failed: {e}")))
            .and_then(|r| r)
            .map_err(|e| e.in_phase(UpdatePhase::Extracting, Some(package_id(&package_dir))))?;

            package_dirs.push(package_dir);
            progress.report(UpdatePhase::Extracting.scale(fraction(done + 1, plan.len())));
        }

        // ── Copying
        self.enter(UpdatePhase::Copying, progress);
        for (done, package_dir) in package_dirs.iter().enumerate() {
            let source = package_dir.clone();
            let roots = roots.clone();
            let dry_run = self.settings.disable_copy;
            let copied = tokio::task::spawn_blocking(move || copy_package_tree(&source, &roots, dry_run))
                .await
                .map_err(|e| LauncherError::Other(format!("copy task failed: {e}")))
                .and_then(|r| r)
                .map_err(|e| e.in_phase(UpdatePhase::Copying, Some(package_id(package_dir))))?;

            debug!("Copied {} file(s) from {:?}", copied, package_dir);
            progress.report(UpdatePhase::Copying.scale(fraction(done + 1, package_dirs.len())));
        }

        // ── Finalizing
        self.enter(UpdatePhase::Finalizing, progress);
        let in_finalizing = |e: LauncherError| e.in_phase(UpdatePhase::Finalizing, None);
        let installed: Vec<InstalledPackage> = plan.iter().map(RemotePackage::to_installed).collect();
        self.state_store
            .record_installed(&installed)
            .await
            .map_err(in_finalizing)?;
        tokio::fs::remove_dir_all(&work_dir)
            .await
            .map_err(io_at(&work_dir))
            .map_err(in_finalizing)?;
        progress.report(1.0);

        Ok(installed)
    }

    async fn preserve_preset(&self, preset: &UbermenuPreset) -> bool {
        let outcome = match preset.uses_preset().await {
            Ok(true) => preset.backup().await,
            other => other,
        };

        match outcome {
            Ok(backed_up) => backed_up,
            Err(e) => {
                self.preset_failed(e);
                false
            }
        }
    }

    fn preset_failed(&self, error: LauncherError) {
        warn!("Ubermenu preset preservation failed: {}", error);
        self.publish(UpdateEvent::PresetPreservationFailed {
            message: error.to_string(),
        });
    }

    fn enter(&self, phase: UpdatePhase, progress: &ProgressReporter) {
        self.set_phase(phase);
        progress.report(phase.progress_range().0);
    }

    fn set_phase(&self, phase: UpdatePhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
        debug!("Update phase: {}", phase);
        self.publish(UpdateEvent::PhaseChanged(phase));
    }

    fn publish(&self, event: UpdateEvent) {
        let _ = self.events.send(event);
    }
}

/// Publishes overall progress, dropping anything that would move backwards.
struct ProgressReporter {
    last: Mutex<f64>,
    events: broadcast::Sender<UpdateEvent>,
}

impl ProgressReporter {
    fn new(events: broadcast::Sender<UpdateEvent>) -> Self {
        Self {
            last: Mutex::new(0.0),
            events,
        }
    }

    fn report(&self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if value > *last {
            *last = value;
            let _ = self.events.send(UpdateEvent::Progress(value));
        }
    }
}

fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}

fn package_id(package_dir: &Path) -> &str {
    package_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
}

async fn reset_dir(dir: &Path) -> LauncherResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_at(dir)(e)),
    }
    tokio::fs::create_dir_all(dir).await.map_err(io_at(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packages::InstalledPackageState;
    use crate::core::remote::testing::MemoryObjectStore;
    use crate::core::remote::MANIFEST_KEY;
    use crate::core::update::extract::testing::zip_bytes;

    const MANIFEST: &str = r#"{"packages":[
        {"id":"core","displayName":"Core","version":"2.0.0","objectKey":"package/core.zip","required":true},
        {"id":"addon","displayName":"Addon","version":"1.0.0","objectKey":"package/addon.zip","dependencies":["core"]}
    ]}"#;

    struct Fixture {
        _tmp: tempfile::TempDir,
        settings: UpdateSettings,
        state_store: InstalledStateStore,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let exe = tmp
                .path()
                .join("Tribes")
                .join("Binaries")
                .join("Win32")
                .join("TribesAscend.exe");
            std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
            std::fs::write(&exe, b"MZ").unwrap();

            let local_root = tmp.path().join("launcher");
            let settings =
                UpdateSettings::new(local_root.clone(), tmp.path().join("config"), exe);
            Self {
                state_store: InstalledStateStore::in_dir(&local_root),
                settings,
                _tmp: tmp,
            }
        }

        fn game_dir(&self) -> PathBuf {
            game_base_dir(&self.settings.game_executable).unwrap()
        }

        fn updater(&self, store: MemoryObjectStore) -> Updater {
            Updater::new(self.settings.clone(), Arc::new(store), self.state_store.clone())
        }
    }

    fn full_store() -> MemoryObjectStore {
        MemoryObjectStore::default()
            .with_object(MANIFEST_KEY, MANIFEST)
            .with_object(
                "package/core.zip",
                zip_bytes(&[
                    ("tamods.dll", "core dll"),
                    ("!CONFIG/presets/ubermenu/config/config.lua", "stock"),
                    ("!TRIBESDIR/Binaries/Win32/tamods-loader.dll", "loader"),
                ]),
            )
            .with_object("package/addon.zip", zip_bytes(&[("!CONFIG/addon.lua", "addon")]))
    }

    fn drain(rx: &mut broadcast::Receiver<UpdateEvent>) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn phases(events: &[UpdateEvent]) -> Vec<UpdatePhase> {
        events
            .iter()
            .filter_map(|e| match e {
                UpdateEvent::PhaseChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn game_base_dir_walks_up_from_binaries() {
        let fixture = Fixture::new();
        assert!(fixture.game_dir().ends_with("Tribes"));
        assert!(matches!(
            game_base_dir(&fixture.settings.local_root.join("game.bin")),
            Err(LauncherError::InvalidGamePath(_))
        ));
    }

    #[tokio::test]
    async fn update_routes_files_and_commits_state() {
        let fixture = Fixture::new();
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);
        let mut rx = updater.subscribe();

        updater.perform_update(&catalog).await.unwrap();

        let settings = &fixture.settings;
        assert_eq!(
            std::fs::read_to_string(settings.local_root.join("tamods.dll")).unwrap(),
            "core dll"
        );
        assert!(settings
            .config_dir
            .join("presets/ubermenu/config/config.lua")
            .is_file());
        assert!(fixture
            .game_dir()
            .join("Binaries/Win32/tamods-loader.dll")
            .is_file());
        assert!(!settings.config_dir.join("addon.lua").exists());
        assert!(!settings.working_dir().exists());

        let state = fixture.state_store.load().await.unwrap();
        assert_eq!(state.packages.len(), 1);
        assert_eq!(state.find("core").unwrap().version.to_string(), "2.0.0");

        let events = drain(&mut rx);
        assert_eq!(
            phases(&events),
            vec![
                UpdatePhase::Preparing,
                UpdatePhase::Downloading,
                UpdatePhase::Extracting,
                UpdatePhase::Copying,
                UpdatePhase::Finalizing,
                UpdatePhase::Idle,
            ]
        );
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                UpdateEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert!(matches!(events.last(), Some(UpdateEvent::Completed { installed }) if installed.len() == 1));
        assert_eq!(updater.phase(), UpdatePhase::Idle);
        assert!(!updater.is_in_progress());
    }

    #[tokio::test]
    async fn second_update_after_success_has_nothing_to_do() {
        let fixture = Fixture::new();
        let store = Arc::new(full_store());
        let updater = Updater::new(
            fixture.settings.clone(),
            Arc::clone(&store) as Arc<dyn RemoteObjectStore>,
            fixture.state_store.clone(),
        );

        let catalog = PackageCatalog::load(&*store, &fixture.state_store).await.unwrap();
        assert!(catalog.update_required());
        updater.perform_update(&catalog).await.unwrap();

        let catalog = PackageCatalog::load(&*store, &fixture.state_store).await.unwrap();
        assert!(!catalog.update_required());
        assert!(catalog.update_plan().is_empty());
    }

    #[tokio::test]
    async fn install_one_pulls_in_missing_dependency() {
        let fixture = Fixture::new();
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);

        updater.install_one(&catalog, "addon").await.unwrap();

        let state = fixture.state_store.load().await.unwrap();
        assert!(state.find("addon").is_some());
        assert!(state.find("core").is_some());
        assert!(fixture.settings.config_dir.join("addon.lua").is_file());
    }

    #[tokio::test]
    async fn call_while_permit_is_held_is_a_silent_no_op() {
        let fixture = Fixture::new();
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);
        let mut rx = updater.subscribe();

        let held = updater.permit.try_acquire().unwrap();
        assert!(updater.is_in_progress());
        updater.perform_update(&catalog).await.unwrap();
        updater.install_one(&catalog, "addon").await.unwrap();
        drop(held);

        assert!(drain(&mut rx).is_empty());
        assert!(!fixture.state_store.path().exists());
    }

    #[tokio::test]
    async fn clearing_state_waits_for_the_permit() {
        let fixture = Fixture::new();
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);
        updater.perform_update(&catalog).await.unwrap();
        assert!(fixture.state_store.path().exists());

        let held = updater.permit.try_acquire().unwrap();
        assert!(updater.clear_installed_state().await.is_err());
        assert!(fixture.state_store.path().exists());
        drop(held);

        updater.clear_installed_state().await.unwrap();
        assert!(fixture.state_store.load().await.unwrap().packages.is_empty());
    }

    #[tokio::test]
    async fn spawned_install_of_unknown_id_reports_failure() {
        let fixture = Fixture::new();
        let store = MemoryObjectStore::default().with_object(MANIFEST_KEY, r#"{"packages":[]}"#);
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = Arc::new(fixture.updater(store));
        let mut rx = updater.subscribe();

        let result = updater.spawn_install(catalog, "nope".into()).await.unwrap();
        assert_eq!(result.unwrap_err().failed_package(), Some("nope"));

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [UpdateEvent::Failed {
                phase: UpdatePhase::Preparing,
                package: Some(p),
                ..
            }] if p == "nope"
        ));
        assert!(!updater.is_in_progress());
    }

    #[tokio::test]
    async fn package_id_escaping_the_work_dir_is_rejected() {
        let fixture = Fixture::new();
        let escaping = RemotePackage {
            id: "../../outside".into(),
            display_name: "Outside".into(),
            description: String::new(),
            version: semver::Version::new(1, 0, 0),
            object_key: "package/outside.zip".into(),
            required: true,
            dependencies: Vec::new(),
        };
        let catalog = PackageCatalog::reconcile(vec![escaping], InstalledPackageState::default());
        let store = MemoryObjectStore::default()
            .with_object("package/outside.zip", zip_bytes(&[("a.txt", "escaped")]));
        let updater = fixture.updater(store);

        let err = updater.perform_update(&catalog).await.unwrap_err();
        assert!(matches!(
            err,
            LauncherError::UpdateFailed {
                phase: UpdatePhase::Preparing,
                ref source,
                ..
            } if matches!(**source, LauncherError::InvalidPackageId(_))
        ));
        assert_eq!(err.failed_package(), Some("../../outside"));
        assert!(!fixture._tmp.path().join("outside").exists());
        assert!(!fixture.state_store.path().exists());
    }

    #[tokio::test]
    async fn failed_download_commits_nothing_and_returns_to_idle() {
        let fixture = Fixture::new();
        let store = MemoryObjectStore::default().with_object(MANIFEST_KEY, MANIFEST);
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);
        let mut rx = updater.subscribe();

        let err = updater.perform_update(&catalog).await.unwrap_err();
        assert_eq!(err.failed_package(), Some("core"));
        assert!(!fixture.state_store.path().exists());
        assert_eq!(updater.phase(), UpdatePhase::Idle);
        assert!(!updater.is_in_progress());

        let events = drain(&mut rx);
        assert_eq!(phases(&events).last(), Some(&UpdatePhase::Idle));
        assert!(matches!(
            events.last(),
            Some(UpdateEvent::Failed {
                phase: UpdatePhase::Downloading,
                package: Some(p),
                ..
            }) if p == "core"
        ));
    }

    #[tokio::test]
    async fn corrupt_archive_fails_in_extracting() {
        let fixture = Fixture::new();
        let store = MemoryObjectStore::default()
            .with_object(MANIFEST_KEY, MANIFEST)
            .with_object("package/core.zip", b"definitely not a zip".to_vec());
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = fixture.updater(store);

        let err = updater.perform_update(&catalog).await.unwrap_err();
        assert!(matches!(
            err,
            LauncherError::UpdateFailed {
                phase: UpdatePhase::Extracting,
                ..
            }
        ));
        assert_eq!(err.failed_package(), Some("core"));
        assert!(!fixture.state_store.path().exists());
    }

    #[tokio::test]
    async fn invalid_game_path_fails_in_preparing() {
        let mut fixture = Fixture::new();
        fixture.settings.game_executable = fixture.settings.local_root.join("missing.exe");
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();

        let err = fixture.updater(store).perform_update(&catalog).await.unwrap_err();
        assert!(matches!(
            err,
            LauncherError::UpdateFailed {
                phase: UpdatePhase::Preparing,
                package: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn user_ubermenu_config_survives_update() {
        let fixture = Fixture::new();
        let preset = UbermenuPreset::new(&fixture.settings.config_dir, &fixture.settings.local_root);
        std::fs::create_dir_all(preset.preset_config().parent().unwrap()).unwrap();
        std::fs::write(preset.config_lua(), "require(\"presets/ubermenu/preset\")\n").unwrap();
        std::fs::write(preset.preset_config(), "custom").unwrap();

        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        fixture.updater(store).perform_update(&catalog).await.unwrap();

        assert_eq!(std::fs::read_to_string(preset.preset_config()).unwrap(), "custom");
        assert!(!preset.backup_path().exists());
    }

    #[tokio::test]
    async fn disabled_copy_still_records_state() {
        let mut fixture = Fixture::new();
        fixture.settings.disable_copy = true;
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();

        fixture.updater(store).perform_update(&catalog).await.unwrap();

        assert!(!fixture.settings.local_root.join("tamods.dll").exists());
        let state: InstalledPackageState = fixture.state_store.load().await.unwrap();
        assert!(state.find("core").is_some());
    }

    #[tokio::test]
    async fn spawned_update_reports_completion_on_the_channel() {
        let fixture = Fixture::new();
        let store = full_store();
        let catalog = PackageCatalog::load(&store, &fixture.state_store).await.unwrap();
        let updater = Arc::new(fixture.updater(store));
        let mut rx = updater.subscribe();

        updater.spawn_update(catalog).await.unwrap().unwrap();

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, UpdateEvent::Completed { .. })));
    }
}
