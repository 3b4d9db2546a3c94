use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::settings::{LauncherSettings, SETTINGS_FILE};
use crate::core::error::LauncherResult;
use crate::core::http::build_http_client;
use crate::core::inject::{platform_injector, Injector, PlatformBackend};
use crate::core::packages::{InstalledStateStore, PackageCatalog};
use crate::core::remote::{HttpObjectStore, RemoteObjectStore, MANIFEST_KEY};
use crate::core::update::{UpdateSettings, Updater};

const APP_DIR_NAME: &str = "TribesLauncher";

/// Long-lived collaborators shared by every command.
pub struct AppState {
    pub data_dir: PathBuf,
    pub launcher_settings: LauncherSettings,
    pub store: Arc<dyn RemoteObjectStore>,
    pub state_store: InstalledStateStore,
    pub updater: Arc<Updater>,
}

impl AppState {
    /// Load settings from `data_dir` and wire up the HTTP store and updater.
    pub fn new(data_dir: PathBuf) -> LauncherResult<Self> {
        let launcher_settings = LauncherSettings::load_or_default(&data_dir.join(SETTINGS_FILE));
        let http_client = build_http_client()?;
        let store: Arc<dyn RemoteObjectStore> = Arc::new(HttpObjectStore::new(
            http_client,
            launcher_settings.update_url.clone(),
        ));
        Ok(Self::with_store(data_dir, launcher_settings, store))
    }

    pub fn with_store(
        data_dir: PathBuf,
        launcher_settings: LauncherSettings,
        store: Arc<dyn RemoteObjectStore>,
    ) -> Self {
        let state_store = InstalledStateStore::in_dir(&data_dir);
        let updater = Arc::new(Updater::new(
            update_settings(&data_dir, &launcher_settings),
            Arc::clone(&store),
            state_store.clone(),
        ));

        Self {
            data_dir,
            launcher_settings,
            store,
            state_store,
            updater,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        self.launcher_settings.save(&self.settings_path())
    }

    /// Whether the update server answers for the package manifest.
    pub async fn update_server_reachable(&self) -> bool {
        self.store.is_accessible(MANIFEST_KEY).await
    }

    /// Fresh catalog: remote manifest joined with the local state file.
    pub async fn load_catalog(&self) -> LauncherResult<PackageCatalog> {
        PackageCatalog::load(self.store.as_ref(), &self.state_store).await
    }

    pub fn module_path(&self) -> LauncherResult<PathBuf> {
        self.launcher_settings.injection.module_path(&self.data_dir)
    }

    pub fn injector(&self) -> Injector<PlatformBackend> {
        platform_injector().with_timeout(self.launcher_settings.injection.timeout())
    }

    /// Forget installed state so the next update reinstalls everything.
    pub async fn reset_installed_state(&self) -> LauncherResult<()> {
        self.updater.clear_installed_state().await
    }
}

fn update_settings(data_dir: &Path, settings: &LauncherSettings) -> UpdateSettings {
    let mut update = UpdateSettings::new(
        data_dir.to_path_buf(),
        settings.config_dir.clone(),
        settings.game_path.clone(),
    );
    update.concurrency = settings.download_concurrency;
    update.disable_copy = settings.disable_copy_on_update;
    update
}

/// `<data dir>/TribesLauncher`, created on first use.
pub fn default_data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);

    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }

    dir
}
