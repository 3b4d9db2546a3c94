use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use super::model::{InstalledPackage, InstalledPackageState};
use crate::core::error::{io_at, LauncherError, LauncherResult};

pub const STATE_FILE_NAME: &str = "packagestate.json";

/// Persists the set of installed package ids/versions.
///
/// The file is the only source of truth for what is on disk. A missing file
/// means nothing is installed.
#[derive(Debug, Clone)]
pub struct InstalledStateStore {
    path: PathBuf,
}

impl InstalledStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store using the default file name inside `local_root`.
    pub fn in_dir(local_root: &Path) -> Self {
        Self::new(local_root.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> LauncherResult<InstalledPackageState> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No package state at {:?}, nothing installed", self.path);
                return Ok(InstalledPackageState::default());
            }
            Err(e) => {
                return Err(LauncherError::StateLoad {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_str(&raw).map_err(|e| LauncherError::StateLoad {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Rewrite the whole state file.
    ///
    /// Written to a sibling temp file and renamed over the old one, so a
    /// crash never leaves a half-written document behind.
    pub async fn save(&self, state: &InstalledPackageState) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_at(parent))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_at(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_at(&self.path))?;
        Ok(())
    }

    /// Merge freshly installed records into the persisted state.
    pub async fn record_installed(
        &self,
        installed: &[InstalledPackage],
    ) -> LauncherResult<InstalledPackageState> {
        let mut state = self.load().await?;
        for package in installed {
            state.mark_installed(package.clone());
        }
        state.updated_at = Some(Utc::now());
        self.save(&state).await?;
        info!(
            "Recorded {} installed package(s) in {:?}",
            installed.len(),
            self.path
        );
        Ok(state)
    }

    /// Forget everything; the next update reinstalls all required packages.
    pub async fn clear(&self) -> LauncherResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Cleared package state {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LauncherError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn installed(id: &str, version: &str) -> InstalledPackage {
        InstalledPackage {
            id: id.into(),
            version: Version::parse(version).unwrap(),
        }
    }

    #[tokio::test]
    async fn missing_file_means_nothing_installed() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstalledStateStore::in_dir(dir.path());
        assert_eq!(store.load().await.unwrap(), InstalledPackageState::default());
    }

    #[tokio::test]
    async fn record_installed_merges_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstalledStateStore::in_dir(dir.path());

        store
            .record_installed(&[installed("core", "1.0.0"), installed("hud", "1.0.0")])
            .await
            .unwrap();
        store
            .record_installed(&[installed("core", "2.0.0")])
            .await
            .unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.packages.len(), 2);
        assert_eq!(state.find("core").unwrap().version, Version::new(2, 0, 0));
        assert_eq!(state.find("hud").unwrap().version, Version::new(1, 0, 0));
        assert!(state.updated_at.is_some());
        assert!(!dir.path().join("packagestate.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstalledStateStore::in_dir(dir.path());
        tokio::fs::write(store.path(), "{ not json").await.unwrap();

        assert!(matches!(
            store.load().await,
            Err(LauncherError::StateLoad { .. })
        ));
    }

    #[tokio::test]
    async fn clear_removes_state_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = InstalledStateStore::in_dir(dir.path());
        store.record_installed(&[installed("core", "1.0.0")]).await.unwrap();

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        store.clear().await.unwrap();
    }
}
