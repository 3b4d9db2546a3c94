use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::remote::{RemoteObjectStore, MANIFEST_KEY};

/// A package as advertised by the remote manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePackage {
    /// Unique identifier, also the join key against local state.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Compared against the installed version to decide on updates.
    pub version: Version,
    /// Key of the zipped package in the object store.
    pub object_key: String,
    /// Mandatory for TAMods to run at all.
    #[serde(default)]
    pub required: bool,
    /// Ids that must be installed alongside. Unknown ids are ignored.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl RemotePackage {
    pub fn to_installed(&self) -> InstalledPackage {
        InstalledPackage {
            id: self.id.clone(),
            version: self.version.clone(),
        }
    }
}

/// Top-level remote manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    pub packages: Vec<RemotePackage>,
}

impl PackageManifest {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let manifest: Self = serde_json::from_str(raw).map_err(LauncherError::ManifestParse)?;
        for package in &manifest.packages {
            validate_package_id(&package.id)?;
        }
        Ok(manifest)
    }

    /// Fetch and parse the manifest from the object store.
    pub async fn fetch(store: &dyn RemoteObjectStore) -> LauncherResult<Self> {
        info!("Fetching package manifest...");
        let raw = store
            .fetch_string(MANIFEST_KEY)
            .await
            .map_err(|e| LauncherError::ManifestDownload(Box::new(e)))?;
        let manifest = Self::parse(&raw)?;
        info!("Loaded {} packages from manifest", manifest.packages.len());
        Ok(manifest)
    }
}

/// Package ids name directories in the scratch area, so each must be a
/// single plain path component.
pub fn validate_package_id(id: &str) -> LauncherResult<()> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !id.contains(['/', '\\']) => Ok(()),
        _ => Err(LauncherError::InvalidPackageId(id.to_string())),
    }
}

/// Record of a package that a previous install put on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub id: String,
    pub version: Version,
}

/// Everything the launcher has installed, persisted as a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackageState {
    #[serde(default)]
    pub packages: Vec<InstalledPackage>,
    /// When an install batch last committed to this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InstalledPackageState {
    pub fn find(&self, id: &str) -> Option<&InstalledPackage> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Record an install, replacing any older record for the same id.
    pub fn mark_installed(&mut self, installed: InstalledPackage) {
        self.mark_uninstalled(&installed.id);
        self.packages.push(installed);
    }

    pub fn mark_uninstalled(&mut self, id: &str) {
        self.packages.retain(|p| p.id != id);
    }
}

/// Display-independent classification of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    UpdateRequired,
    Installed,
    Available,
    /// Installed locally but no longer offered remotely.
    Orphaned,
}

/// Join of the remote definition and the local install record for one id.
/// At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    remote: Option<RemotePackage>,
    local: Option<InstalledPackage>,
}

impl LocalPackage {
    pub fn new(remote: Option<RemotePackage>, local: Option<InstalledPackage>) -> Option<Self> {
        if remote.is_none() && local.is_none() {
            return None;
        }
        Some(Self { remote, local })
    }

    pub fn id(&self) -> &str {
        match (&self.remote, &self.local) {
            (Some(remote), _) => &remote.id,
            (None, Some(local)) => &local.id,
            (None, None) => unreachable!("LocalPackage always has one side"),
        }
    }

    pub fn remote(&self) -> Option<&RemotePackage> {
        self.remote.as_ref()
    }

    pub fn local(&self) -> Option<&InstalledPackage> {
        self.local.as_ref()
    }

    pub fn available_remotely(&self) -> bool {
        self.remote.is_some()
    }

    pub fn is_installed(&self) -> bool {
        self.local.is_some()
    }

    /// Missing-but-required, or installed at an older version than offered.
    pub fn requires_update(&self) -> bool {
        match (&self.remote, &self.local) {
            (Some(remote), None) => remote.required,
            (Some(remote), Some(local)) => local.version < remote.version,
            (None, _) => false,
        }
    }

    pub fn status(&self) -> PackageStatus {
        if self.requires_update() {
            PackageStatus::UpdateRequired
        } else if !self.available_remotely() {
            PackageStatus::Orphaned
        } else if self.is_installed() {
            PackageStatus::Installed
        } else {
            PackageStatus::Available
        }
    }

    /// Dependency ids declared by the remote definition.
    pub fn dependency_ids(&self) -> &[String] {
        self.remote
            .as_ref()
            .map(|r| r.dependencies.as_slice())
            .unwrap_or(&[])
    }
}
