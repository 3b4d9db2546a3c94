// ─── Package Catalog ───
// Remote manifest joined against local install state, plus update planning.

use std::collections::HashSet;

use tracing::debug;

use super::model::{InstalledPackageState, LocalPackage, PackageManifest, RemotePackage};
use super::state_store::InstalledStateStore;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::remote::RemoteObjectStore;

/// Reconciled view of every known package. Rebuilt for each update check.
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    packages: Vec<LocalPackage>,
}

impl PackageCatalog {
    /// Full outer join of the remote packages and the installed records on id.
    ///
    /// Remote order is preserved; packages only known locally follow in the
    /// order they were recorded.
    pub fn reconcile(remote: Vec<RemotePackage>, installed: InstalledPackageState) -> Self {
        let mut local_records = installed.packages;
        let mut packages = Vec::with_capacity(remote.len() + local_records.len());

        for remote_package in remote {
            let local = local_records
                .iter()
                .position(|p| p.id == remote_package.id)
                .map(|idx| local_records.remove(idx));
            packages.extend(LocalPackage::new(Some(remote_package), local));
        }

        for orphan in local_records {
            packages.extend(LocalPackage::new(None, Some(orphan)));
        }

        Self { packages }
    }

    /// Download the manifest and join it with the persisted install state.
    pub async fn load(
        store: &dyn RemoteObjectStore,
        state_store: &InstalledStateStore,
    ) -> LauncherResult<Self> {
        let manifest = PackageManifest::fetch(store).await?;
        let installed = state_store.load().await?;
        Ok(Self::reconcile(manifest.packages, installed))
    }

    pub fn packages(&self) -> &[LocalPackage] {
        &self.packages
    }

    pub fn get(&self, id: &str) -> Option<&LocalPackage> {
        self.packages.iter().find(|p| p.id() == id)
    }

    /// Packages among `ids` that still need to be installed or refreshed.
    /// Ids with no catalog entry are skipped.
    fn unsatisfied<'a, S: AsRef<str>>(
        &'a self,
        ids: impl IntoIterator<Item = S>,
    ) -> Vec<&'a LocalPackage> {
        ids.into_iter()
            .filter_map(|id| self.get(id.as_ref()))
            .filter(|p| p.available_remotely() && (!p.is_installed() || p.requires_update()))
            .collect()
    }

    /// Packages that a plain update must install.
    ///
    /// The direct set (everything that `requires_update`) plus any dependency
    /// of the direct set that is missing or stale. Dependencies are expanded a
    /// single level: a dependency's own dependencies are not followed.
    pub fn update_set(&self) -> Vec<&LocalPackage> {
        let mut result: Vec<&LocalPackage> =
            self.packages.iter().filter(|p| p.requires_update()).collect();
        let mut seen: HashSet<&str> = result.iter().map(|p| p.id()).collect();

        let dependency_ids: Vec<&String> = result
            .iter()
            .copied()
            .flat_map(|p| p.dependency_ids())
            .collect();

        for dependency in self.unsatisfied(dependency_ids) {
            if seen.insert(dependency.id()) {
                result.push(dependency);
            }
        }

        debug!(
            "Update set: [{}]",
            result.iter().map(|p| p.id()).collect::<Vec<_>>().join(", ")
        );
        result
    }

    pub fn update_required(&self) -> bool {
        !self.update_set().is_empty()
    }

    /// One-level dependencies of `package` that are not yet satisfied.
    pub fn dependencies_for(&self, package: &LocalPackage) -> Vec<&LocalPackage> {
        let mut seen = HashSet::new();
        self.unsatisfied(package.dependency_ids())
            .into_iter()
            .filter(|p| p.id() != package.id() && seen.insert(p.id()))
            .collect()
    }

    /// Remote definitions to install when the user explicitly asks for `id`:
    /// the package itself followed by its unsatisfied dependencies.
    pub fn install_plan(&self, id: &str) -> LauncherResult<Vec<RemotePackage>> {
        let package = self
            .get(id)
            .ok_or_else(|| LauncherError::PackageNotFound(id.to_string()))?;
        let remote = package
            .remote()
            .ok_or_else(|| LauncherError::PackageNotFound(id.to_string()))?;

        let mut plan = vec![remote.clone()];
        plan.extend(
            self.dependencies_for(package)
                .into_iter()
                .filter_map(|p| p.remote().cloned()),
        );
        Ok(plan)
    }

    /// Remote definitions for the plain update set.
    pub fn update_plan(&self) -> Vec<RemotePackage> {
        self.update_set()
            .into_iter()
            .filter_map(|p| p.remote().cloned())
            .collect()
    }
}
