pub mod catalog;
pub mod model;
pub mod state_store;

pub use catalog::PackageCatalog;
pub use model::{
    InstalledPackage, InstalledPackageState, LocalPackage, PackageManifest, PackageStatus,
    RemotePackage, validate_package_id,
};
pub use state_store::{InstalledStateStore, STATE_FILE_NAME};
