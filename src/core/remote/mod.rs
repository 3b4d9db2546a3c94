pub mod store;

pub use store::{
    archive_file_name, HttpObjectStore, ProgressFn, RemoteObjectStore, TransferProgress,
    DEFAULT_BASE_URL, MANIFEST_KEY, PACKAGE_KEY_PREFIX,
};
