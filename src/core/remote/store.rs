// ─── Remote Object Store ───
// Blob storage holding the package manifest and the zipped packages.

use std::path::{Component, Path};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::core::error::{io_at, LauncherError, LauncherResult};

pub const DEFAULT_BASE_URL: &str = "https://tamods-update.s3-ap-southeast-2.amazonaws.com";

/// Key of the package manifest document.
pub const MANIFEST_KEY: &str = "packageconfig.json";

/// Archive keys are namespaced under this prefix in the bucket.
pub const PACKAGE_KEY_PREFIX: &str = "package/";

/// Byte-level progress of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Completed fraction in `[0, 1]`, or `None` when the size is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_downloaded as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Progress callback for a single transfer. May borrow from the caller.
pub type ProgressFn<'a> = dyn Fn(TransferProgress) + Send + Sync + 'a;

/// Read access to the remote object root.
///
/// Constructed once and passed to whoever needs it, so tests can swap in an
/// in-memory store.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    async fn fetch_bytes(&self, key: &str) -> LauncherResult<Vec<u8>>;

    async fn fetch_string(&self, key: &str) -> LauncherResult<String> {
        let bytes = self.fetch_bytes(key).await?;
        String::from_utf8(bytes).map_err(|e| LauncherError::Other(format!("{key}: {e}")))
    }

    /// Stream an object into `dest`, reporting progress as bytes arrive.
    /// Returns the number of bytes written.
    async fn download_to_file(
        &self,
        key: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> LauncherResult<u64>;

    /// Whether the object answers a HEAD request successfully.
    async fn is_accessible(&self, key: &str) -> bool;
}

/// Local file name for a package archive: the object key minus `package/`,
/// last segment only. `None` when that segment is not a plain file name.
pub fn archive_file_name(object_key: &str) -> Option<&str> {
    let stripped = object_key
        .strip_prefix(PACKAGE_KEY_PREFIX)
        .unwrap_or(object_key);
    let name = stripped.rsplit('/').next().unwrap_or(stripped);
    match Path::new(name).components().next() {
        Some(Component::Normal(_)) if !name.contains('\\') => Some(name),
        _ => None,
    }
}

/// `RemoteObjectStore` backed by plain HTTP(S) GETs against a base URL.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    async fn get_checked(&self, key: &str) -> LauncherResult<reqwest::Response> {
        let url = self.object_url(key);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteObjectStore for HttpObjectStore {
    async fn fetch_bytes(&self, key: &str) -> LauncherResult<Vec<u8>> {
        let response = self.get_checked(key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download_to_file(
        &self,
        key: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> LauncherResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_at(parent))?;
        }

        let response = self.get_checked(key).await?;
        let total_bytes = response.content_length();
        let mut stream = response.bytes_stream();

        let mut written = 0u64;
        // Handle is scoped so it is closed before anyone tries to extract the file.
        {
            let mut file = tokio::fs::File::create(dest).await.map_err(io_at(dest))?;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(io_at(dest))?;
                written += chunk.len() as u64;
                progress(TransferProgress {
                    bytes_downloaded: written,
                    total_bytes,
                });
            }
            file.flush().await.map_err(io_at(dest))?;
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", key, dest, written);
        Ok(written)
    }

    async fn is_accessible(&self, key: &str) -> bool {
        let url = self.object_url(key);
        match self.client.head(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_name_strips_package_prefix() {
        assert_eq!(archive_file_name("package/core-2.0.0.zip"), Some("core-2.0.0.zip"));
        assert_eq!(archive_file_name("loose.zip"), Some("loose.zip"));
        assert_eq!(archive_file_name("package/nested/addon.zip"), Some("addon.zip"));
        assert_eq!(archive_file_name("package/.."), None);
        assert_eq!(archive_file_name("package/"), None);
    }

    #[test]
    fn object_url_joins_without_duplicate_slashes() {
        let store = HttpObjectStore::new(Client::new(), "https://example.com/bucket/");
        assert_eq!(
            store.object_url("/package/core.zip"),
            "https://example.com/bucket/package/core.zip"
        );
    }

    #[test]
    fn progress_fraction_handles_unknown_and_empty_sizes() {
        let unknown = TransferProgress {
            bytes_downloaded: 10,
            total_bytes: None,
        };
        assert_eq!(unknown.fraction(), None);

        let empty = TransferProgress {
            bytes_downloaded: 0,
            total_bytes: Some(0),
        };
        assert_eq!(empty.fraction(), Some(1.0));

        let half = TransferProgress {
            bytes_downloaded: 50,
            total_bytes: Some(100),
        };
        assert_eq!(half.fraction(), Some(0.5));
    }
}
