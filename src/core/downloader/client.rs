use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::remote::{archive_file_name, RemoteObjectStore, TransferProgress};
use crate::core::update::UpdatePhase;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// One package archive to fetch.
#[derive(Debug, Clone)]
pub struct ArchiveDownload {
    pub package_id: String,
    pub object_key: String,
    pub dest: PathBuf,
}

impl ArchiveDownload {
    /// Target path `<dir>/<package id>/<archive name>`. Keys sharing a
    /// basename stay apart since package ids are unique.
    pub fn into_dir(package_id: &str, object_key: &str, dir: &std::path::Path) -> Self {
        let file_name = archive_file_name(object_key)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{package_id}.zip"));
        Self {
            package_id: package_id.to_string(),
            object_key: object_key.to_string(),
            dest: dir.join(package_id).join(file_name),
        }
    }
}

/// Concurrent archive downloader on top of a `RemoteObjectStore`.
pub struct PackageDownloader {
    store: Arc<dyn RemoteObjectStore>,
    /// Maximum number of parallel transfers.
    concurrency: usize,
}

impl PackageDownloader {
    pub fn new(store: Arc<dyn RemoteObjectStore>) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download every entry with at most `concurrency` transfers in flight.
    ///
    /// `on_progress` receives the mean completion of the batch in `[0, 1]`;
    /// entries with an unknown size count as zero until they finish. The
    /// first failure aborts the remaining transfers and is returned tagged
    /// with the package id.
    pub async fn download_batch(
        &self,
        entries: Vec<ArchiveDownload>,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> LauncherResult<Vec<ArchiveDownload>> {
        info!(
            "Starting batch download: {} archives, concurrency={}",
            entries.len(),
            self.concurrency
        );
        if entries.is_empty() {
            on_progress(1.0);
            return Ok(entries);
        }

        let fractions = Mutex::new(vec![0.0f64; entries.len()]);
        let report = |slot: usize, fraction: f64| {
            if let Ok(mut fractions) = fractions.lock() {
                fractions[slot] = fraction;
                let total: f64 = fractions.iter().sum();
                on_progress(total / fractions.len() as f64);
            }
        };

        stream::iter(entries.into_iter().enumerate())
            .map(|(slot, entry)| {
                let report = &report;
                async move {
                    let on_transfer = move |progress: TransferProgress| {
                        if let Some(fraction) = progress.fraction() {
                            report(slot, fraction);
                        }
                    };
                    self.store
                        .download_to_file(&entry.object_key, &entry.dest, &on_transfer)
                        .await
                        .map_err(|e| e.in_phase(UpdatePhase::Downloading, Some(&entry.package_id)))?;
                    report(slot, 1.0);
                    debug!("Fetched {} -> {:?}", entry.object_key, entry.dest);
                    Ok::<_, LauncherError>(entry)
                }
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remote::testing::MemoryObjectStore;

    #[tokio::test]
    async fn batch_downloads_every_archive_and_finishes_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default()
            .with_object("package/core.zip", vec![1u8; 64])
            .with_object("package/hud.zip", vec![2u8; 16]);
        let downloader = PackageDownloader::new(Arc::new(store)).with_concurrency(2);

        let seen = Mutex::new(Vec::new());
        let on_progress = |p: f64| seen.lock().unwrap().push(p);
        let done = downloader
            .download_batch(
                vec![
                    ArchiveDownload::into_dir("core", "package/core.zip", dir.path()),
                    ArchiveDownload::into_dir("hud", "package/hud.zip", dir.path()),
                ],
                &on_progress,
            )
            .await
            .unwrap();

        assert_eq!(done.len(), 2);
        assert!(dir.path().join("core/core.zip").is_file());
        assert!(dir.path().join("hud/hud.zip").is_file());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[tokio::test]
    async fn archives_sharing_a_basename_are_staged_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryObjectStore::default()
            .with_object("package/a/x.zip", vec![1u8; 32])
            .with_object("package/b/x.zip", vec![2u8; 8]);
        let downloader = PackageDownloader::new(Arc::new(store));

        let done = downloader
            .download_batch(
                vec![
                    ArchiveDownload::into_dir("alpha", "package/a/x.zip", dir.path()),
                    ArchiveDownload::into_dir("beta", "package/b/x.zip", dir.path()),
                ],
                &|_: f64| {},
            )
            .await
            .unwrap();

        assert_ne!(done[0].dest, done[1].dest);
        assert_eq!(std::fs::read(dir.path().join("alpha/x.zip")).unwrap(), vec![1u8; 32]);
        assert_eq!(std::fs::read(dir.path().join("beta/x.zip")).unwrap(), vec![2u8; 8]);
    }

    #[tokio::test]
    async fn missing_archive_fails_with_package_id() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = PackageDownloader::new(Arc::new(MemoryObjectStore::default()));

        let err = downloader
            .download_batch(
                vec![ArchiveDownload::into_dir("core", "package/core.zip", dir.path())],
                &|_: f64| {},
            )
            .await
            .unwrap_err();

        assert_eq!(err.failed_package(), Some("core"));
        assert!(matches!(
            err,
            LauncherError::UpdateFailed {
                phase: UpdatePhase::Downloading,
                ..
            }
        ));
    }
}
