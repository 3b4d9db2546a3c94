use std::path::PathBuf;
use thiserror::Error;

use crate::core::inject::InjectorError;
use crate::core::process::ProcessError;
use crate::core::update::UpdatePhase;

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Manifest / state ────────────────────────────────
    #[error("Failed to download package manifest: {0}")]
    ManifestDownload(Box<LauncherError>),

    #[error("Failed to parse package manifest: {0}")]
    ManifestParse(#[source] serde_json::Error),

    #[error("Failed to load installed package state from {path:?}: {reason}")]
    StateLoad { path: PathBuf, reason: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Invalid package id {0:?}: must be a single file name")]
    InvalidPackageId(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Update pipeline ─────────────────────────────────
    #[error("Invalid game executable path {0:?}")]
    InvalidGamePath(PathBuf),

    #[error("Update failed while {phase}{}: {source}", package_suffix(.package))]
    UpdateFailed {
        phase: UpdatePhase,
        package: Option<String>,
        source: Box<LauncherError>,
    },

    // ── Process / injection ─────────────────────────────
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Injector(#[from] InjectorError),

    #[error("Unable to locate game binary at {0:?}")]
    GameNotFound(PathBuf),

    #[error("Failed to launch game: {0}")]
    LaunchFailed(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Attach the pipeline phase (and optionally the package) that was running
    /// when this error surfaced. Already-wrapped errors are left untouched.
    pub fn in_phase(self, phase: UpdatePhase, package: Option<&str>) -> Self {
        match self {
            wrapped @ LauncherError::UpdateFailed { .. } => wrapped,
            other => LauncherError::UpdateFailed {
                phase,
                package: package.map(str::to_string),
                source: Box::new(other),
            },
        }
    }

    /// Package id carried by an update failure, if any.
    pub fn failed_package(&self) -> Option<&str> {
        match self {
            LauncherError::UpdateFailed { package, .. } => package.as_deref(),
            _ => None,
        }
    }
}

fn package_suffix(package: &Option<String>) -> String {
    match package {
        Some(id) => format!(" (package '{id}')"),
        None => String::new(),
    }
}

/// Wrap an `std::io::Error` with the path it occurred at.
pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LauncherError {
    let path = path.into();
    move |source| LauncherError::Io { path, source }
}
