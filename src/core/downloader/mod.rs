pub mod client;

pub use client::{ArchiveDownload, PackageDownloader, DEFAULT_CONCURRENCY};
