// ─── TribesLauncher Core ───
// Package sync and game-process injection for TAMods.
//
// Architecture:
//   core/
//     remote/       Object store holding the manifest and package archives
//     packages/     Manifest model, install state file, catalog + update sets
//     downloader/   Concurrent archive downloads with batch progress
//     update/       Single-flight install pipeline, routing, Ubermenu preset
//     process/      Process targets, locator, polling tracker
//     inject/       Remote-thread module injection behind a backend trait
//     launch/       Game process spawner
//     state/        Settings + shared application state

pub mod downloader;
pub mod error;
pub mod http;
pub mod inject;
pub mod launch;
pub mod packages;
pub mod process;
pub mod remote;
pub mod state;
pub mod update;
