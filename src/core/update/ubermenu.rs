// ─── Ubermenu Preset ───
// Keeps a user's customised Ubermenu preset config alive across updates,
// and can opt a config into the preset.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{io_at, LauncherResult};

pub const PRESET_REQUIRE_LINE: &str = r#"require("presets/ubermenu/preset")"#;
const PRESET_REQUIRE_LINE_SINGLE_QUOTED: &str = "require('presets/ubermenu/preset')";

pub const BACKUP_FILE_NAME: &str = "ubermenu_config_backup.lua";

#[derive(Debug, Clone)]
pub struct UbermenuPreset {
    config_dir: PathBuf,
    local_root: PathBuf,
}

impl UbermenuPreset {
    pub fn new(config_dir: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            local_root: local_root.into(),
        }
    }

    /// The user's main TAMods config.
    pub fn config_lua(&self) -> PathBuf {
        self.config_dir.join("config.lua")
    }

    /// The preset's own config, which packages ship a stock copy of.
    pub fn preset_config(&self) -> PathBuf {
        self.config_dir
            .join("presets")
            .join("ubermenu")
            .join("config")
            .join("config.lua")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.local_root.join(BACKUP_FILE_NAME)
    }

    /// Whether `config.lua` requires the preset. A missing config does not.
    pub async fn uses_preset(&self) -> LauncherResult<bool> {
        let path = self.config_lua();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents.lines().any(is_require_line)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_at(path)(e)),
        }
    }

    /// Copy the preset config aside. Returns `false` when there is nothing
    /// to back up.
    pub async fn backup(&self) -> LauncherResult<bool> {
        let source = self.preset_config();
        if !source.is_file() {
            debug!("No Ubermenu preset config at {:?}", source);
            return Ok(false);
        }
        copy_file(&source, &self.backup_path()).await?;
        info!("Backed up Ubermenu preset config");
        Ok(true)
    }

    /// Put a previous backup back in place and discard it. Returns `false`
    /// when no backup exists.
    pub async fn restore(&self) -> LauncherResult<bool> {
        let backup = self.backup_path();
        if !backup.is_file() {
            return Ok(false);
        }
        copy_file(&backup, &self.preset_config()).await?;
        tokio::fs::remove_file(&backup).await.map_err(io_at(&backup))?;
        info!("Restored Ubermenu preset config");
        Ok(true)
    }

    /// Opt `config.lua` into the preset. Returns `false` if it already was.
    pub async fn setup(&self) -> LauncherResult<bool> {
        if self.uses_preset().await? {
            return Ok(false);
        }

        let path = self.config_lua();
        let mut contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_at(path)(e)),
        };
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push('\n');
        contents.push_str(PRESET_REQUIRE_LINE);
        contents.push('\n');

        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .map_err(io_at(&self.config_dir))?;
        tokio::fs::write(&path, contents).await.map_err(io_at(&path))?;
        info!("Enabled Ubermenu preset in {:?}", path);
        Ok(true)
    }
}

fn is_require_line(line: &str) -> bool {
    let line = line.trim();
    line == PRESET_REQUIRE_LINE || line == PRESET_REQUIRE_LINE_SINGLE_QUOTED
}

async fn copy_file(source: &Path, dest: &Path) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_at(parent))?;
    }
    tokio::fs::copy(source, dest).await.map_err(io_at(dest))?;
    Ok(())
}
