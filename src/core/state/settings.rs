use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{io_at, LauncherError, LauncherResult};
use crate::core::process::ProcessTarget;
use crate::core::remote::DEFAULT_BASE_URL;

pub const SETTINGS_FILE: &str = "launcher_settings.json";

const DEFAULT_GAME_PATH: &str =
    r"C:\Program Files (x86)\Steam\steamapps\common\Tribes\Binaries\Win32\TribesAscend.exe";
const DEFAULT_PROCESS_NAME: &str = "tribesascend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DllChannel {
    #[default]
    Release,
    Beta,
    Edge,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectMode {
    #[default]
    Manual,
    /// Inject once the game has been up for the auto-inject delay.
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessDetectionMode {
    #[default]
    ProcessName,
    /// Only the process this launcher started.
    ProcessId,
    CommandLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionSettings {
    pub channel: DllChannel,
    pub custom_dll_path: Option<PathBuf>,
    pub mode: InjectMode,
    pub auto_inject_delay_secs: u64,
    pub detection: ProcessDetectionMode,
    /// Image name or command-line fragment, depending on `detection`.
    pub running_process_name: String,
    pub timeout_secs: u64,
}

impl Default for InjectionSettings {
    fn default() -> Self {
        Self {
            channel: DllChannel::Release,
            custom_dll_path: None,
            mode: InjectMode::Manual,
            auto_inject_delay_secs: 20,
            detection: ProcessDetectionMode::ProcessName,
            running_process_name: DEFAULT_PROCESS_NAME.to_string(),
            timeout_secs: 10,
        }
    }
}

impl InjectionSettings {
    /// DLL to inject for the selected channel. Channel DLLs live in the
    /// launcher's local root.
    pub fn module_path(&self, local_root: &Path) -> LauncherResult<PathBuf> {
        let file_name = match self.channel {
            DllChannel::Release => "tamods.dll",
            DllChannel::Beta => "tamods-beta.dll",
            DllChannel::Edge => "tamods-edge.dll",
            DllChannel::Custom => {
                return self
                    .custom_dll_path
                    .clone()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| {
                        LauncherError::Other("Custom DLL channel selected without a path".into())
                    })
            }
        };
        Ok(local_root.join(file_name))
    }

    /// What the tracker should watch. In `ProcessId` mode this needs the pid
    /// of a game this launcher started.
    pub fn process_target(&self, launched_pid: Option<u32>) -> Option<ProcessTarget> {
        match self.detection {
            ProcessDetectionMode::ProcessName => {
                Some(ProcessTarget::ByName(self.running_process_name.clone()))
            }
            ProcessDetectionMode::CommandLine => {
                Some(ProcessTarget::ByCommandLine(self.running_process_name.clone()))
            }
            ProcessDetectionMode::ProcessId => launched_pid.map(ProcessTarget::ById),
        }
    }

    pub fn auto_inject_delay(&self) -> Duration {
        Duration::from_secs(self.auto_inject_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub game_path: PathBuf,
    pub custom_arguments: String,
    pub login_server_host: String,
    pub update_url: String,
    pub config_dir: PathBuf,
    pub download_concurrency: usize,
    /// Debug switch: updates log where files would go instead of copying.
    pub disable_copy_on_update: bool,
    pub poll_interval_ms: u64,
    pub injection: InjectionSettings,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            game_path: PathBuf::from(DEFAULT_GAME_PATH),
            custom_arguments: String::new(),
            login_server_host: "127.0.0.1".to_string(),
            update_url: DEFAULT_BASE_URL.to_string(),
            config_dir: default_config_dir(),
            download_concurrency: crate::core::downloader::DEFAULT_CONCURRENCY,
            disable_copy_on_update: false,
            poll_interval_ms: 1000,
            injection: InjectionSettings::default(),
        }
    }
}

impl LauncherSettings {
    /// Read settings from `path`. A missing or unreadable file yields the
    /// defaults.
    pub fn load_or_default(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_at(path))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }
}

/// `Documents/My Games/Tribes Ascend/TribesGame/config`.
pub fn default_config_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("My Games")
        .join("Tribes Ascend")
        .join("TribesGame")
        .join("config")
}
