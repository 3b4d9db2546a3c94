// ─── Launch Task ───
// Starts the game client pointed at a login server.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

/// Start the game and return its pid without waiting for it.
///
/// `extra_args` is split on whitespace and appended after `-hostx=<host>`.
pub fn launch_game(binary: &Path, login_host: &str, extra_args: &str) -> LauncherResult<u32> {
    if !binary.is_file() {
        return Err(LauncherError::GameNotFound(binary.to_path_buf()));
    }

    let mut cmd = build_command(binary, login_host, extra_args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    info!("Launching game: {:?}", binary);
    debug!("Command (copy/paste): {}", format_command_for_logs(&cmd));

    let child = cmd
        .spawn()
        .map_err(|e| LauncherError::LaunchFailed(e.to_string()))?;
    Ok(child.id())
}

fn build_command(binary: &Path, login_host: &str, extra_args: &str) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg(format!("-hostx={}", login_host.trim()));
    cmd.args(extra_args.split_whitespace());
    if let Some(dir) = binary.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }
    cmd
}

fn format_command_for_logs(cmd: &Command) -> String {
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
