// ─── Destination Routing ───
// Files inside a package land in one of three roots depending on their
// first path segment.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{io_at, LauncherResult};

/// Leading segment redirecting a file into the game config directory.
pub const CONFIG_PREFIX: &str = "!CONFIG";
/// Leading segment redirecting a file into the game install directory.
pub const GAME_DIR_PREFIX: &str = "!TRIBESDIR";

#[derive(Debug, Clone)]
pub struct RouteRoots {
    pub local_root: PathBuf,
    pub config_dir: PathBuf,
    pub game_base_dir: PathBuf,
}

/// Destination of `relative` (a path inside an extracted package).
pub fn route_destination(relative: &Path, roots: &RouteRoots) -> PathBuf {
    let mut components = relative.components();
    let (root, rest) = match components.next() {
        Some(Component::Normal(first)) if first == CONFIG_PREFIX => {
            (&roots.config_dir, components.as_path())
        }
        Some(Component::Normal(first)) if first == GAME_DIR_PREFIX => {
            (&roots.game_base_dir, components.as_path())
        }
        _ => (&roots.local_root, relative),
    };
    root.join(rest)
}

/// Copy every file under `package_dir` to its routed destination,
/// overwriting whatever is there. Returns the number of files handled.
///
/// With `dry_run` the destinations are only logged.
pub fn copy_package_tree(
    package_dir: &Path,
    roots: &RouteRoots,
    dry_run: bool,
) -> LauncherResult<usize> {
    let mut files = Vec::new();
    collect_files(package_dir, &mut files)?;

    for source in &files {
        let relative = source.strip_prefix(package_dir).unwrap_or(source);
        let dest = route_destination(relative, roots);

        if dry_run {
            info!("Copy disabled, would write {:?} -> {:?}", source, dest);
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        if dest.exists() {
            make_writable(&dest)?;
        }
        std::fs::copy(source, &dest).map_err(io_at(&dest))?;
        debug!("Installed {:?}", dest);
    }

    Ok(files.len())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> LauncherResult<()> {
    let entries = std::fs::read_dir(dir).map_err(io_at(dir))?;
    for entry in entries {
        let entry = entry.map_err(io_at(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_at(&path))?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Clear the read-only bit so an existing file can be overwritten.
fn make_writable(path: &Path) -> LauncherResult<()> {
    let mut permissions = std::fs::metadata(path).map_err(io_at(path))?.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }

    std::fs::set_permissions(path, permissions).map_err(io_at(path))
}
