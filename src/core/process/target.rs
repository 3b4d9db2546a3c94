use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether command-line matching respects case.
pub const COMMAND_LINE_CASE_SENSITIVE: bool = false;

/// Logical description of the process to watch or inject into.
///
/// A pure value: it is matched against the live process list every time it
/// is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ProcessTarget {
    /// Image name, compared case-insensitively and without a trailing `.exe`.
    ByName(String),
    ById(u32),
    /// Substring of the full command line.
    ByCommandLine(String),
}

impl ProcessTarget {
    /// Whether a process with the given identity satisfies this target.
    pub fn matches(&self, pid: u32, image_name: &str, command_line: &str) -> bool {
        match self {
            ProcessTarget::ById(id) => *id == pid,
            ProcessTarget::ByName(name) => {
                image_stem(image_name).eq_ignore_ascii_case(image_stem(name))
            }
            ProcessTarget::ByCommandLine(needle) => {
                if COMMAND_LINE_CASE_SENSITIVE {
                    command_line.contains(needle.as_str())
                } else {
                    command_line
                        .to_lowercase()
                        .contains(&needle.to_lowercase())
                }
            }
        }
    }
}

impl fmt::Display for ProcessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessTarget::ByName(name) => write!(f, "process named '{name}'"),
            ProcessTarget::ById(pid) => write!(f, "process id {pid}"),
            ProcessTarget::ByCommandLine(s) => write!(f, "process with command line containing '{s}'"),
        }
    }
}

/// Image name without a trailing `.exe` (Windows reports it, callers usually omit it).
fn image_stem(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}
