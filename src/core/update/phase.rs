use std::fmt;

use serde::Serialize;

use crate::core::packages::InstalledPackage;

/// Stage of the install pipeline. Phases run strictly in declaration order
/// and always end back at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    #[default]
    Idle,
    Preparing,
    Downloading,
    Extracting,
    Copying,
    Finalizing,
}

impl UpdatePhase {
    /// Slice of overall progress owned by this phase.
    pub fn progress_range(self) -> (f64, f64) {
        match self {
            UpdatePhase::Idle | UpdatePhase::Preparing => (0.0, 0.0),
            UpdatePhase::Downloading => (0.0, 0.5),
            UpdatePhase::Extracting => (0.5, 0.75),
            UpdatePhase::Copying => (0.75, 1.0),
            UpdatePhase::Finalizing => (1.0, 1.0),
        }
    }

    /// Map completion within this phase onto overall progress.
    pub fn scale(self, fraction: f64) -> f64 {
        let (start, end) = self.progress_range();
        start + (end - start) * fraction.clamp(0.0, 1.0)
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Preparing => "preparing",
            UpdatePhase::Downloading => "downloading",
            UpdatePhase::Extracting => "extracting",
            UpdatePhase::Copying => "copying",
            UpdatePhase::Finalizing => "finalizing",
        };
        f.write_str(label)
    }
}

/// Published on the updater's broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    PhaseChanged(UpdatePhase),
    /// Overall progress in `[0, 1]`, never decreasing within one run.
    Progress(f64),
    Completed {
        installed: Vec<InstalledPackage>,
    },
    Failed {
        phase: UpdatePhase,
        package: Option<String>,
        message: String,
    },
    /// The user's Ubermenu preset could not be backed up or restored.
    /// The update itself is unaffected.
    PresetPreservationFailed {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_split_progress_half_quarter_quarter() {
        assert_eq!(UpdatePhase::Downloading.scale(1.0), 0.5);
        assert_eq!(UpdatePhase::Extracting.scale(0.5), 0.625);
        assert_eq!(UpdatePhase::Copying.scale(2.0), 1.0);
        assert_eq!(UpdatePhase::Copying.scale(0.0), 0.75);
    }

    #[test]
    fn display_reads_as_gerund() {
        assert_eq!(UpdatePhase::Copying.to_string(), "copying");
        assert_eq!(UpdatePhase::Idle.to_string(), "idle");
    }
}
