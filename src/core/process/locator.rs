use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use thiserror::Error;

use super::target::ProcessTarget;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// Transient failure listing or querying processes; the next poll retries.
    #[error("process query failed: {0}")]
    Query(String),
    /// The process table cannot be read at all; polling must stop.
    #[error("process table unavailable: {0}")]
    Unavailable(String),
}

impl ProcessError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProcessError::Query(_))
    }
}

/// Identity of a live process as seen in one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundProcess {
    pub pid: u32,
    pub name: String,
    pub command_line: String,
}

/// Resolves `ProcessTarget`s against the live process list.
///
/// Implementors only provide a snapshot; matching is shared. With several
/// matches for a `ByName` or `ByCommandLine` target the first one in snapshot
/// order wins, and snapshot order is whatever the OS hands back.
pub trait ProcessLocator: Send {
    fn snapshot(&mut self) -> Result<Vec<FoundProcess>, ProcessError>;

    fn count(&mut self, target: &ProcessTarget) -> Result<usize, ProcessError> {
        Ok(self
            .snapshot()?
            .iter()
            .filter(|p| target.matches(p.pid, &p.name, &p.command_line))
            .count())
    }

    fn exists(&mut self, target: &ProcessTarget) -> Result<bool, ProcessError> {
        Ok(self.count(target)? > 0)
    }

    fn resolve(&mut self, target: &ProcessTarget) -> Result<Option<FoundProcess>, ProcessError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .find(|p| target.matches(p.pid, &p.name, &p.command_line)))
    }
}

/// `ProcessLocator` over the OS process table via `sysinfo`.
pub struct SystemProcessLocator {
    system: System,
}

impl SystemProcessLocator {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemProcessLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLocator for SystemProcessLocator {
    fn snapshot(&mut self) -> Result<Vec<FoundProcess>, ProcessError> {
        // Process table only. Command lines are read once per process.
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            ProcessRefreshKind::new().with_cmd(UpdateKind::OnlyIfNotSet),
        );
        let processes = self
            .system
            .processes()
            .values()
            .map(|process| FoundProcess {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().to_string(),
                command_line: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect::<Vec<_>>();

        if processes.is_empty() {
            // Our own process is always listed, so an empty table means the
            // platform gave us nothing to work with.
            return Err(ProcessError::Query("process list is empty".into()));
        }
        Ok(processes)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeProcessTable;
    use super::*;

    #[test]
    fn resolve_returns_first_match_in_snapshot_order() {
        let table = FakeProcessTable::default();
        table.spawn(10, "other");
        table.spawn(20, "game");
        table.spawn(30, "game");
        let mut locator = table.locator();

        let target = ProcessTarget::ByName("game".into());
        assert_eq!(locator.count(&target).unwrap(), 2);
        assert_eq!(locator.resolve(&target).unwrap().unwrap().pid, 20);
        assert!(!locator.exists(&ProcessTarget::ById(99)).unwrap());
    }

    #[test]
    fn system_snapshot_lists_the_current_process() {
        let own = std::process::id();
        let snapshot = SystemProcessLocator::new().snapshot().unwrap();
        assert!(snapshot.iter().any(|p| p.pid == own));
        assert!(SystemProcessLocator::new()
            .exists(&ProcessTarget::ById(own))
            .unwrap());
    }

    #[test]
    fn recoverability_is_classified() {
        assert!(ProcessError::Query("x".into()).is_recoverable());
        assert!(!ProcessError::Unavailable("x".into()).is_recoverable());
    }

    #[test]
    fn system_locator_sees_current_process() {
        let mut locator = SystemProcessLocator::new();
        let own = ProcessTarget::ById(std::process::id());
        assert!(locator.exists(&own).unwrap());
    }
}
