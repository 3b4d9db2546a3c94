pub mod locator;
pub mod target;
pub mod tracker;

pub use locator::{FoundProcess, ProcessError, ProcessLocator, SystemProcessLocator};
pub use target::{ProcessTarget, COMMAND_LINE_CASE_SENSITIVE};
pub use tracker::{
    ProcessTargetTracker, TrackerEvent, TrackerHandle, TrackerState, DEFAULT_POLL_INTERVAL,
};
