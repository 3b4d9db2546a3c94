pub mod extract;
pub mod orchestrator;
pub mod phase;
pub mod routing;
pub mod ubermenu;

pub use extract::extract_archive;
pub use orchestrator::{game_base_dir, UpdateSettings, Updater, WORKING_DIR_NAME};
pub use phase::{UpdateEvent, UpdatePhase};
pub use routing::{route_destination, RouteRoots, CONFIG_PREFIX, GAME_DIR_PREFIX};
pub use ubermenu::UbermenuPreset;
