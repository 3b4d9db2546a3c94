pub mod task;

pub use task::launch_game;
