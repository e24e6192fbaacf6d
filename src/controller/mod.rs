// CONTROLLER: Lifecycle, frame scheduling, and the entities it drives
pub mod camera_controller;
pub mod ghost;
pub mod input;
pub mod level;
pub mod player;
pub mod runtime;
pub mod scheduler;

pub use camera_controller::CameraController;
pub use ghost::{Ghost, GhostSettings, GhostState, WanderingGhost};
pub use input::{InputEvent, InputProcessor, InputState, KeyBindings, SharedInput};
pub use level::{HauntedHouseLevel, HouseLayout, Level, GHOST_SPAWN_MARKER};
pub use player::{FirstPersonPlayer, Locatable, Player, PlayerSettings, PlayerState};
pub use runtime::{LoopState, Platform, RuntimeLoop};
pub use scheduler::{FrameCallback, FrameControl, FrameScheduler, PumpScheduler};
