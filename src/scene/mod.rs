// Flyover content: the player airship, orbiting squads, artillery flashes
// and the scene that ties them to the engine.

pub mod airship;
pub mod assets;
pub mod flash;
pub mod flyover;
pub mod scheduler;
pub mod squad;

pub use airship::{Airship, AirshipConfig, wrap_angle};
pub use assets::{AssetError, ModelSource, SceneAssets};
pub use flash::{FlashConfig, FlashKind, FlashLook};
pub use flyover::FlyoverScene;
pub use squad::{OrbitMotion, OrbitParams, OrbitSeed, orbit_system, spawn_squad};
