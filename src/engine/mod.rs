// Engine module - reusable rendering and animation machinery.
// Nothing in here knows about airships; the flyover content lives in crate::scene.

pub mod backend;
pub mod camera;
pub mod components;
pub mod debug_overlay;
pub mod frame;
pub mod input;
pub mod lighting;
pub mod mesh;
pub mod recording;
pub mod renderable;
pub mod texture;
pub mod timer;
pub mod wgpu_backend;

// Re-export commonly used items
pub use backend::*;
pub use camera::*;
pub use components::*;
pub use frame::*;
pub use input::InputState;
pub use lighting::*;
pub use mesh::*;
pub use recording::RecordingBackend;
pub use renderable::*;
pub use texture::*;
pub use timer::IntervalTimer;
pub use wgpu_backend::WgpuBackend;
