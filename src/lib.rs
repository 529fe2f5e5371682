// Airship flyover: an instanced wgpu scene with an orbit-follow camera,
// procedurally orbiting squads and scene-global lighting.

pub mod config;
pub mod engine;
pub mod scene;

/// WGSL source of the scene program (`vs_main` / `fs_main`).
pub const SCENE_SHADER: &str = include_str!("shader_scene.wgsl");
