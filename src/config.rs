//! Scene configuration. Loaded from `flyover.ron` at startup; any field left
//! out of the file keeps its default.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_3, TAU};
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::engine::ModelKind;
use crate::scene::{AirshipConfig, FlashConfig, OrbitParams};

pub const DEFAULT_CONFIG_FILE: &str = "flyover.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Logical pixels.
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub clear_color: [f64; 3],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Airship Flyover".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            clear_color: [0.1, 0.1, 0.1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Degrees of orbit per pixel of pointer motion.
    pub mouse_sensitivity: f32,
    /// Camera distance change per scroll line.
    pub zoom_speed: f32,
    pub invert_pitch: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self { mouse_sensitivity: 0.2, zoom_speed: 0.2, invert_pitch: false }
    }
}

/// One model on disk. Paths are relative to `AssetsConfig::root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAsset {
    pub mesh: PathBuf,
    pub texture: Option<PathBuf>,
    /// Uniform scale baked into the vertex data at load.
    pub scale: f32,
}

impl ModelAsset {
    fn new(mesh: &str, texture: &str, scale: f32) -> Self {
        Self { mesh: mesh.into(), texture: Some(texture.into()), scale }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: PathBuf,
    pub airship: ModelAsset,
    pub martian: ModelAsset,
    pub biplane: ModelAsset,
    pub balloon: ModelAsset,
    pub cloud: ModelAsset,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            airship: ModelAsset::new("models/zeppelin.obj", "models/zeppelin.png", 0.02),
            martian: ModelAsset::new("models/Martian.obj", "models/Martian.png", 0.1),
            biplane: ModelAsset::new("models/Biplane.obj", "models/Biplane.png", 0.08),
            balloon: ModelAsset::new("models/Balloon.obj", "models/Balloon.png", 0.05),
            cloud: ModelAsset::new("models/Kowalski.obj", "images/Kowalski.png", 0.1),
        }
    }
}

impl AssetsConfig {
    pub fn model(&self, kind: ModelKind) -> &ModelAsset {
        match kind {
            ModelKind::Martian => &self.martian,
            ModelKind::Biplane => &self.biplane,
            ModelKind::Balloon => &self.balloon,
            ModelKind::Cloud => &self.cloud,
        }
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquadConfig {
    pub count: usize,
    pub orbit: OrbitParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadsConfig {
    pub biplanes: SquadConfig,
    pub clouds: SquadConfig,
    pub balloons: SquadConfig,
}

impl Default for SquadsConfig {
    fn default() -> Self {
        Self {
            biplanes: SquadConfig {
                count: 5,
                orbit: OrbitParams {
                    radius: 4.0,
                    radius_jitter: 3.0,
                    base_speed: 0.3,
                    speed_min: 0.5,
                    speed_jitter: 2.0,
                    base_offset: FRAC_PI_2 / 5.0,
                    altitude: -2.5,
                    altitude_jitter: 2.0,
                    bob_jitter: 2.0,
                    pitch_bias: -FRAC_PI_3,
                    heading_offset: FRAC_PI_2,
                    ..Default::default()
                },
            },
            // High, wide and slow. Drawn blended after everything opaque.
            clouds: SquadConfig {
                count: 20,
                orbit: OrbitParams {
                    radius: 6.0,
                    radius_jitter: 15.0,
                    base_speed: 0.02,
                    speed_min: 0.5,
                    speed_jitter: 1.0,
                    phase_jitter: TAU,
                    altitude: 4.0,
                    altitude_jitter: 4.0,
                    roll_jitter: 1.0,
                    ..Default::default()
                },
            },
            balloons: SquadConfig {
                count: 4,
                orbit: OrbitParams {
                    radius: 9.0,
                    radius_jitter: 4.0,
                    base_speed: 0.05,
                    speed_min: 0.5,
                    speed_jitter: 1.0,
                    phase_jitter: TAU,
                    altitude: 1.5,
                    altitude_jitter: 2.0,
                    bob_jitter: 0.3,
                    heading_offset: FRAC_PI_2,
                    ..Default::default()
                },
            },
        }
    }
}

impl SquadsConfig {
    /// Squads in draw order: opaque first, the blended cloud layer last.
    pub fn in_draw_order(&self) -> [(ModelKind, &SquadConfig); 3] {
        [
            (ModelKind::Biplane, &self.biplanes),
            (ModelKind::Balloon, &self.balloons),
            (ModelKind::Cloud, &self.clouds),
        ]
    }
}

/// A static model placed once at scene construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropPlacement {
    pub position: Vec3,
    /// Radians about +Y.
    pub yaw: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub window: WindowConfig,
    pub controls: ControlsConfig,
    pub assets: AssetsConfig,
    pub airship: AirshipConfig,
    pub squads: SquadsConfig,
    pub martians: Vec<PropPlacement>,
    pub flash: FlashConfig,
    /// Seed for every per-entity jitter draw and flash roll.
    pub seed: u64,
    /// Upper bound on one frame's delta time, seconds.
    pub max_frame_delta: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            controls: ControlsConfig::default(),
            assets: AssetsConfig::default(),
            airship: AirshipConfig::default(),
            squads: SquadsConfig::default(),
            martians: vec![
                PropPlacement { position: Vec3::ZERO, yaw: 0.0 },
                PropPlacement { position: Vec3::new(6.0, 0.0, 6.0), yaw: -FRAC_PI_2 },
            ],
            flash: FlashConfig::default(),
            seed: 1917,
            max_frame_delta: 0.25,
        }
    }
}

impl SceneConfig {
    /// Parse RON, then replace values that would stall or panic the scene.
    pub fn from_ron_str(data: &str) -> Result<Self, ron::error::SpannedError> {
        let mut config: Self = ron::from_str(data)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.flash.sanitize();
        if !self.max_frame_delta.is_finite() || self.max_frame_delta <= 0.0 {
            log::warn!("max_frame_delta {} must be positive, using 0.25", self.max_frame_delta);
            self.max_frame_delta = 0.25;
        }
    }

    /// Load config from `path`. If the file is missing or invalid, returns the default config.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => match Self::from_ron_str(&data) {
                Ok(config) => {
                    log::info!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("invalid config at {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("no config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as pretty RON. Logs on error.
    pub fn save(&self, path: &Path) {
        match ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            Ok(s) => {
                if let Err(e) = std::fs::write(path, s) {
                    log::warn!("could not write config to {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("could not serialise config: {e}"),
        }
    }
}
