// Mesh loading for scene construction.
//
// Meshes are read and parsed up front: a missing or malformed model is fatal
// and reported before the scene exists. Textures are not loaded here; they
// stream in through the TextureLoader after the scene is running.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{AssetsConfig, ModelAsset};
use crate::engine::{BackendError, MeshData, MeshError, ModelKind, parse_obj};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Mesh { path: PathBuf, source: MeshError },
    #[error("no {} model supplied", .0.name())]
    MissingModel(ModelKind),
    #[error("shader program rejected: {0}")]
    Shader(#[source] BackendError),
    #[error("backend failure during scene construction: {0}")]
    Backend(#[from] BackendError),
}

/// One parsed model plus what the renderable needs to finish it.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub mesh: MeshData,
    pub scale: f32,
    /// Absolute (root-joined) texture path, if any.
    pub texture: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SceneAssets {
    pub airship: ModelSource,
    pub models: HashMap<ModelKind, ModelSource>,
}

impl SceneAssets {
    /// Read and parse every configured mesh.
    pub fn load(config: &AssetsConfig) -> Result<Self, AssetError> {
        let airship = load_model(config, &config.airship)?;
        let mut models = HashMap::new();
        for kind in ModelKind::ALL {
            models.insert(kind, load_model(config, config.model(kind))?);
        }
        Ok(Self { airship, models })
    }

    /// Every model shares `mesh`, unscaled and untextured.
    pub fn uniform(mesh: MeshData) -> Self {
        let source = ModelSource { mesh, scale: 1.0, texture: None };
        let models = ModelKind::ALL.iter().map(|&kind| (kind, source.clone())).collect();
        Self { airship: source, models }
    }
}

fn load_model(config: &AssetsConfig, asset: &ModelAsset) -> Result<ModelSource, AssetError> {
    let path = config.resolve(&asset.mesh);
    let text = std::fs::read_to_string(&path).map_err(|source| AssetError::Io { path: path.clone(), source })?;
    let mesh = parse_obj(&text).map_err(|source| AssetError::Mesh { path: path.clone(), source })?;
    log::info!("loaded {} ({} vertices)", path.display(), mesh.vertex_count());
    Ok(ModelSource {
        mesh,
        scale: asset.scale,
        texture: asset.texture.as_ref().map(|t| config.resolve(t)),
    })
}
