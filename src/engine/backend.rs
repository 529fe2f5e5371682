// Graphics backend contract consumed by the renderables and the frame loop.
//
// The scene never touches wgpu directly: it compiles programs, uploads
// buffers, publishes one uniform snapshot per frame and issues draw calls
// through this trait. `WgpuBackend` drives the GPU, `RecordingBackend`
// records calls for headless runs.
//
// Attribute binding is static: every program consumes `GpuVertex` at
// locations 0..2 and `InstanceRaw` at locations 3..6.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use super::lighting::{LightingUniform, ShadingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("program {label:?} failed to compile: {message}")]
    Compile { label: String, message: String },
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("write of {len} bytes overflows buffer {buffer:?} ({capacity} bytes)")]
    BufferOverflow { buffer: BufferHandle, len: usize, capacity: usize },
    #[error("texture {label:?}: {len} bytes of pixel data for {width}x{height}")]
    TextureSize { label: String, width: u32, height: u32, len: usize },
    #[error("surface error: {0}")]
    Surface(String),
    #[error("graphics initialisation failed: {0}")]
    Init(String),
}

/// Shader source handed to the backend as an opaque asset.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub label: String,
    /// Single-module source containing `vs_main` and `fs_main`.
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Per-vertex attributes, written once.
    Vertex,
    /// Per-instance matrices, rewritten every frame the owner draws.
    Instance,
}

/// How a draw composites with what is already in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Depth-tested, depth-writing, no blending.
    Opaque,
    /// Depth-tested, depth writes disabled, premultiplied alpha blending.
    /// Must be drawn after every opaque renderable of the frame.
    Blended,
}

/// Decoded RGBA8 pixels, alpha already premultiplied.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// Pixel data must hold exactly `width * height` RGBA8 texels.
    pub fn validate(&self) -> Result<(), BackendError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.rgba.len() != expected {
            return Err(BackendError::TextureSize {
                label: self.label.clone(),
                width: self.width,
                height: self.height,
                len: self.rgba.len(),
            });
        }
        Ok(())
    }
}

/// Camera part of the per-frame uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// xyz = eye position, w unused
    pub view_position: [f32; 4],
}

/// Everything every draw of one frame reads: camera plus the scene-global lights.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub camera: CameraUniform,
    pub lighting: LightingUniform,
}

/// One (possibly instanced) draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub vertex_buffer: BufferHandle,
    pub vertex_count: u32,
    pub instance_buffer: BufferHandle,
    pub instance_count: u32,
    /// `None` draws with the backend's placeholder texture.
    pub texture: Option<TextureHandle>,
    pub shading: ShadingMode,
    pub blend: BlendMode,
}

pub trait GraphicsBackend {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError>;

    /// Allocate a buffer initialised with `data`. Its capacity is `data.len()`.
    fn upload_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferHandle, BackendError>;

    /// Overwrite the start of an existing buffer. Write each buffer at most
    /// once per frame: draws of that frame read the latest contents.
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), BackendError>;

    /// Free a buffer. The handle is invalid afterwards and may be handed out
    /// again by a later upload.
    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError>;

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError>;

    /// Publish the uniform snapshot shared by every draw until the next call.
    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms);

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError>;

    fn resize(&mut self, width: u32, height: u32);

    fn begin_frame(&mut self) -> Result<(), BackendError>;

    fn end_frame(&mut self) -> Result<(), BackendError>;
}
