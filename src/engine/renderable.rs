// Instanced renderable: one geometry, one texture, one per-instance matrix
// buffer. Draws N copies of the model in a single draw call.
//
// The instance buffer is rewritten by set_instances() (or draw_single()) at
// most once per frame, always before the draw that reads it. The draw uses
// the instance count of the latest upload, so bytes left over from a larger
// earlier upload are never read.

use std::sync::Arc;

use glam::Mat4;

use super::backend::*;
use super::lighting::ShadingMode;
use super::mesh::{Geometry, InstanceRaw};
use super::texture::TextureRequest;

/// Texture state as seen by the draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureBinding {
    /// Still decoding; draws use the placeholder.
    Pending(TextureRequest),
    Ready(TextureHandle),
    /// Decode or upload failed; draws keep the placeholder.
    Failed,
    /// No texture configured.
    Untextured,
}

pub struct InstancedRenderable {
    label: String,
    program: ProgramHandle,
    geometry: Arc<Geometry>,
    vertex_buffer: BufferHandle,
    instance_buffer: BufferHandle,
    /// Capacity of instance_buffer in instances.
    instance_capacity: usize,
    /// Exactly `instance_count` matrices: the data of the latest upload.
    instances: Vec<InstanceRaw>,
    texture: TextureBinding,
}

impl InstancedRenderable {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        label: impl Into<String>,
        program: ProgramHandle,
        geometry: Arc<Geometry>,
        texture: TextureBinding,
    ) -> Result<Self, BackendError> {
        let vertex_buffer = backend.upload_buffer(BufferKind::Vertex, geometry.vertex_bytes())?;
        let identity = [InstanceRaw::from_matrix(&Mat4::IDENTITY)];
        let instance_buffer = backend.upload_buffer(BufferKind::Instance, bytemuck::cast_slice(&identity))?;
        Ok(Self {
            label: label.into(),
            program,
            geometry,
            vertex_buffer,
            instance_buffer,
            instance_capacity: 1,
            instances: Vec::new(),
            texture,
        })
    }

    /// Replace the per-instance transforms. The instance count becomes
    /// `transforms.len()`; the buffer grows (never shrinks) as needed.
    pub fn set_instances<B: GraphicsBackend>(&mut self, backend: &mut B, transforms: &[Mat4]) -> Result<(), BackendError> {
        self.instances.clear();
        self.instances.extend(transforms.iter().map(InstanceRaw::from_matrix));
        if self.instances.is_empty() {
            return Ok(());
        }

        let bytes: &[u8] = bytemuck::cast_slice(&self.instances);
        if self.instances.len() > self.instance_capacity {
            // Grow geometrically so a slowly growing squad doesn't realloc every frame.
            let capacity = self.instances.len().next_power_of_two();
            let mut init = vec![InstanceRaw::from_matrix(&Mat4::IDENTITY); capacity];
            init[..self.instances.len()].copy_from_slice(&self.instances);
            let grown = backend.upload_buffer(BufferKind::Instance, bytemuck::cast_slice(&init))?;
            backend.release_buffer(std::mem::replace(&mut self.instance_buffer, grown))?;
            self.instance_capacity = capacity;
            log::debug!("{}: instance buffer grown to {} instances", self.label, capacity);
        } else {
            backend.write_buffer(self.instance_buffer, bytes)?;
        }
        Ok(())
    }

    /// Draw every instance of the latest upload in one call. No-op when
    /// there are no instances.
    pub fn draw_instanced<B: GraphicsBackend>(&self, backend: &mut B, shading: ShadingMode, blend: BlendMode) -> Result<(), BackendError> {
        if self.instances.is_empty() {
            return Ok(());
        }
        backend.draw(&DrawCall {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            vertex_count: self.geometry.vertex_count(),
            instance_buffer: self.instance_buffer,
            instance_count: self.instances.len() as u32,
            texture: self.texture_handle(),
            shading,
            blend,
        })
    }

    /// Upload one transform and draw it: the instance_count = 1 path for
    /// uniquely posed actors.
    pub fn draw_single<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        transform: Mat4,
        shading: ShadingMode,
        blend: BlendMode,
    ) -> Result<(), BackendError> {
        self.set_instances(backend, &[transform])?;
        self.draw_instanced(backend, shading, blend)
    }

    /// Resolve a pending texture request. Ignored if `request` isn't ours.
    pub fn resolve_texture(&mut self, request: TextureRequest, outcome: Option<TextureHandle>) -> bool {
        if self.texture != TextureBinding::Pending(request) {
            return false;
        }
        self.texture = match outcome {
            Some(handle) => TextureBinding::Ready(handle),
            None => {
                log::warn!("{}: texture unavailable, keeping placeholder", self.label);
                TextureBinding::Failed
            }
        };
        true
    }

    fn texture_handle(&self) -> Option<TextureHandle> {
        match self.texture {
            TextureBinding::Ready(handle) => Some(handle),
            TextureBinding::Pending(_) | TextureBinding::Failed | TextureBinding::Untextured => None,
        }
    }

    pub fn label(&self) -> &str { &self.label }
    pub fn instance_count(&self) -> usize { self.instances.len() }
    pub fn instance_buffer(&self) -> BufferHandle { self.instance_buffer }
    pub fn texture(&self) -> TextureBinding { self.texture }
    pub fn geometry(&self) -> &Arc<Geometry> { &self.geometry }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mesh::{parse_obj, Geometry};
    use crate::engine::recording::{BackendCall, RecordingBackend};
    use glam::Vec3;

    fn triangle() -> Arc<Geometry> {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        Geometry::from_mesh("tri", &mesh, 1.0)
    }

    fn renderable(backend: &mut RecordingBackend, texture: TextureBinding) -> InstancedRenderable {
        let program = backend
            .compile_program(&ProgramSource { label: "test".into(), source: String::new() })
            .unwrap();
        InstancedRenderable::new(backend, "tri", program, triangle(), texture).unwrap()
    }

    fn translations(n: usize) -> Vec<Mat4> {
        (0..n).map(|i| Mat4::from_translation(Vec3::splat(i as f32))).collect()
    }

    #[test]
    fn upload_precedes_draw_and_count_matches() {
        let mut backend = RecordingBackend::new();
        let mut r = renderable(&mut backend, TextureBinding::Failed);
        backend.clear_calls();

        r.set_instances(&mut backend, &translations(1)).unwrap();
        r.draw_instanced(&mut backend, ShadingMode::BlendedPhong, BlendMode::Opaque).unwrap();

        let calls = backend.calls();
        assert!(matches!(calls[0], BackendCall::WriteBuffer { len: 64, .. }));
        match &calls[1] {
            BackendCall::Draw(d) => {
                assert_eq!(d.instance_count, 1);
                assert_eq!(d.vertex_count, 3);
                assert_eq!(d.texture, None);
            }
            other => panic!("expected draw, got {other:?}"),
        }
    }

    #[test]
    fn growing_then_shrinking_never_draws_stale_instances() {
        let mut backend = RecordingBackend::new();
        let mut r = renderable(&mut backend, TextureBinding::Failed);

        let initial = r.instance_buffer();
        r.set_instances(&mut backend, &translations(5)).unwrap();
        let grown = r.instance_buffer();
        let data = backend.buffer(grown).unwrap();
        assert!(data.len() >= 5 * 64);
        assert_eq!(backend.buffer(initial), None);
        assert!(backend.calls().contains(&BackendCall::ReleaseBuffer(initial)));

        r.set_instances(&mut backend, &translations(2)).unwrap();
        assert_eq!(r.instance_buffer(), grown);
        r.draw_instanced(&mut backend, ShadingMode::Toon, BlendMode::Opaque).unwrap();
        let draw = backend.draws().last().copied().unwrap();
        assert_eq!(draw.instance_count, 2);

        let floats: &[f32] = bytemuck::cast_slice(&backend.buffer(grown).unwrap()[..2 * 64]);
        // Column 3 of instance 1 holds its translation.
        assert_eq!(&floats[16 + 12..16 + 15], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_instance_set_skips_draw() {
        let mut backend = RecordingBackend::new();
        let mut r = renderable(&mut backend, TextureBinding::Failed);
        r.set_instances(&mut backend, &[]).unwrap();
        r.draw_instanced(&mut backend, ShadingMode::BlendedPhong, BlendMode::Blended).unwrap();
        assert_eq!(backend.draws().count(), 0);
    }

    #[test]
    fn pending_texture_draws_placeholder_until_resolved() {
        let mut backend = RecordingBackend::new();
        let request = TextureRequest(7);
        let mut r = renderable(&mut backend, TextureBinding::Pending(request));

        r.draw_single(&mut backend, Mat4::IDENTITY, ShadingMode::BlendedPhong, BlendMode::Opaque).unwrap();
        assert_eq!(backend.draws().last().unwrap().texture, None);

        let handle = backend
            .create_texture(&TextureImage { label: "tex".into(), width: 1, height: 1, rgba: vec![255; 4] })
            .unwrap();
        assert!(!r.resolve_texture(TextureRequest(8), Some(handle)));
        assert!(r.resolve_texture(request, Some(handle)));
        r.draw_single(&mut backend, Mat4::IDENTITY, ShadingMode::BlendedPhong, BlendMode::Opaque).unwrap();
        assert_eq!(backend.draws().last().unwrap().texture, Some(handle));
    }

    #[test]
    fn failed_texture_keeps_placeholder() {
        let mut backend = RecordingBackend::new();
        let request = TextureRequest(1);
        let mut r = renderable(&mut backend, TextureBinding::Pending(request));
        assert!(r.resolve_texture(request, None));
        assert_eq!(r.texture(), TextureBinding::Failed);
    }
}
