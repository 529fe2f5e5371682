// Headless backend: keeps buffer contents in memory and records every call.
// Tests use the call log to check draw ordering; `--headless` runs turn it off.

use std::collections::HashMap;

use super::backend::*;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CompileProgram(ProgramHandle),
    UploadBuffer { buffer: BufferHandle, kind: BufferKind, len: usize },
    WriteBuffer { buffer: BufferHandle, len: usize },
    ReleaseBuffer(BufferHandle),
    CreateTexture(TextureHandle),
    SetFrameUniforms,
    Draw(DrawCall),
    Resize { width: u32, height: u32 },
    BeginFrame,
    EndFrame,
}

#[derive(Default)]
pub struct RecordingBackend {
    recording: bool,
    calls: Vec<BackendCall>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    next_buffer: u32,
    programs: u32,
    textures: u32,
    uniforms: Option<FrameUniforms>,
    fail_compile: Option<String>,
    frames: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self { recording: true, ..Self::default() }
    }

    /// Same bookkeeping as `new()` but keeps no call log, so memory stays
    /// flat over long runs.
    pub fn unrecorded() -> Self {
        Self::default()
    }

    /// Every compile_program call fails with `message`.
    pub fn failing_compile(message: impl Into<String>) -> Self {
        Self { fail_compile: Some(message.into()), ..Self::new() }
    }

    fn record(&mut self, call: BackendCall) {
        if self.recording {
            self.calls.push(call);
        }
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter().filter_map(|c| match c {
            BackendCall::Draw(d) => Some(d),
            _ => None,
        })
    }

    /// Current contents of a buffer.
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn last_uniforms(&self) -> Option<&FrameUniforms> {
        self.uniforms.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }
}

impl GraphicsBackend for RecordingBackend {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, BackendError> {
        if let Some(message) = &self.fail_compile {
            return Err(BackendError::Compile { label: source.label.clone(), message: message.clone() });
        }
        let handle = ProgramHandle(self.programs);
        self.programs += 1;
        self.record(BackendCall::CompileProgram(handle));
        Ok(handle)
    }

    fn upload_buffer(&mut self, kind: BufferKind, data: &[u8]) -> Result<BufferHandle, BackendError> {
        let buffer = BufferHandle(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(buffer, data.to_vec());
        self.record(BackendCall::UploadBuffer { buffer, kind, len: data.len() });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<(), BackendError> {
        let contents = self.buffers.get_mut(&buffer).ok_or(BackendError::UnknownBuffer(buffer))?;
        if data.len() > contents.len() {
            return Err(BackendError::BufferOverflow { buffer, len: data.len(), capacity: contents.len() });
        }
        contents[..data.len()].copy_from_slice(data);
        self.record(BackendCall::WriteBuffer { buffer, len: data.len() });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) -> Result<(), BackendError> {
        self.buffers.remove(&buffer).ok_or(BackendError::UnknownBuffer(buffer))?;
        self.record(BackendCall::ReleaseBuffer(buffer));
        Ok(())
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle, BackendError> {
        image.validate()?;
        let handle = TextureHandle(self.textures);
        self.textures += 1;
        self.record(BackendCall::CreateTexture(handle));
        Ok(handle)
    }

    fn set_frame_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.uniforms = Some(*uniforms);
        self.record(BackendCall::SetFrameUniforms);
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), BackendError> {
        if !self.buffers.contains_key(&call.vertex_buffer) {
            return Err(BackendError::UnknownBuffer(call.vertex_buffer));
        }
        if !self.buffers.contains_key(&call.instance_buffer) {
            return Err(BackendError::UnknownBuffer(call.instance_buffer));
        }
        if call.program.0 >= self.programs {
            return Err(BackendError::UnknownProgram(call.program));
        }
        if let Some(texture) = call.texture {
            if texture.0 >= self.textures {
                return Err(BackendError::UnknownTexture(texture));
            }
        }
        self.record(BackendCall::Draw(*call));
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.record(BackendCall::Resize { width, height });
    }

    fn begin_frame(&mut self) -> Result<(), BackendError> {
        self.record(BackendCall::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.frames += 1;
        self.record(BackendCall::EndFrame);
        Ok(())
    }
}
