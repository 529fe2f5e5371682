// Asynchronous texture loading.
//
// Decoding happens on worker threads; finished images wait in a channel until
// the frame loop drains them at the start of the next update phase. GPU state
// is therefore only ever touched from the frame thread, between frames.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

use super::backend::{GraphicsBackend, TextureHandle, TextureImage};

/// Ticket for one in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRequest(pub u32);

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode {path}: {source}")]
    Decode { path: PathBuf, source: image::ImageError },
    #[error("failed to upload {path}: {message}")]
    Upload { path: PathBuf, message: String },
}

struct Completed {
    request: TextureRequest,
    path: PathBuf,
    result: Result<TextureImage, TextureError>,
}

/// Outcome of one drained request: the uploaded handle, or None on failure.
pub type TextureOutcome = (TextureRequest, Option<TextureHandle>);

pub struct TextureLoader {
    tx: Sender<Completed>,
    rx: Receiver<Completed>,
    next: u32,
    in_flight: usize,
}

impl TextureLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, next: 0, in_flight: 0 }
    }

    /// Start decoding `path` in the background.
    pub fn request(&mut self, path: impl AsRef<Path>) -> TextureRequest {
        let request = self.next_request();
        let path = path.as_ref().to_path_buf();
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let result = decode(&path);
            // Receiver gone means the scene was torn down; nothing to do.
            let _ = tx.send(Completed { request, path, result });
        });
        request
    }

    /// Queue an already-decoded image, e.g. a generated one. It is uploaded
    /// on the next drain like any other completion.
    pub fn provide(&mut self, image: TextureImage) -> TextureRequest {
        let request = self.next_request();
        let path = PathBuf::from(&image.label);
        let _ = self.tx.send(Completed { request, path, result: Ok(image) });
        request
    }

    /// Upload every finished image. Call once per frame before the update phase.
    pub fn drain<B: GraphicsBackend>(&mut self, backend: &mut B) -> Vec<TextureOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(done) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let uploaded = done.result.and_then(|image| {
                backend
                    .create_texture(&image)
                    .map_err(|e| TextureError::Upload { path: done.path.clone(), message: e.to_string() })
            });
            match uploaded {
                Ok(handle) => {
                    log::info!("texture ready: {}", done.path.display());
                    outcomes.push((done.request, Some(handle)));
                }
                Err(e) => {
                    log::warn!("{e}");
                    outcomes.push((done.request, None));
                }
            }
        }
        outcomes
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn next_request(&mut self) -> TextureRequest {
        let request = TextureRequest(self.next);
        self.next += 1;
        self.in_flight += 1;
        request
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(path: &Path) -> Result<TextureImage, TextureError> {
    let img = image::open(path)
        .map_err(|source| TextureError::Decode { path: path.to_path_buf(), source })?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let mut rgba = img.into_raw();
    premultiply_alpha(&mut rgba);
    Ok(TextureImage { label: path.display().to_string(), width, height, rgba })
}

/// Blended draws use premultiplied alpha blending, so colour channels are
/// scaled by alpha once at load.
pub fn premultiply_alpha(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}
