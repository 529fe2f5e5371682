// Input state tracking for keyboard and pointer
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;
use winit::event::{DeviceEvent, ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Default)]
pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,
    // Keys that went down since the last end_frame(); used for toggles
    keys_pressed: HashSet<KeyCode>,

    // Pointer deltas accumulated since the last end_frame(), in pixels.
    // Only collected while the host reports pointer lock.
    pub pointer_delta: (f32, f32),
    pointer_locked: bool,

    // Scroll: accumulated vertical scroll lines this frame, reset in end_frame()
    pub scroll_delta: f32,

    // Window dimensions
    pub window_size: (u32, u32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the host's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press(key),
                        ElementState::Released => self.release(key),
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            WindowEvent::Focused(false) => {
                // Key-up events are lost while unfocused.
                self.keys_held.clear();
            }
            _ => {}
        }
    }

    /// Raw pointer motion. Ignored unless the pointer is locked.
    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.add_pointer_delta(delta.0 as f32, delta.1 as f32);
        }
    }

    pub fn add_pointer_delta(&mut self, dx: f32, dy: f32) {
        if self.pointer_locked {
            self.pointer_delta.0 += dx;
            self.pointer_delta.1 += dy;
        }
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.pointer_locked = locked;
        if !locked {
            self.pointer_delta = (0.0, 0.0);
        }
    }

    pub fn pointer_locked(&self) -> bool {
        self.pointer_locked
    }

    pub fn press(&mut self, key: KeyCode) {
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
    }

    /// Call once per frame after update and render have consumed input.
    /// Resets per-frame accumulators.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
        self.pointer_delta = (0.0, 0.0);
        self.keys_pressed.clear();
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// True only in the frame the key went down (auto-repeat ignored).
    pub fn was_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }
}
