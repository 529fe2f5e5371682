// Orbit-follow camera
//
// Camera model:
//   - A "target" point in world space the camera looks at (usually the airship)
//   - Yaw/pitch in degrees describe the viewing direction ("front")
//   - The eye sits `distance` units behind the target along -front
//   - Mouse drag orbits (yaw wraps, pitch clamps), mouse wheel zooms
//   - Two framing modes: Free and LockedFraming (tighter bounds while the
//     followed actor has its spotlight on)
//   - Retargeting after a mode change is smoothed: the effective target is
//     lerped toward the desired target each frame until the residual is small

use glam::{Mat4, Vec3};

use super::backend::CameraUniform;

/// Slowest transition weight and smallest settle distance `follow` accepts.
const MIN_TRANSITION_WEIGHT: f32 = 0.01;
const MIN_TRANSITION_EPSILON: f32 = 1e-3;

/// Clamp ranges applied to every pitch and distance change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl CameraBounds {
    /// Wide bounds used while the camera is free. The distance floor keeps
    /// the eye away from the near plane.
    pub const FREE: CameraBounds = CameraBounds {
        min_pitch: -89.0,
        max_pitch: 89.0,
        min_distance: 2.0,
        max_distance: 10.0,
    };

    /// Bounds used while the spotlight framing is active.
    pub const LOCKED_FRAMING: CameraBounds = CameraBounds {
        min_pitch: -25.0,
        max_pitch: 20.0,
        min_distance: 5.5,
        max_distance: 5.5,
    };

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(self.min_pitch, self.max_pitch)
    }

    fn clamp_distance(&self, distance: f32) -> f32 {
        distance.clamp(self.min_distance, self.max_distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Free,
    LockedFraming,
}

/// Wrap an angle in degrees into [0, 360).
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Derived basis of the camera. Never stored independently of yaw/pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    pub front: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

/// Derive front/right/up from Euler angles in degrees.
pub fn derive_basis(yaw: f32, pitch: f32, world_up: Vec3) -> CameraBasis {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    let front = Vec3::new(
        pitch.cos() * yaw.cos(),
        pitch.sin(),
        pitch.cos() * yaw.sin(),
    )
    .normalize();
    let right = front.cross(world_up).normalize_or_zero();
    let up = right.cross(front).normalize_or_zero();
    CameraBasis { front, right, up }
}

pub struct OrbitCamera {
    /// Point the camera looks at. Private: always written through set_target().
    target: Vec3,

    /// Private: always clamped to the active bounds.
    distance: f32,

    /// Degrees, kept in [0, 360).
    yaw: f32,

    /// Degrees, kept in [bounds.min_pitch, bounds.max_pitch].
    pitch: f32,

    pub world_up: Vec3,

    bounds: CameraBounds,
    /// Bounds to restore when leaving LockedFraming.
    saved_bounds: CameraBounds,
    mode: CameraMode,

    /// True while the effective target is still easing toward the desired one.
    transitioning: bool,

    basis: CameraBasis,
    position: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// Distance change per scroll line
    pub zoom_speed: f32,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::with_orientation(Vec3::ZERO, 4.0, -90.0, 15.0)
    }

    pub fn with_orientation(target: Vec3, distance: f32, yaw: f32, pitch: f32) -> Self {
        let bounds = CameraBounds::FREE;
        let world_up = Vec3::Y;
        let yaw = wrap_degrees(yaw);
        let pitch = bounds.clamp_pitch(pitch);
        let mut camera = Self {
            target,
            distance: bounds.clamp_distance(distance),
            yaw,
            pitch,
            world_up,
            bounds,
            saved_bounds: bounds,
            mode: CameraMode::Free,
            transitioning: false,
            basis: derive_basis(yaw, pitch, world_up),
            position: Vec3::ZERO,
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 100.0,
            zoom_speed: 0.2,
        };
        camera.update_vectors();
        camera
    }

    /// Move the orbit centre. The eye keeps its spherical offset.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.update_vectors();
    }

    /// Orbit by the given angles in degrees. Yaw is unbounded and wrapped,
    /// pitch is clamped after the wrap.
    pub fn process_orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        if !delta_yaw.is_finite() || !delta_pitch.is_finite() {
            return;
        }
        self.yaw = wrap_degrees(self.yaw + delta_yaw);
        self.pitch = self.bounds.clamp_pitch(self.pitch + delta_pitch);
        self.update_vectors();
    }

    /// Zoom by scroll lines: positive zooms in (decreases distance).
    pub fn process_zoom(&mut self, lines: f32) {
        if !lines.is_finite() {
            return;
        }
        self.distance = self.bounds.clamp_distance(self.distance - lines * self.zoom_speed);
        self.update_vectors();
    }

    /// Switch framing mode. Entering LockedFraming remembers the current
    /// bounds; leaving it restores them. Pitch and distance are re-clamped.
    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode == self.mode {
            return;
        }
        match mode {
            CameraMode::LockedFraming => {
                self.saved_bounds = self.bounds;
                self.bounds = CameraBounds::LOCKED_FRAMING;
            }
            CameraMode::Free => {
                self.bounds = self.saved_bounds;
            }
        }
        self.mode = mode;
        self.pitch = self.bounds.clamp_pitch(self.pitch);
        self.distance = self.bounds.clamp_distance(self.distance);
        self.update_vectors();
    }

    /// Replace the free-mode bounds. Takes effect immediately when free,
    /// otherwise once LockedFraming ends.
    pub fn set_free_bounds(&mut self, bounds: CameraBounds) {
        match self.mode {
            CameraMode::Free => {
                self.bounds = bounds;
                self.pitch = bounds.clamp_pitch(self.pitch);
                self.distance = bounds.clamp_distance(self.distance);
                self.update_vectors();
            }
            CameraMode::LockedFraming => self.saved_bounds = bounds,
        }
    }

    /// Invalidate the current target: subsequent follow() calls ease toward
    /// the desired target instead of snapping.
    pub fn begin_transition(&mut self) {
        self.transitioning = true;
    }

    /// Follow a desired target for this frame.
    ///
    /// While transitioning, the effective target moves `weight` of the way
    /// toward `desired`; the transition ends once the residual drops below
    /// `epsilon`. Otherwise the target snaps to `desired`. Weights and
    /// epsilons too small to ever finish are raised to a working minimum.
    pub fn follow(&mut self, desired: Vec3, weight: f32, epsilon: f32) {
        if self.transitioning {
            let weight = if weight.is_nan() { 1.0 } else { weight.clamp(MIN_TRANSITION_WEIGHT, 1.0) };
            let epsilon = if epsilon > MIN_TRANSITION_EPSILON { epsilon } else { MIN_TRANSITION_EPSILON };
            let next = self.target.lerp(desired, weight);
            if (desired - next).length() < epsilon {
                self.transitioning = false;
            }
            self.set_target(next);
        } else {
            self.set_target(desired);
        }
    }

    /// View matrix: looks from the eye toward the target.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.basis.up)
    }

    /// Perspective projection matrix.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Camera half of the per-frame uniform block.
    pub fn uniform(&self, aspect: f32) -> CameraUniform {
        CameraUniform {
            view: self.view_matrix().to_cols_array_2d(),
            projection: self.projection_matrix(aspect).to_cols_array_2d(),
            view_position: self.position.extend(1.0).to_array(),
        }
    }

    pub fn target(&self) -> Vec3 { self.target }
    pub fn distance(&self) -> f32 { self.distance }
    pub fn yaw(&self) -> f32 { self.yaw }
    pub fn pitch(&self) -> f32 { self.pitch }
    pub fn bounds(&self) -> CameraBounds { self.bounds }
    pub fn mode(&self) -> CameraMode { self.mode }
    pub fn is_transitioning(&self) -> bool { self.transitioning }
    pub fn position(&self) -> Vec3 { self.position }
    pub fn front(&self) -> Vec3 { self.basis.front }
    pub fn right(&self) -> Vec3 { self.basis.right }
    pub fn up(&self) -> Vec3 { self.basis.up }

    // Re-derive the basis and eye position after any yaw/pitch/target/distance change.
    fn update_vectors(&mut self) {
        self.basis = derive_basis(self.yaw, self.pitch, self.world_up);
        self.position = self.target - self.basis.front * self.distance;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}
