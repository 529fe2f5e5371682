// The player-controlled airship.
//
// Moves on camera-relative axes (flattened onto the ground plane), turns its
// nose toward the camera heading along the shortest arc, and carries a
// spotlight. Turning the spotlight on switches the follow camera into its
// locked framing mode and pushes the camera target ahead of the ship.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use winit::keyboard::KeyCode;

use crate::engine::{CameraMode, InputState, Light, OrbitCamera, Transform};

const SPOTLIGHT_DROP: Vec3 = Vec3::new(0.0, -0.5, 0.0);
const SPOTLIGHT_COLOR: Vec3 = Vec3::new(1.0, 0.2, 0.0);
const SPOTLIGHT_INTENSITY: f32 = 4.0;
/// Below this heading error (radians) the ship stops turning.
const HEADING_DEADBAND: f32 = 1e-2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirshipConfig {
    /// World units per second.
    pub move_speed: f32,
    /// Fraction of the heading error closed per second.
    pub rotate_speed: f32,
    /// How far ahead of the ship the camera looks while the spotlight is on.
    pub framing_distance: f32,
    pub framing_vertical_bias: f32,
    /// Per-frame lerp weight of camera transitions, scaled by move_speed.
    pub transition_weight: f32,
    pub transition_epsilon: f32,
    pub spotlight_at_start: bool,
}

impl Default for AirshipConfig {
    fn default() -> Self {
        Self {
            move_speed: 1.5,
            rotate_speed: 0.7,
            framing_distance: 4.5,
            framing_vertical_bias: -0.53,
            transition_weight: 0.1,
            transition_epsilon: 0.15,
            spotlight_at_start: false,
        }
    }
}

/// Wrap radians into (-π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Airship {
    pub position: Vec3,
    /// Heading in radians, kept in (-π, π].
    pub yaw: f32,
    spotlight_on: bool,
    config: AirshipConfig,
}

impl Airship {
    pub fn new(config: AirshipConfig) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            spotlight_on: false,
            config,
        }
    }

    pub fn config(&self) -> &AirshipConfig { &self.config }
    pub fn spotlight_on(&self) -> bool { self.spotlight_on }

    /// Apply held movement keys for one frame.
    pub fn update(&mut self, dt: f32, input: &InputState, camera: &OrbitCamera) {
        let forward = Vec3::new(camera.front().x, 0.0, camera.front().z).normalize_or_zero();
        let right = Vec3::new(camera.right().x, 0.0, camera.right().z).normalize_or_zero();

        let mut dir = Vec3::ZERO;
        if input.is_key_held(KeyCode::KeyW) { dir += forward; }
        if input.is_key_held(KeyCode::KeyS) { dir -= forward; }
        if input.is_key_held(KeyCode::KeyD) { dir += right; }
        if input.is_key_held(KeyCode::KeyA) { dir -= right; }
        if input.is_key_held(KeyCode::KeyQ) { dir += Vec3::Y; }
        if input.is_key_held(KeyCode::KeyE) { dir -= Vec3::Y; }

        if dir == Vec3::ZERO {
            return;
        }
        self.position += dir * self.config.move_speed * dt;
        self.turn_toward(forward, dt);
    }

    // Chase the heading of `forward` along the shortest arc.
    fn turn_toward(&mut self, forward: Vec3, dt: f32) {
        if forward == Vec3::ZERO {
            return;
        }
        let target_yaw = -forward.z.atan2(forward.x);
        let delta = wrap_angle(target_yaw - self.yaw);
        if delta.abs() >= HEADING_DEADBAND {
            self.yaw = wrap_angle(self.yaw + delta * dt * self.config.rotate_speed);
        }
    }

    /// Turn the spotlight on or off. Returns false if nothing changed.
    ///
    /// A change re-frames the camera and starts a smoothed retarget.
    pub fn set_spotlight(&mut self, on: bool, camera: &mut OrbitCamera) -> bool {
        if on == self.spotlight_on {
            return false;
        }
        self.spotlight_on = on;
        camera.set_mode(if on { CameraMode::LockedFraming } else { CameraMode::Free });
        camera.begin_transition();
        log::info!("spotlight {}", if on { "on" } else { "off" });
        true
    }

    /// Where the camera should be looking this frame.
    pub fn desired_camera_target(&self, camera: &OrbitCamera) -> Vec3 {
        if self.spotlight_on {
            self.position
                + camera.front() * self.config.framing_distance
                + Vec3::Y * self.config.framing_vertical_bias
        } else {
            self.position
        }
    }

    /// Move the camera target after this frame's movement.
    pub fn drive_camera(&self, camera: &mut OrbitCamera) {
        let desired = self.desired_camera_target(camera);
        camera.follow(
            desired,
            self.config.transition_weight * self.config.move_speed,
            self.config.transition_epsilon,
        );
    }

    pub fn transform(&self) -> Transform {
        // The mesh faces +X; turn it half a lap so the nose leads.
        Transform::from_position(self.position).with_yaw(PI + self.yaw)
    }

    pub fn spotlight(&self, camera: &OrbitCamera) -> Light {
        Light::spot(
            self.position + SPOTLIGHT_DROP,
            camera.front(),
            SPOTLIGHT_COLOR,
            if self.spotlight_on { SPOTLIGHT_INTENSITY } else { 0.0 },
            (PI / 12.0).cos(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_facing_neg_z() -> OrbitCamera {
        OrbitCamera::with_orientation(Vec3::ZERO, 4.0, -90.0, 0.0)
    }

    #[test]
    fn wrap_angle_range() {
        for a in [-10.0 * PI, -PI, -3.0, 0.0, 3.0, PI, 7.0, 100.0] {
            let w = wrap_angle(a);
            assert!(w > -PI && w <= PI, "{a} -> {w}");
        }
        assert!((wrap_angle(-PI) - PI).abs() < 1e-6);
    }

    #[test]
    fn forward_for_one_second() {
        let camera = camera_facing_neg_z();
        let mut ship = Airship::new(AirshipConfig::default());
        let mut input = InputState::new();
        input.press(KeyCode::KeyW);

        for _ in 0..60 {
            ship.update(1.0 / 60.0, &input, &camera);
        }
        assert!((ship.position - Vec3::new(0.0, 0.0, -1.5)).length() < 1e-4, "{}", ship.position);
    }

    #[test]
    fn heading_takes_the_short_way_round() {
        let camera = camera_facing_neg_z(); // target heading = +π/2
        let mut ship = Airship::new(AirshipConfig::default());
        ship.yaw = -PI + 0.2; // short way is clockwise through ±π
        let mut input = InputState::new();
        input.press(KeyCode::KeyW);

        ship.update(0.1, &input, &camera);
        // Error is -(π - 0.2 + π/2) + 2π wrapped → negative step.
        assert!(ship.yaw < -PI + 0.2);
    }

    #[test]
    fn no_turning_without_movement() {
        let camera = camera_facing_neg_z();
        let mut ship = Airship::new(AirshipConfig::default());
        ship.update(1.0, &InputState::new(), &camera);
        assert_eq!(ship.yaw, 0.0);
        assert_eq!(ship.position, Vec3::ZERO);
    }

    #[test]
    fn spotlight_on_pushes_target_ahead_and_starts_transition() {
        let mut camera = camera_facing_neg_z();
        let mut ship = Airship::new(AirshipConfig::default());

        assert!(ship.set_spotlight(true, &mut camera));
        assert!(camera.is_transitioning());
        assert_eq!(camera.mode(), CameraMode::LockedFraming);

        let desired = ship.desired_camera_target(&camera);
        assert!((desired - Vec3::new(0.0, -0.53, -4.5)).length() < 1e-4, "{desired}");
        assert!(!ship.set_spotlight(true, &mut camera));
    }

    #[test]
    fn spotlight_follows_state() {
        let mut camera = camera_facing_neg_z();
        let mut ship = Airship::new(AirshipConfig::default());
        assert_eq!(ship.spotlight(&camera).intensity, 0.0);
        ship.set_spotlight(true, &mut camera);
        let light = ship.spotlight(&camera);
        assert_eq!(light.intensity, 4.0);
        assert_eq!(light.position, Vec3::new(0.0, -0.5, 0.0));
    }
}
