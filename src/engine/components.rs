// Core ECS components for the engine
// These are reusable across any scene built with this engine

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

/// Pose of an entity for the current frame.
///
/// Recomputed by whichever system owns the entity every frame; never
/// accumulated across frames. The matrix is composed in a fixed order:
/// translate, then yaw (Y), then pitch (X), then roll (Z), then scale.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Radians about +Y.
    pub yaw: f32,
    /// Radians about the yawed X axis.
    pub pitch: f32,
    /// Radians about the yawed and pitched Z axis.
    pub roll: f32,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_roll(mut self, roll: f32) -> Self {
        self.roll = roll;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix ready for the instance buffer.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.yaw)
            * Mat4::from_rotation_x(self.pitch)
            * Mat4::from_rotation_z(self.roll)
            * Mat4::from_scale(self.scale)
    }
}

/// Which instanced renderable draws this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Martian,
    Biplane,
    Balloon,
    Cloud,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Martian,
        ModelKind::Biplane,
        ModelKind::Balloon,
        ModelKind::Cloud,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Martian => "martian",
            ModelKind::Biplane => "biplane",
            ModelKind::Balloon => "balloon",
            ModelKind::Cloud => "cloud",
        }
    }
}

/// Tags an entity with the renderable that draws it.
#[derive(Component, Debug, Clone, Copy)]
pub struct Model {
    pub kind: ModelKind,
}

/// Entity whose transform is fixed at spawn time.
#[derive(Component, Debug, Clone, Copy)]
pub struct StaticProp;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        assert_eq!(Transform::default().to_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn translation_applies_after_rotation() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0))
            .with_yaw(std::f32::consts::FRAC_PI_2);
        // Local +Z rotated by 90° yaw lands on +X, then translated.
        let p = t.to_matrix().transform_point3(Vec3::Z);
        assert!((p - Vec3::new(2.0, 2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn scale_is_applied_in_local_space() {
        let t = Transform::from_position(Vec3::X).with_scale(Vec3::splat(2.0));
        let p = t.to_matrix().transform_point3(Vec3::Y);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }
}
