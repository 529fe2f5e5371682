// Animation scheduler: advances every time-driven entity for one frame and
// turns the resulting poses into instance matrices.

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};

use super::airship::Airship;
use super::squad::orbit_system;
use crate::engine::{InputState, Model, ModelKind, OrbitCamera, Transform};

/// Advance the player actor by `dt` and pose every squad member at `t`.
///
/// The camera is read (movement is camera-relative) but not moved; the frame
/// loop retargets it after this returns.
pub fn advance(world: &mut World, airship: &mut Airship, camera: &OrbitCamera, input: &InputState, dt: f32, t: f64) {
    airship.update(dt, input, camera);
    orbit_system(world, t);
}

/// Model matrices of every entity drawn by `kind`, in query order.
pub fn collect_instances(world: &mut World, kind: ModelKind) -> Vec<Mat4> {
    let mut query = world.query::<(&Transform, &Model)>();
    query
        .iter(world)
        .filter(|(_, model)| model.kind == kind)
        .map(|(transform, _)| transform.to_matrix())
        .collect()
}

/// Same as `collect_instances`, ordered farthest-from-`eye` first so blended
/// instances composite correctly.
pub fn collect_back_to_front(world: &mut World, kind: ModelKind, eye: Vec3) -> Vec<Mat4> {
    let mut query = world.query::<(&Transform, &Model)>();
    let mut keyed: Vec<(f32, Mat4)> = query
        .iter(world)
        .filter(|(_, model)| model.kind == kind)
        .map(|(transform, _)| (transform.position.distance_squared(eye), transform.to_matrix()))
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    keyed.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StaticProp;

    fn spawn_at(world: &mut World, kind: ModelKind, z: f32) {
        world.spawn((Transform::from_position(Vec3::new(0.0, 0.0, z)), Model { kind }, StaticProp));
    }

    #[test]
    fn instances_are_filtered_by_kind() {
        let mut world = World::new();
        spawn_at(&mut world, ModelKind::Martian, 0.0);
        spawn_at(&mut world, ModelKind::Cloud, 1.0);
        spawn_at(&mut world, ModelKind::Martian, 2.0);
        assert_eq!(collect_instances(&mut world, ModelKind::Martian).len(), 2);
        assert_eq!(collect_instances(&mut world, ModelKind::Biplane).len(), 0);
    }

    #[test]
    fn blended_instances_sort_far_to_near() {
        let mut world = World::new();
        for z in [3.0, -8.0, 0.5, 12.0] {
            spawn_at(&mut world, ModelKind::Cloud, z);
        }
        let eye = Vec3::new(0.0, 0.0, 4.0);
        let sorted = collect_back_to_front(&mut world, ModelKind::Cloud, eye);
        let distances: Vec<f32> = sorted.iter().map(|m| m.w_axis.truncate().distance(eye)).collect();
        assert!(distances.windows(2).all(|w| w[0] >= w[1]), "{distances:?}");
        assert_eq!(distances[0], 12.0);
    }
}
