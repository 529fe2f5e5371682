// Orbiting squads: biplanes, clouds and observation balloons.
//
// Every member carries its spawn parameters and a seed drawn once at scene
// construction. Its pose is a pure function of (params, seed, t): there is no
// velocity or accumulated angle, so any frame can be reproduced from t alone.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{Model, ModelKind, Transform};

/// Shape of one squad's orbit. Jitter fields are the width of the uniform
/// range each member's seed is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    pub center: Vec3,
    pub radius: f32,
    pub radius_jitter: f32,
    /// Radians per second at speed factor 1.
    pub base_speed: f32,
    pub speed_min: f32,
    pub speed_jitter: f32,
    /// Phase at t = 0 shared by the whole squad.
    pub base_offset: f32,
    pub phase_jitter: f32,
    /// Height above `center`.
    pub altitude: f32,
    pub altitude_jitter: f32,
    /// Vertical swing amplitude, tied to the orbit phase.
    pub bob_jitter: f32,
    /// Fixed nose-down (negative) or nose-up pitch, radians.
    pub pitch_bias: f32,
    pub roll_jitter: f32,
    /// Added to the tangent heading so the model's nose leads.
    pub heading_offset: f32,
    pub scale: f32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 4.0,
            radius_jitter: 0.0,
            base_speed: 0.3,
            speed_min: 1.0,
            speed_jitter: 0.0,
            base_offset: 0.0,
            phase_jitter: 0.0,
            altitude: 0.0,
            altitude_jitter: 0.0,
            bob_jitter: 0.0,
            pitch_bias: 0.0,
            roll_jitter: 0.0,
            heading_offset: 0.0,
            scale: 1.0,
        }
    }
}

/// Per-member jitter, fixed for the scene's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSeed {
    pub speed_factor: f32,
    pub radius_offset: f32,
    pub phase_offset: f32,
    pub altitude_offset: f32,
    pub bob: f32,
    pub roll: f32,
}

impl OrbitSeed {
    /// A seed with no jitter and unit speed.
    pub const NEUTRAL: OrbitSeed = OrbitSeed {
        speed_factor: 1.0,
        radius_offset: 0.0,
        phase_offset: 0.0,
        altitude_offset: 0.0,
        bob: 0.0,
        roll: 0.0,
    };

    pub fn draw(rng: &mut impl Rng, params: &OrbitParams) -> Self {
        let mut unit = || rng.gen_range(0.0..1.0_f32);
        Self {
            speed_factor: params.speed_min + unit() * params.speed_jitter,
            radius_offset: unit() * params.radius_jitter,
            phase_offset: unit() * params.phase_jitter,
            altitude_offset: unit() * params.altitude_jitter,
            bob: unit() * params.bob_jitter,
            roll: (unit() - 0.5) * params.roll_jitter,
        }
    }
}

impl OrbitParams {
    /// Orbit angle at time `t`. The travelled angle is wrapped to one turn in
    /// f64 before narrowing, so long-running scenes keep sub-frame resolution.
    pub fn phase_at(&self, seed: &OrbitSeed, t: f64) -> f32 {
        let rate = f64::from(self.base_speed) * f64::from(seed.speed_factor);
        let travelled = (t * rate).rem_euclid(std::f64::consts::TAU) as f32;
        self.base_offset + seed.phase_offset + travelled
    }

    pub fn position_at(&self, seed: &OrbitSeed, t: f64) -> Vec3 {
        let phase = self.phase_at(seed, t);
        let r = self.radius + seed.radius_offset;
        self.center
            + Vec3::new(
                phase.cos() * r,
                self.altitude + seed.altitude_offset + phase.cos() * seed.bob,
                phase.sin() * r,
            )
    }

    /// Full pose: position plus heading along the direction of travel.
    pub fn pose_at(&self, seed: &OrbitSeed, t: f64) -> Transform {
        let phase = self.phase_at(seed, t);
        // d/dphase of (cos, sin); flipped when the member flies backwards.
        let direction = (self.base_speed * seed.speed_factor).signum();
        let tangent = Vec3::new(-phase.sin(), 0.0, phase.cos()) * direction;
        Transform::from_position(self.position_at(seed, t))
            .with_yaw(tangent.x.atan2(tangent.z) + self.heading_offset)
            .with_pitch(self.pitch_bias)
            .with_roll(seed.roll)
            .with_scale(Vec3::splat(self.scale))
    }

    /// Seconds for a member with speed factor 1 to complete one lap.
    pub fn period(&self) -> f64 {
        std::f64::consts::TAU / f64::from(self.base_speed.abs())
    }
}

/// ECS component: one squad member.
#[derive(Component, Debug, Clone, Copy)]
pub struct OrbitMotion {
    pub params: OrbitParams,
    pub seed: OrbitSeed,
}

/// Spawn `count` members, drawing one seed each from `rng`.
pub fn spawn_squad(world: &mut World, kind: ModelKind, count: usize, params: OrbitParams, rng: &mut impl Rng) {
    for _ in 0..count {
        let seed = OrbitSeed::draw(rng, &params);
        world.spawn((params.pose_at(&seed, 0.0), Model { kind }, OrbitMotion { params, seed }));
    }
    log::info!("spawned {count} {} squad members", kind.name());
}

/// Rewrite every squad member's transform for elapsed time `t`.
pub fn orbit_system(world: &mut World, t: f64) {
    let mut query = world.query::<(&mut Transform, &OrbitMotion)>();
    for (mut transform, motion) in query.iter_mut(world) {
        *transform = motion.params.pose_at(&motion.seed, t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn biplanes() -> OrbitParams {
        OrbitParams {
            radius: 4.0,
            radius_jitter: 3.0,
            base_speed: 0.3,
            speed_min: 0.5,
            speed_jitter: 2.0,
            base_offset: std::f32::consts::FRAC_PI_2 / 5.0,
            altitude: -2.5,
            altitude_jitter: 2.0,
            bob_jitter: 2.0,
            pitch_bias: -std::f32::consts::FRAC_PI_3,
            heading_offset: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        }
    }

    #[test]
    fn position_is_pure() {
        let params = biplanes();
        let seed = OrbitSeed::draw(&mut StdRng::seed_from_u64(9), &params);
        for t in [0.0, 0.016, 1.5, 1234.5678] {
            let a = params.position_at(&seed, t);
            let b = params.position_at(&seed, t);
            assert_eq!(a.to_array().map(f32::to_bits), b.to_array().map(f32::to_bits));
        }
    }

    #[test]
    fn unit_speed_members_are_periodic() {
        let params = biplanes();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..5 {
            let seed = OrbitSeed { speed_factor: 1.0, ..OrbitSeed::draw(&mut rng, &params) };
            let start = params.position_at(&seed, 0.0);
            let lap = params.position_at(&seed, params.period());
            assert!((start - lap).length() < 1e-3, "{start} vs {lap}");
        }
    }

    #[test]
    fn phase_keeps_advancing_after_days_of_scene_time() {
        let params = biplanes();
        let seed = OrbitSeed::draw(&mut StdRng::seed_from_u64(5), &params);
        let rate = params.base_speed * seed.speed_factor;
        for start in [0.0, 3.0 * 86_400.0, 13.0 * 86_400.0, 400.0 * 86_400.0] {
            let step = params.phase_at(&seed, start + 1.0) - params.phase_at(&seed, start);
            let step = step.rem_euclid(std::f32::consts::TAU);
            assert!((step - rate).abs() < 1e-3, "start {start}: advanced {step}, expected {rate}");
            let moved = params.position_at(&seed, start + 1.0 / 60.0) - params.position_at(&seed, start);
            assert!(moved.length() > 0.0, "frozen at {start}");
        }
    }

    #[test]
    fn heading_follows_the_tangent() {
        let params = OrbitParams::default();
        let seed = OrbitSeed::NEUTRAL;
        // Quarter lap in: at phase π/2 the member is at +Z moving toward -X.
        let t = f64::from(std::f32::consts::FRAC_PI_2 / params.base_speed);
        let pose = params.pose_at(&seed, t);
        let nose = pose.to_matrix().transform_vector3(Vec3::Z).normalize();
        assert!((nose - Vec3::NEG_X).length() < 1e-4, "{nose}");
    }

    #[test]
    fn seeds_are_reproducible_and_in_range() {
        let params = biplanes();
        let a = OrbitSeed::draw(&mut StdRng::seed_from_u64(1), &params);
        let b = OrbitSeed::draw(&mut StdRng::seed_from_u64(1), &params);
        assert_eq!(a, b);
        assert!((0.5..2.5).contains(&a.speed_factor));
        assert!((0.0..3.0).contains(&a.radius_offset));
    }

    #[test]
    fn orbit_system_matches_pose_function() {
        let mut world = World::new();
        let params = biplanes();
        spawn_squad(&mut world, ModelKind::Biplane, 5, params, &mut StdRng::seed_from_u64(11));
        orbit_system(&mut world, 2.0);

        let mut query = world.query::<(&Transform, &OrbitMotion)>();
        let mut n = 0;
        for (transform, motion) in query.iter(&world) {
            assert_eq!(*transform, motion.params.pose_at(&motion.seed, 2.0));
            n += 1;
        }
        assert_eq!(n, 5);
    }
}
