// Artillery flashes on the horizon.
//
// A fixed-period timer fires the blinking light; each shot picks one of two
// looks: a rare heavy shell (brighter, with a random extra kick) or the
// common field battery.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::FlashProfile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlashLook {
    pub color: Vec3,
    pub peak: f32,
    /// Upper bound of the random bonus added to `peak` on each shot.
    pub bonus: f32,
}

impl FlashLook {
    fn sanitize(&mut self, name: &str) {
        if !self.peak.is_finite() || self.peak < 0.0 {
            log::warn!("flash.{name}.peak {} is not a usable intensity, using 0", self.peak);
            self.peak = 0.0;
        }
        if !self.bonus.is_finite() || self.bonus < 0.0 {
            log::warn!("flash.{name}.bonus {} is not a usable intensity, using 0", self.bonus);
            self.bonus = 0.0;
        }
        if !self.color.is_finite() {
            log::warn!("flash.{name}.color {} is not finite, using black", self.color);
            self.color = Vec3::ZERO;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    pub period_secs: f32,
    /// Intensity lost per second after a shot.
    pub decay_rate: f32,
    /// Probability of the heavy look; the field look covers the rest.
    pub heavy_probability: f64,
    pub heavy: FlashLook,
    pub field: FlashLook,
    pub position: Vec3,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            period_secs: 3.0,
            decay_rate: 10.0,
            heavy_probability: 0.3,
            heavy: FlashLook { color: Vec3::new(1.0, 0.6, 0.25), peak: 10.0, bonus: 6.0 },
            field: FlashLook { color: Vec3::new(0.8, 0.5, 0.0), peak: 10.0, bonus: 0.0 },
            position: Vec3::new(1.2, -0.215, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Heavy,
    Field,
}

impl FlashConfig {
    /// Replace values read from a config file that would stall or panic the
    /// flash roll. Each replacement is logged.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !(0.0..=1.0).contains(&self.heavy_probability) {
            let p = if self.heavy_probability.is_nan() {
                defaults.heavy_probability
            } else {
                self.heavy_probability.clamp(0.0, 1.0)
            };
            log::warn!("flash.heavy_probability {} out of [0, 1], using {p}", self.heavy_probability);
            self.heavy_probability = p;
        }
        if !self.decay_rate.is_finite() || self.decay_rate <= 0.0 {
            log::warn!("flash.decay_rate {} must be positive, using {}", self.decay_rate, defaults.decay_rate);
            self.decay_rate = defaults.decay_rate;
        }
        if !self.period_secs.is_finite() || self.period_secs <= 0.0 {
            log::warn!("flash.period_secs {} must be positive, using {}", self.period_secs, defaults.period_secs);
            self.period_secs = defaults.period_secs;
        }
        self.heavy.sanitize("heavy");
        self.field.sanitize("field");
    }

    /// Roll one shot.
    pub fn pick(&self, rng: &mut impl Rng) -> (FlashKind, FlashProfile) {
        let p = if self.heavy_probability.is_nan() { 0.0 } else { self.heavy_probability.clamp(0.0, 1.0) };
        let (kind, look) = if rng.gen_bool(p) {
            (FlashKind::Heavy, &self.heavy)
        } else {
            (FlashKind::Field, &self.field)
        };
        let bonus = if look.bonus > 0.0 && look.bonus.is_finite() { rng.gen_range(0.0..look.bonus) } else { 0.0 };
        (kind, FlashProfile { color: look.color, peak: look.peak + bonus })
    }
}
