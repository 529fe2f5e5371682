// Scene-global lighting state.
//
// Four named light slots (point, directional, spot, blinking) are written
// during the update phase and snapshotted once per frame into a single
// uniform block. Every renderable drawn in that frame sees the same snapshot;
// only the shading mode varies per draw.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Per-draw interpretation of the shared lights by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadingMode {
    /// Sum of point, directional, blinking and spot contributions.
    #[default]
    BlendedPhong,
    /// Quantised point-light bands.
    Toon,
    /// Point, directional and blinking at half weight.
    HalfBlend,
}

impl ShadingMode {
    pub const ALL: [ShadingMode; 3] = [ShadingMode::BlendedPhong, ShadingMode::Toon, ShadingMode::HalfBlend];

    /// Value of the `SHADING_MODE` override constant in the scene shader.
    pub fn shader_constant(self) -> u32 {
        match self {
            ShadingMode::BlendedPhong => 0,
            ShadingMode::Toon => 1,
            ShadingMode::HalfBlend => 2,
        }
    }

    /// Next mode in `ALL`, wrapping around.
    pub fn next(self) -> ShadingMode {
        match self {
            ShadingMode::BlendedPhong => ShadingMode::Toon,
            ShadingMode::Toon => ShadingMode::HalfBlend,
            ShadingMode::HalfBlend => ShadingMode::BlendedPhong,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShadingMode::BlendedPhong => "blended phong",
            ShadingMode::Toon => "toon",
            ShadingMode::HalfBlend => "half blend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightSlot {
    Point,
    Directional,
    Spot,
    Blinking,
}

impl LightSlot {
    pub const ALL: [LightSlot; 4] = [LightSlot::Point, LightSlot::Directional, LightSlot::Spot, LightSlot::Blinking];

    fn index(self) -> usize {
        match self {
            LightSlot::Point => 0,
            LightSlot::Directional => 1,
            LightSlot::Spot => 2,
            LightSlot::Blinking => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Ignored for directional lights.
    pub position: Vec3,
    /// Ignored for point lights.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Constant, linear, quadratic falloff terms. (1, 0, 0) disables falloff.
    pub attenuation: Vec3,
    /// Cosine of the cone half-angle; only spot lights use it.
    pub cutoff: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 0.0,
            attenuation: Vec3::X,
            cutoff: -1.0,
        }
    }
}

impl Light {
    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self { position, color, intensity, ..Default::default() }
    }

    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self { direction, color, intensity, ..Default::default() }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, cutoff: f32) -> Self {
        Self { position, direction, color, intensity, cutoff, ..Default::default() }
    }

    fn to_raw(self) -> LightRaw {
        LightRaw {
            position: self.position.extend(1.0).to_array(),
            direction: self.direction.normalize_or_zero().extend(0.0).to_array(),
            // Negative intensity would subtract light in the shader.
            color: self.color.extend(self.intensity.max(0.0)).to_array(),
            attenuation: self.attenuation.extend(self.cutoff.clamp(-1.0, 1.0)).to_array(),
        }
    }
}

/// GPU layout of one light (must match `Light` in the scene shader).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightRaw {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    /// rgb = colour, a = intensity (never negative)
    pub color: [f32; 4],
    /// xyz = attenuation terms, w = spot cutoff
    pub attenuation: [f32; 4],
}

/// All four lights in slot order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LightingUniform {
    pub point: LightRaw,
    pub directional: LightRaw,
    pub spot: LightRaw,
    pub blinking: LightRaw,
}

/// One artillery-flash look: colour and peak brightness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashProfile {
    pub color: Vec3,
    pub peak: f32,
}

/// Intensity envelope of the blinking light: jumps to a peak on trigger and
/// decays linearly toward zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkEnvelope {
    intensity: f32,
    /// Intensity lost per second.
    pub decay_rate: f32,
}

impl BlinkEnvelope {
    pub fn new(decay_rate: f32) -> Self {
        Self { intensity: 0.0, decay_rate: decay_rate.max(0.0) }
    }

    pub fn trigger(&mut self, peak: f32) {
        self.intensity = peak.max(0.0);
    }

    /// Linear decay, floored at zero.
    pub fn decay(&mut self, dt: f32) {
        if self.intensity > 0.0 {
            self.intensity = (self.intensity - dt.max(0.0) * self.decay_rate).max(0.0);
        }
    }

    pub fn intensity(&self) -> f32 { self.intensity }
}

pub struct LightingState {
    lights: [Light; 4],
    blink: BlinkEnvelope,
}

impl LightingState {
    pub fn new(blink_decay_rate: f32) -> Self {
        Self {
            lights: [Light::default(); 4],
            blink: BlinkEnvelope::new(blink_decay_rate),
        }
    }

    pub fn set_light(&mut self, slot: LightSlot, light: Light) {
        self.lights[slot.index()] = light;
    }

    pub fn light(&self, slot: LightSlot) -> &Light {
        &self.lights[slot.index()]
    }

    /// Fire the blinking light with the given profile.
    pub fn trigger_flash(&mut self, profile: FlashProfile) {
        self.lights[LightSlot::Blinking.index()].color = profile.color;
        self.blink.trigger(profile.peak);
    }

    /// Advance time-dependent lights by one frame.
    pub fn update(&mut self, dt: f32) {
        self.blink.decay(dt);
        self.lights[LightSlot::Blinking.index()].intensity = self.blink.intensity();
    }

    pub fn blink_intensity(&self) -> f32 { self.blink.intensity() }

    /// The snapshot shared by every draw of the frame.
    pub fn snapshot(&self) -> LightingUniform {
        LightingUniform {
            point: self.light(LightSlot::Point).to_raw(),
            directional: self.light(LightSlot::Directional).to_raw(),
            spot: self.light(LightSlot::Spot).to_raw(),
            blinking: self.light(LightSlot::Blinking).to_raw(),
        }
    }
}
