// The flyover scene: airship, martian props, three orbiting squads, four
// lights and the follow camera, driven by the frame loop.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use winit::keyboard::KeyCode;

use super::airship::Airship;
use super::assets::{AssetError, ModelSource, SceneAssets};
use super::flash::{FlashConfig, FlashKind};
use super::scheduler;
use super::squad::spawn_squad;
use crate::config::{ControlsConfig, SceneConfig};
use crate::engine::{
    BackendError, BlendMode, DrawSummary, FrameScene, FrameUniforms, Geometry, GraphicsBackend, InputState,
    InstancedRenderable, Light, LightSlot, LightingState, Model, ModelKind, OrbitCamera, ProgramHandle,
    ProgramSource, SceneEvent, SceneMetrics, ShadingMode, StaticProp, TextureBinding, TextureLoader,
    TextureOutcome, Transform,
};

/// Drawn depth-writing, in this order, before the blended cloud layer.
const OPAQUE_KINDS: [ModelKind; 3] = [ModelKind::Martian, ModelKind::Biplane, ModelKind::Balloon];

pub struct FlyoverScene {
    world: World,
    airship: Airship,
    airship_renderable: InstancedRenderable,
    renderables: HashMap<ModelKind, InstancedRenderable>,
    camera: OrbitCamera,
    lighting: LightingState,
    flash: FlashConfig,
    controls: ControlsConfig,
    rng: StdRng,
    shading: ShadingMode,
}

impl FlyoverScene {
    /// Compile the scene program, upload every mesh and spawn the actors.
    ///
    /// Textures are only requested here; they resolve on later frames.
    pub fn build<B: GraphicsBackend>(
        backend: &mut B,
        config: &SceneConfig,
        assets: SceneAssets,
        shader: &ProgramSource,
        textures: &mut TextureLoader,
    ) -> Result<Self, AssetError> {
        let program = backend.compile_program(shader).map_err(AssetError::Shader)?;

        let airship_renderable = make_renderable(backend, "airship", program, &assets.airship, textures)?;
        let mut renderables = HashMap::new();
        for kind in ModelKind::ALL {
            let source = assets.models.get(&kind).ok_or(AssetError::MissingModel(kind))?;
            renderables.insert(kind, make_renderable(backend, kind.name(), program, source, textures)?);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut world = World::new();
        for prop in &config.martians {
            world.spawn((
                Transform::from_position(prop.position).with_yaw(prop.yaw),
                Model { kind: ModelKind::Martian },
                StaticProp,
            ));
        }
        for (kind, squad) in config.squads.in_draw_order() {
            spawn_squad(&mut world, kind, squad.count, squad.orbit, &mut rng);
        }

        let mut camera = OrbitCamera::new();
        camera.zoom_speed = config.controls.zoom_speed;
        let mut airship = Airship::new(config.airship.clone());
        camera.set_target(airship.position);
        if config.airship.spotlight_at_start {
            airship.set_spotlight(true, &mut camera);
        }

        let mut lighting = LightingState::new(config.flash.decay_rate);
        lighting.set_light(LightSlot::Point, Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.8, 0.6), 1.5));
        lighting.set_light(LightSlot::Directional, Light::directional(Vec3::new(-0.5, -1.0, -0.5), Vec3::ONE, 0.8));
        lighting.set_light(LightSlot::Blinking, Light::point(config.flash.position, config.flash.field.color, 0.0));
        lighting.set_light(LightSlot::Spot, airship.spotlight(&camera));

        log::info!(
            "scene built: {} martians, {} biplanes, {} balloons, {} clouds",
            config.martians.len(),
            config.squads.biplanes.count,
            config.squads.balloons.count,
            config.squads.clouds.count,
        );

        Ok(Self {
            world,
            airship,
            airship_renderable,
            renderables,
            camera,
            lighting,
            flash: config.flash.clone(),
            controls: config.controls.clone(),
            rng,
            shading: ShadingMode::default(),
        })
    }

    /// Toggle the airship spotlight. The camera re-frames with a smoothed
    /// transition. Returns false if already in the requested state.
    pub fn set_spotlight(&mut self, on: bool) -> bool {
        self.airship.set_spotlight(on, &mut self.camera)
    }

    /// Fire the artillery light with a randomly picked profile.
    pub fn trigger_flash(&mut self) -> FlashKind {
        let (kind, profile) = self.flash.pick(&mut self.rng);
        self.lighting.trigger_flash(profile);
        log::debug!("artillery flash: {kind:?}, peak {:.1}", profile.peak);
        kind
    }

    pub fn set_shading(&mut self, shading: ShadingMode) {
        self.shading = shading;
    }

    pub fn camera(&self) -> &OrbitCamera { &self.camera }
    pub fn airship(&self) -> &Airship { &self.airship }
    pub fn lighting(&self) -> &LightingState { &self.lighting }
    pub fn shading(&self) -> ShadingMode { self.shading }
    pub fn airship_renderable(&self) -> &InstancedRenderable { &self.airship_renderable }

    pub fn renderable(&self, kind: ModelKind) -> Option<&InstancedRenderable> {
        self.renderables.get(&kind)
    }

    pub fn entity_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    fn draw_kind<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        kind: ModelKind,
        blend: BlendMode,
        summary: &mut DrawSummary,
    ) -> Result<(), BackendError> {
        let instances = match blend {
            BlendMode::Opaque => scheduler::collect_instances(&mut self.world, kind),
            BlendMode::Blended => scheduler::collect_back_to_front(&mut self.world, kind, self.camera.position()),
        };
        let Some(renderable) = self.renderables.get_mut(&kind) else {
            return Ok(());
        };
        renderable.set_instances(backend, &instances)?;
        renderable.draw_instanced(backend, self.shading, blend)?;
        if !instances.is_empty() {
            summary.draw_calls += 1;
            summary.instances += instances.len() as u32;
        }
        Ok(())
    }
}

impl FrameScene for FlyoverScene {
    fn resolve_textures(&mut self, outcomes: &[TextureOutcome]) {
        for &(request, handle) in outcomes {
            if self.airship_renderable.resolve_texture(request, handle) {
                continue;
            }
            for renderable in self.renderables.values_mut() {
                if renderable.resolve_texture(request, handle) {
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::ArtilleryFlash => {
                self.trigger_flash();
            }
            SceneEvent::Spotlight(on) => {
                self.set_spotlight(on);
            }
        }
    }

    fn apply_input(&mut self, input: &InputState) {
        if input.was_key_pressed(KeyCode::KeyL) {
            let on = !self.airship.spotlight_on();
            self.set_spotlight(on);
        }
        if input.was_key_pressed(KeyCode::KeyM) {
            self.shading = self.shading.next();
            log::info!("shading mode: {}", self.shading.name());
        }

        let (dx, dy) = input.pointer_delta;
        if dx != 0.0 || dy != 0.0 {
            let sensitivity = self.controls.mouse_sensitivity;
            // Screen y grows downward; moving the pointer up looks up.
            let dy = if self.controls.invert_pitch { dy } else { -dy };
            self.camera.process_orbit(dx * sensitivity, dy * sensitivity);
        }
        if input.scroll_delta != 0.0 {
            self.camera.process_zoom(input.scroll_delta);
        }
    }

    fn animate(&mut self, dt: f32, elapsed: f64, input: &InputState) {
        scheduler::advance(&mut self.world, &mut self.airship, &self.camera, input, dt, elapsed);
    }

    fn update_camera(&mut self) {
        self.airship.drive_camera(&mut self.camera);
    }

    fn update_lighting(&mut self, dt: f32) {
        self.lighting.update(dt);
        self.lighting.set_light(LightSlot::Spot, self.airship.spotlight(&self.camera));
    }

    fn draw<B: GraphicsBackend>(&mut self, backend: &mut B, aspect: f32) -> Result<DrawSummary, BackendError> {
        backend.set_frame_uniforms(&FrameUniforms {
            camera: self.camera.uniform(aspect),
            lighting: self.lighting.snapshot(),
        });

        let mut summary = DrawSummary::default();
        let airship = self.airship.transform().to_matrix();
        self.airship_renderable.draw_single(backend, airship, self.shading, BlendMode::Opaque)?;
        summary.draw_calls += 1;
        summary.instances += 1;

        for kind in OPAQUE_KINDS {
            self.draw_kind(backend, kind, BlendMode::Opaque, &mut summary)?;
        }
        self.draw_kind(backend, ModelKind::Cloud, BlendMode::Blended, &mut summary)?;
        Ok(summary)
    }

    fn metrics(&self) -> SceneMetrics {
        SceneMetrics {
            camera_target: self.camera.target(),
            camera_distance: self.camera.distance(),
            camera_yaw: self.camera.yaw(),
            camera_pitch: self.camera.pitch(),
            camera_transitioning: self.camera.is_transitioning(),
            blink_intensity: self.lighting.blink_intensity(),
            spotlight_on: self.airship.spotlight_on(),
            shading: self.shading,
        }
    }
}

fn make_renderable<B: GraphicsBackend>(
    backend: &mut B,
    label: &str,
    program: ProgramHandle,
    source: &ModelSource,
    textures: &mut TextureLoader,
) -> Result<InstancedRenderable, BackendError> {
    let geometry = Geometry::from_mesh(label, &source.mesh, source.scale);
    let texture = match &source.texture {
        Some(path) => TextureBinding::Pending(textures.request(path)),
        None => TextureBinding::Untextured,
    };
    InstancedRenderable::new(backend, label, program, geometry, texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::recording::{BackendCall, RecordingBackend};
    use crate::engine::parse_obj;

    fn scene(backend: &mut RecordingBackend) -> FlyoverScene {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let shader = ProgramSource { label: "scene".into(), source: String::new() };
        FlyoverScene::build(backend, &SceneConfig::default(), SceneAssets::uniform(mesh), &shader, &mut TextureLoader::new())
            .unwrap()
    }

    #[test]
    fn spawns_configured_population() {
        let mut backend = RecordingBackend::new();
        let scene = scene(&mut backend);
        // 2 martians + 5 biplanes + 4 balloons + 20 clouds
        assert_eq!(scene.entity_count(), 31);
        assert!(!scene.airship().spotlight_on());
    }

    #[test]
    fn clouds_are_the_last_draw_and_blended() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        backend.clear_calls();

        let summary = scene.draw(&mut backend, 16.0 / 9.0).unwrap();
        let draws: Vec<_> = backend.draws().copied().collect();
        assert_eq!(summary.draw_calls as usize, draws.len());
        assert_eq!(summary.instances, 1 + 2 + 5 + 4 + 20);

        let (last, opaque) = draws.split_last().unwrap();
        assert_eq!(last.blend, BlendMode::Blended);
        assert_eq!(last.instance_count, 20);
        assert!(opaque.iter().all(|d| d.blend == BlendMode::Opaque));
    }

    #[test]
    fn uniforms_are_published_before_any_draw() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        backend.clear_calls();
        scene.draw(&mut backend, 1.0).unwrap();
        assert_eq!(backend.calls()[0], BackendCall::SetFrameUniforms);
    }

    #[test]
    fn flash_events_light_the_blinking_slot() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        scene.handle_event(SceneEvent::ArtilleryFlash);
        assert!(scene.lighting().blink_intensity() >= 10.0);
        scene.update_lighting(2.0);
        assert_eq!(scene.lighting().blink_intensity(), 0.0);
    }

    #[test]
    fn pointer_motion_orbits_the_camera() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        let yaw = scene.camera().yaw();
        let mut input = InputState::new();
        input.set_pointer_locked(true);
        input.add_pointer_delta(100.0, 0.0);
        scene.apply_input(&input);
        assert!((scene.camera().yaw() - (yaw + 20.0)).abs() < 1e-3);
    }

    #[test]
    fn l_key_toggles_spotlight() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        let mut input = InputState::new();
        input.press(KeyCode::KeyL);
        scene.apply_input(&input);
        assert!(scene.airship().spotlight_on());
        assert!(scene.camera().is_transitioning());
    }

    #[test]
    fn m_key_cycles_shading_for_every_draw() {
        let mut backend = RecordingBackend::new();
        let mut scene = scene(&mut backend);
        let mut input = InputState::new();
        input.press(KeyCode::KeyM);
        scene.apply_input(&input);
        assert_eq!(scene.shading(), ShadingMode::Toon);

        backend.clear_calls();
        scene.draw(&mut backend, 1.0).unwrap();
        assert!(backend.draws().all(|d| d.shading == ShadingMode::Toon));
    }
}
