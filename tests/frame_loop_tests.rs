// End-to-end frame loop runs against the recording backend.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use airship_flyover::config::SceneConfig;
use airship_flyover::engine::recording::BackendCall;
use airship_flyover::engine::{
    BlendMode, BufferKind, FrameLoop, FrameStats, InputState, LightSlot, LoopState, MeshData, ProgramSource,
    RecordingBackend, SceneEvent, parse_obj,
};
use airship_flyover::scene::{AssetError, FlyoverScene, SceneAssets};

const STEP: f64 = 1.0 / 60.0;
const VIEWPORT: (u32, u32) = (1280, 720);

fn triangle() -> MeshData {
    parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap()
}

fn shader() -> ProgramSource {
    ProgramSource { label: "scene".into(), source: airship_flyover::SCENE_SHADER.into() }
}

fn running_loop(backend: &mut RecordingBackend, assets: SceneAssets) -> FrameLoop<FlyoverScene> {
    let config = SceneConfig::default();
    let mut frame_loop = FrameLoop::new(config.max_frame_delta);
    frame_loop
        .load_scene(|textures| FlyoverScene::build(backend, &config, assets, &shader(), textures))
        .unwrap();
    assert!(frame_loop.start_scene());
    frame_loop
}

struct Clock(u64);

impl Clock {
    fn tick(
        &mut self,
        frame_loop: &mut FrameLoop<FlyoverScene>,
        backend: &mut RecordingBackend,
        input: &InputState,
    ) -> Option<FrameStats> {
        let now = self.0 as f64 * STEP;
        self.0 += 1;
        frame_loop.tick(backend, now, VIEWPORT, input).unwrap()
    }
}

/// Calls recorded between the last BeginFrame and EndFrame.
fn last_frame(calls: &[BackendCall]) -> &[BackendCall] {
    let end = calls.iter().rposition(|c| *c == BackendCall::EndFrame).unwrap();
    let begin = calls[..end].iter().rposition(|c| *c == BackendCall::BeginFrame).unwrap();
    &calls[begin + 1..end]
}

#[test]
fn blended_draws_close_every_frame() {
    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, SceneAssets::uniform(triangle()));
    let input = InputState::new();
    let mut clock = Clock(0);

    for _ in 0..30 {
        backend.clear_calls();
        let stats = clock.tick(&mut frame_loop, &mut backend, &input).unwrap();

        let frame = last_frame(backend.calls());
        let draws: Vec<_> = frame
            .iter()
            .filter_map(|c| match c {
                BackendCall::Draw(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(draws.len() as u32, stats.draw.draw_calls);
        let first_blended = draws.iter().position(|d| d.blend == BlendMode::Blended).unwrap();
        assert!(draws[first_blended..].iter().all(|d| d.blend == BlendMode::Blended));
    }
}

#[test]
fn buffer_writes_precede_the_draws_that_read_them() {
    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, SceneAssets::uniform(triangle()));
    let input = InputState::new();
    let mut clock = Clock(0);
    clock.tick(&mut frame_loop, &mut backend, &input);
    clock.tick(&mut frame_loop, &mut backend, &input);

    let frame = last_frame(backend.calls());
    assert_eq!(frame[0], BackendCall::SetFrameUniforms);
    for (i, call) in frame.iter().enumerate() {
        if let BackendCall::Draw(draw) = call {
            let written = frame[..i].iter().any(|c| match c {
                BackendCall::WriteBuffer { buffer, .. } => *buffer == draw.instance_buffer,
                BackendCall::UploadBuffer { buffer, kind: BufferKind::Instance, .. } => *buffer == draw.instance_buffer,
                _ => false,
            });
            assert!(written, "instance buffer {:?} drawn before being written", draw.instance_buffer);
        }
    }
    // Vertex data is uploaded once at build, never per frame.
    assert!(!frame.iter().any(|c| matches!(c, BackendCall::UploadBuffer { kind: BufferKind::Vertex, .. })));
}

#[test]
fn spotlight_retargets_the_camera_smoothly() {
    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, SceneAssets::uniform(triangle()));
    let input = InputState::new();
    let mut clock = Clock(0);
    clock.tick(&mut frame_loop, &mut backend, &input);

    frame_loop.set_spotlight(true);
    let first = clock.tick(&mut frame_loop, &mut backend, &input).unwrap();
    assert!(first.scene.spotlight_on);
    assert!(first.scene.camera_transitioning);

    let mut frames = 1;
    while frame_loop.scene().unwrap().camera().is_transitioning() {
        clock.tick(&mut frame_loop, &mut backend, &input);
        frames += 1;
        assert!(frames < 200, "transition never settled");
    }
    assert!(frames > 2, "target snapped instead of easing");

    clock.tick(&mut frame_loop, &mut backend, &input);
    let scene = frame_loop.scene().unwrap();
    let desired = scene.airship().desired_camera_target(scene.camera());
    assert!((scene.camera().target() - desired).length() < 1e-4);
    assert_eq!(scene.lighting().light(LightSlot::Spot).intensity, 4.0);
}

#[test]
fn rejected_shader_leaves_the_loop_loading() {
    let mut backend = RecordingBackend::failing_compile("expected `;`");
    let config = SceneConfig::default();
    let mut frame_loop: FrameLoop<FlyoverScene> = FrameLoop::new(config.max_frame_delta);

    let result = frame_loop.load_scene(|textures| {
        FlyoverScene::build(&mut backend, &config, SceneAssets::uniform(triangle()), &shader(), textures)
    });
    assert!(matches!(result, Err(AssetError::Shader(_))));
    assert_eq!(frame_loop.state(), LoopState::Loading);
    assert!(!frame_loop.start_scene());
    assert!(frame_loop.tick(&mut backend, 0.0, VIEWPORT, &InputState::new()).unwrap().is_none());
    assert_eq!(backend.frames_presented(), 0);
}

#[test]
fn textures_swap_in_without_stalling_frames() {
    let dir = std::env::temp_dir().join(format!("flyover-frame-loop-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path: PathBuf = dir.join("cloud.png");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 128])).save(&path).unwrap();

    let mut assets = SceneAssets::uniform(triangle());
    assets.models.get_mut(&airship_flyover::engine::ModelKind::Cloud).unwrap().texture = Some(path);

    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, assets);
    let input = InputState::new();
    let mut clock = Clock(0);

    // Frames keep drawing with the placeholder until the decode lands.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        backend.clear_calls();
        clock.tick(&mut frame_loop, &mut backend, &input).unwrap();
        let cloud = *backend.draws().last().unwrap();
        assert_eq!(cloud.blend, BlendMode::Blended);
        if let Some(texture) = cloud.texture {
            assert!(backend.calls().iter().any(|c| *c == BackendCall::CreateTexture(texture)));
            break;
        }
        assert!(Instant::now() < deadline, "texture never resolved");
        std::thread::sleep(Duration::from_millis(2));
    }
    std::fs::remove_dir_all(&dir).ok();

    // Everything else stays untextured.
    assert!(backend.draws().filter(|d| d.blend == BlendMode::Opaque).all(|d| d.texture.is_none()));
}

#[test]
fn timer_flashes_land_on_the_next_frame() {
    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, SceneAssets::uniform(triangle()));
    let input = InputState::new();
    let mut clock = Clock(0);

    let first = clock.tick(&mut frame_loop, &mut backend, &input).unwrap();
    assert_eq!(first.scene.blink_intensity, 0.0);

    let sender = frame_loop.event_sender();
    std::thread::spawn(move || sender.send(SceneEvent::ArtilleryFlash).unwrap()).join().unwrap();

    let lit = clock.tick(&mut frame_loop, &mut backend, &input).unwrap();
    assert!(lit.scene.blink_intensity > 0.0);
    let uniforms = backend.last_uniforms().unwrap();
    assert!(uniforms.lighting.blinking.color[3] > 0.0);

    // The envelope decays to dark well within a few seconds.
    for _ in 0..300 {
        clock.tick(&mut frame_loop, &mut backend, &input);
    }
    let dark = clock.tick(&mut frame_loop, &mut backend, &input).unwrap();
    assert_eq!(dark.scene.blink_intensity, 0.0);
}

#[test]
fn zero_viewport_keeps_simulating_without_drawing() {
    let mut backend = RecordingBackend::new();
    let mut frame_loop = running_loop(&mut backend, SceneAssets::uniform(triangle()));
    let input = InputState::new();

    frame_loop.tick(&mut backend, 0.0, VIEWPORT, &input).unwrap();
    let presented = backend.frames_presented();
    assert!(frame_loop.tick(&mut backend, STEP, (0, 720), &input).unwrap().is_none());
    assert_eq!(backend.frames_presented(), presented);

    let stats = frame_loop.tick(&mut backend, 2.0 * STEP, VIEWPORT, &input).unwrap().unwrap();
    assert!((stats.elapsed - 2.0 * STEP).abs() < 1e-6);
}
