use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, MouseButton, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use airship_flyover::SCENE_SHADER;
use airship_flyover::config::{DEFAULT_CONFIG_FILE, SceneConfig};
use airship_flyover::engine::debug_overlay::{DebugStats, FrameTimer};
use airship_flyover::engine::{
    FrameLoop, FrameStats, GraphicsBackend, InputState, IntervalTimer, LoopState, ProgramSource, RecordingBackend,
    SceneEvent, WgpuBackend,
};
use airship_flyover::scene::{FlyoverScene, SceneAssets};

#[derive(Parser, Debug)]
#[command(version, about = "Fly an airship over a battlefield at night")]
struct Args {
    /// RON scene configuration; defaults are used if it is missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the scene seed
    #[arg(long)]
    seed: Option<u64>,

    /// Run without a window against the recording backend
    #[arg(long)]
    headless: bool,

    /// Frames to simulate in headless mode
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    write_config: bool,
}

fn scene_program() -> ProgramSource {
    ProgramSource { label: "scene".into(), source: SCENE_SHADER.into() }
}

fn load_frame_loop<B: GraphicsBackend>(
    backend: &mut B,
    config: &SceneConfig,
) -> anyhow::Result<FrameLoop<FlyoverScene>> {
    let assets = SceneAssets::load(&config.assets).context("loading scene assets")?;
    let mut frame_loop = FrameLoop::new(config.max_frame_delta);
    frame_loop
        .load_scene(|textures| FlyoverScene::build(backend, config, assets, &scene_program(), textures))
        .context("building scene")?;
    if let Some(scene) = frame_loop.scene() {
        log::info!("spawned {} entities", scene.entity_count());
    }
    Ok(frame_loop)
}

fn run_headless(config: &SceneConfig, frames: u64) -> anyhow::Result<()> {
    const STEP: f64 = 1.0 / 60.0;

    let mut backend = RecordingBackend::unrecorded();
    let mut frame_loop = load_frame_loop(&mut backend, config)?;
    frame_loop.start_scene();

    let flash_every = (config.flash.period_secs as f64 / STEP).round().max(1.0) as u64;
    let flashes = frame_loop.event_sender();
    let input = InputState::new();
    let viewport = (config.window.width, config.window.height);

    let mut last = FrameStats::default();
    for frame in 0..frames {
        if frame > 0 && frame % flash_every == 0 {
            flashes.send(SceneEvent::ArtilleryFlash)?;
        }
        if let Some(stats) = frame_loop.tick(&mut backend, frame as f64 * STEP, viewport, &input)? {
            last = stats;
        }
    }

    log::info!(
        "headless run: {} frames presented, {} draw calls in the last frame ({} instances), scene time {:.2}s",
        backend.frames_presented(),
        last.draw.draw_calls,
        last.draw.instances,
        last.elapsed
    );
    Ok(())
}

fn grab_cursor(window: &Window, input: &mut InputState) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    match grabbed {
        Ok(()) => {
            window.set_cursor_visible(false);
            input.set_pointer_locked(true);
        }
        Err(e) => log::warn!("cursor grab unavailable: {e}"),
    }
}

fn release_cursor(window: &Window, input: &mut InputState) {
    let _ = window.set_cursor_grab(CursorGrabMode::None);
    window.set_cursor_visible(true);
    input.set_pointer_locked(false);
}

fn overlay_stats(stats: &FrameStats, fps: u32, timer: &FrameTimer, resolution: (u32, u32)) -> DebugStats {
    let (avg, min, max) = timer.summary();
    DebugStats {
        fps,
        frame_time_avg_ms: avg,
        frame_time_min_ms: min,
        frame_time_max_ms: max,
        draw_calls: stats.draw.draw_calls,
        instances: stats.draw.instances,
        resolution,
        camera_target: stats.scene.camera_target,
        camera_distance: stats.scene.camera_distance,
        camera_yaw: stats.scene.camera_yaw,
        camera_pitch: stats.scene.camera_pitch,
        camera_transitioning: stats.scene.camera_transitioning,
        spotlight_on: stats.scene.spotlight_on,
        blink_intensity: stats.scene.blink_intensity,
        shading: stats.scene.shading.name(),
    }
}

fn run_windowed(config: SceneConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(config.window.width, config.window.height));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut backend = pollster::block_on(WgpuBackend::new(
        window.clone(),
        config.window.vsync,
        config.window.clear_color,
    ))?;
    let mut frame_loop = load_frame_loop(&mut backend, &config)?;

    let _flash_timer = IntervalTimer::spawn(
        "flash",
        Duration::from_secs_f32(config.flash.period_secs.max(0.01)),
        frame_loop.event_sender(),
        SceneEvent::ArtilleryFlash,
    )?;

    // Periodic FPS line, fed by the frame loop.
    let mut frame_count = 0u32;
    let mut last_fps_update = Instant::now();
    frame_loop.on_frame(move |stats| {
        frame_count += 1;
        let now = Instant::now();
        if (now - last_fps_update).as_secs_f32() >= 1.0 {
            log::info!(
                "FPS: {} | Draw calls: {} | Instances: {}",
                frame_count,
                stats.draw.draw_calls,
                stats.draw.instances
            );
            frame_count = 0;
            last_fps_update = now;
        }
    });

    let mut input = InputState::new();
    let size = window.inner_size();
    input.window_size = (size.width, size.height);

    let start = Instant::now();
    let mut last_frame = Instant::now();
    let mut frame_timer = FrameTimer::default();
    let mut fps = 0u32;
    let mut fps_frames = 0u32;
    let mut fps_since = Instant::now();

    log::info!("press Enter or click to start, F3 for stats, Escape to quit");

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::DeviceEvent { ref event, .. } => {
                input.process_device_event(event);
            }
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                if backend.handle_window_event(event) {
                    return;
                }
                input.process_event(event);

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(key),
                                repeat: false,
                                ..
                            },
                        ..
                    } => match key {
                        KeyCode::F3 => backend.toggle_overlay(),
                        KeyCode::Enter if frame_loop.state() == LoopState::Ready => {
                            frame_loop.start_scene();
                        }
                        _ => {}
                    },
                    WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                        if frame_loop.state() == LoopState::Ready {
                            frame_loop.start_scene();
                        }
                        if !input.pointer_locked() {
                            grab_cursor(&window, &mut input);
                        }
                    }
                    WindowEvent::Focused(false) => release_cursor(&window, &mut input),
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        frame_timer.push((now - last_frame).as_secs_f32() * 1000.0);
                        last_frame = now;

                        fps_frames += 1;
                        if (now - fps_since).as_secs_f32() >= 1.0 {
                            fps = fps_frames;
                            fps_frames = 0;
                            fps_since = now;
                        }

                        let viewport = input.window_size;
                        match frame_loop.tick(&mut backend, start.elapsed().as_secs_f64(), viewport, &input) {
                            Ok(Some(stats)) => {
                                backend.set_overlay_stats(overlay_stats(&stats, fps, &frame_timer, viewport));
                            }
                            Ok(None) => {}
                            Err(e) => {
                                log::error!("frame failed: {e}");
                                control_flow.exit();
                            }
                        }
                        input.end_frame();
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = SceneConfig::load(&args.config);
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    if args.write_config {
        config.save(&args.config);
        return Ok(());
    }

    if args.headless {
        run_headless(&config, args.frames)
    } else {
        run_windowed(config)
    }
}
