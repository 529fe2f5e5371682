// Frame loop: Loading -> Ready -> Running.
//
// Each Running tick follows a fixed order:
//   1. drain finished textures and queued scene events (timers, host toggles)
//   2. apply orbit/zoom input
//   3. animate (player actor + squads)
//   4. retarget the camera
//   5. update lights
//   6. draw opaque renderables, then blended ones, and present
//   7. notify on_frame callbacks
// Nothing outside this thread touches scene state; timer events and texture
// completions only ever land at step 1.

use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec3;

use super::backend::{BackendError, GraphicsBackend};
use super::input::InputState;
use super::lighting::ShadingMode;
use super::texture::{TextureLoader, TextureOutcome};

/// Side effects posted from outside the frame tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    ArtilleryFlash,
    Spotlight(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No scene attached yet.
    Loading,
    /// Scene built, waiting for start_scene().
    Ready,
    Running,
}

/// What the draw phase submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrawSummary {
    pub draw_calls: u32,
    pub instances: u32,
}

/// Scene state worth reporting after a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneMetrics {
    pub camera_target: Vec3,
    pub camera_distance: f32,
    pub camera_yaw: f32,
    pub camera_pitch: f32,
    pub camera_transitioning: bool,
    pub blink_intensity: f32,
    pub spotlight_on: bool,
    pub shading: ShadingMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame_index: u64,
    /// Clamped delta time of this frame, seconds.
    pub delta: f32,
    /// Scene time: sum of clamped deltas since start_scene(), seconds.
    pub elapsed: f64,
    pub draw: DrawSummary,
    pub scene: SceneMetrics,
}

/// What the frame loop needs from a scene.
pub trait FrameScene {
    fn resolve_textures(&mut self, outcomes: &[TextureOutcome]);
    fn handle_event(&mut self, event: SceneEvent);
    fn apply_input(&mut self, input: &InputState);
    fn animate(&mut self, dt: f32, elapsed: f64, input: &InputState);
    fn update_camera(&mut self);
    fn update_lighting(&mut self, dt: f32);
    fn draw<B: GraphicsBackend>(&mut self, backend: &mut B, aspect: f32) -> Result<DrawSummary, BackendError>;
    fn metrics(&self) -> SceneMetrics;
}

pub type FrameCallback = Box<dyn FnMut(&FrameStats)>;

pub struct FrameLoop<S> {
    state: LoopState,
    scene: Option<S>,
    textures: TextureLoader,
    events_tx: Sender<SceneEvent>,
    events_rx: Receiver<SceneEvent>,
    callbacks: Vec<FrameCallback>,
    max_frame_delta: f32,
    last_timestamp: Option<f64>,
    elapsed: f64,
    frame_index: u64,
    viewport: (u32, u32),
}

impl<S: FrameScene> FrameLoop<S> {
    pub fn new(max_frame_delta: f32) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            state: LoopState::Loading,
            scene: None,
            textures: TextureLoader::new(),
            events_tx,
            events_rx,
            callbacks: Vec::new(),
            max_frame_delta: max_frame_delta.max(0.0),
            last_timestamp: None,
            elapsed: 0.0,
            frame_index: 0,
            viewport: (0, 0),
        }
    }

    /// Build the scene with access to the texture loader. On error the loop
    /// stays in Loading and nothing is attached.
    pub fn load_scene<E>(&mut self, build: impl FnOnce(&mut TextureLoader) -> Result<S, E>) -> Result<(), E> {
        let scene = build(&mut self.textures)?;
        self.attach_scene(scene);
        Ok(())
    }

    pub fn attach_scene(&mut self, scene: S) {
        self.scene = Some(scene);
        self.state = LoopState::Ready;
        log::info!("scene ready ({} textures still loading)", self.textures.in_flight());
    }

    /// Ready -> Running. Returns false in any other state.
    pub fn start_scene(&mut self) -> bool {
        if self.state != LoopState::Ready {
            return false;
        }
        self.state = LoopState::Running;
        self.last_timestamp = None;
        log::info!("scene running");
        true
    }

    /// Queue a spotlight toggle for the start of the next frame.
    pub fn set_spotlight(&self, on: bool) {
        // The receiver lives in self, so this can't fail.
        let _ = self.events_tx.send(SceneEvent::Spotlight(on));
    }

    /// Sender for timers and host UI.
    pub fn event_sender(&self) -> Sender<SceneEvent> {
        self.events_tx.clone()
    }

    pub fn on_frame(&mut self, callback: impl FnMut(&FrameStats) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn state(&self) -> LoopState { self.state }
    pub fn scene(&self) -> Option<&S> { self.scene.as_ref() }
    pub fn scene_mut(&mut self) -> Option<&mut S> { self.scene.as_mut() }
    pub fn textures_mut(&mut self) -> &mut TextureLoader { &mut self.textures }

    /// Run one frame at host timestamp `now` (seconds).
    ///
    /// Returns `Ok(None)` when nothing was drawn: not Running, or a
    /// zero-sized viewport. A backend error is returned as-is; the host
    /// decides whether to stop.
    pub fn tick<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        now: f64,
        viewport: (u32, u32),
        input: &InputState,
    ) -> Result<Option<FrameStats>, BackendError> {
        let Some(scene) = self.scene.as_mut() else {
            return Ok(None);
        };

        let outcomes = self.textures.drain(backend);
        if !outcomes.is_empty() {
            scene.resolve_textures(&outcomes);
        }
        if self.state != LoopState::Running {
            // Flashes posted before the scene runs are stale; toggles still apply.
            while let Ok(event) = self.events_rx.try_recv() {
                if let SceneEvent::Spotlight(_) = event {
                    scene.handle_event(event);
                }
            }
            return Ok(None);
        }

        let dt = match self.last_timestamp {
            Some(last) => ((now - last) as f32).clamp(0.0, self.max_frame_delta),
            None => 0.0,
        };
        self.last_timestamp = Some(now);
        self.elapsed += f64::from(dt);

        while let Ok(event) = self.events_rx.try_recv() {
            scene.handle_event(event);
        }

        scene.apply_input(input);
        scene.animate(dt, self.elapsed, input);
        scene.update_camera();
        scene.update_lighting(dt);

        if viewport.0 == 0 || viewport.1 == 0 {
            return Ok(None);
        }
        if viewport != self.viewport {
            backend.resize(viewport.0, viewport.1);
            self.viewport = viewport;
        }

        backend.begin_frame()?;
        let draw = scene.draw(backend, viewport.0 as f32 / viewport.1 as f32)?;
        backend.end_frame()?;

        let stats = FrameStats {
            frame_index: self.frame_index,
            delta: dt,
            elapsed: self.elapsed,
            draw,
            scene: scene.metrics(),
        };
        self.frame_index += 1;
        for callback in &mut self.callbacks {
            callback(&stats);
        }
        Ok(Some(stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::recording::RecordingBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        events: Vec<SceneEvent>,
        times: Vec<f64>,
    }

    impl FrameScene for Recorder {
        fn resolve_textures(&mut self, _outcomes: &[TextureOutcome]) {
            self.log.push("textures".into());
        }
        fn handle_event(&mut self, event: SceneEvent) {
            self.events.push(event);
            self.log.push("event".into());
        }
        fn apply_input(&mut self, _input: &InputState) {
            self.log.push("input".into());
        }
        fn animate(&mut self, _dt: f32, elapsed: f64, _input: &InputState) {
            self.times.push(elapsed);
            self.log.push("animate".into());
        }
        fn update_camera(&mut self) {
            self.log.push("camera".into());
        }
        fn update_lighting(&mut self, _dt: f32) {
            self.log.push("lighting".into());
        }
        fn draw<B: GraphicsBackend>(&mut self, _backend: &mut B, _aspect: f32) -> Result<DrawSummary, BackendError> {
            self.log.push("draw".into());
            Ok(DrawSummary { draw_calls: 1, instances: 1 })
        }
        fn metrics(&self) -> SceneMetrics {
            SceneMetrics::default()
        }
    }

    #[test]
    fn states_advance_in_order() {
        let mut frames: FrameLoop<Recorder> = FrameLoop::new(0.25);
        assert_eq!(frames.state(), LoopState::Loading);
        assert!(!frames.start_scene());

        let failed: Result<(), &str> = frames.load_scene(|_| Err("bad shader"));
        assert!(failed.is_err());
        assert_eq!(frames.state(), LoopState::Loading);

        let loaded: Result<(), ()> = frames.load_scene(|_| Ok(Recorder::default()));
        assert!(loaded.is_ok());
        assert_eq!(frames.state(), LoopState::Ready);
        assert!(frames.start_scene());
        assert_eq!(frames.state(), LoopState::Running);
    }

    #[test]
    fn ready_scene_does_not_draw() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        let mut backend = RecordingBackend::new();
        let out = frames.tick(&mut backend, 0.0, (640, 480), &InputState::new()).unwrap();
        assert!(out.is_none());
        assert_eq!(backend.frames_presented(), 0);
    }

    #[test]
    fn update_phases_precede_draw() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        frames.start_scene();
        frames.set_spotlight(true);

        let mut backend = RecordingBackend::new();
        frames.tick(&mut backend, 1.0, (640, 480), &InputState::new()).unwrap();

        let scene = frames.scene().unwrap();
        assert_eq!(scene.log, ["event", "input", "animate", "camera", "lighting", "draw"]);
        assert_eq!(scene.events, [SceneEvent::Spotlight(true)]);
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn delta_is_clamped_and_callbacks_fire() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        frames.start_scene();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        frames.on_frame(move |stats| sink.borrow_mut().push((stats.frame_index, stats.delta)));

        let mut backend = RecordingBackend::new();
        let input = InputState::new();
        frames.tick(&mut backend, 10.0, (640, 480), &input).unwrap();
        frames.tick(&mut backend, 10.016, (640, 480), &input).unwrap();
        frames.tick(&mut backend, 25.0, (640, 480), &input).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (0, 0.0));
        assert!((seen[1].1 - 0.016).abs() < 1e-4);
        assert_eq!(seen[2].1, 0.25);
    }

    #[test]
    fn zero_viewport_updates_but_skips_draw() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        frames.start_scene();
        let mut backend = RecordingBackend::new();
        let out = frames.tick(&mut backend, 0.0, (0, 480), &InputState::new()).unwrap();
        assert!(out.is_none());
        assert!(!frames.scene().unwrap().log.contains(&"draw".to_string()));
        assert!(frames.scene().unwrap().log.contains(&"animate".to_string()));
    }

    #[test]
    fn flashes_queued_before_start_are_dropped() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        let sender = frames.event_sender();
        for _ in 0..50 {
            sender.send(SceneEvent::ArtilleryFlash).unwrap();
        }
        frames.set_spotlight(true);

        let mut backend = RecordingBackend::new();
        let input = InputState::new();
        assert!(frames.tick(&mut backend, 0.0, (640, 480), &input).unwrap().is_none());
        assert_eq!(frames.scene().unwrap().events, [SceneEvent::Spotlight(true)]);

        frames.start_scene();
        frames.tick(&mut backend, 0.1, (640, 480), &input).unwrap();
        assert_eq!(frames.scene().unwrap().events, [SceneEvent::Spotlight(true)]);
    }

    #[test]
    fn scene_time_keeps_advancing_after_days() {
        let mut frames = FrameLoop::new(0.25);
        frames.attach_scene(Recorder::default());
        frames.start_scene();
        frames.elapsed = 13.0 * 86_400.0;

        let mut backend = RecordingBackend::new();
        let input = InputState::new();
        for i in 0..=60 {
            frames.tick(&mut backend, f64::from(i) / 60.0, (640, 480), &input).unwrap();
        }
        let times = &frames.scene().unwrap().times;
        let advanced = times[times.len() - 1] - times[0];
        assert!((advanced - 1.0).abs() < 1e-4, "advanced {advanced}s");
        assert!(times.windows(2).skip(1).all(|w| w[1] > w[0]));
    }
}
