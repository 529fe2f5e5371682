use std::collections::VecDeque;

use egui::epaint::Shadow;
use glam::Vec3;
use winit::window::Window;

/// Numbers shown by the F3 panel. Filled by the host from `FrameStats`.
#[derive(Debug, Clone, Default)]
pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub draw_calls: u32,
    pub instances: u32,
    pub resolution: (u32, u32),
    pub camera_target: Vec3,
    pub camera_distance: f32,
    pub camera_yaw: f32,
    pub camera_pitch: f32,
    pub camera_transitioning: bool,
    pub spotlight_on: bool,
    pub blink_intensity: f32,
    pub shading: &'static str,
}

/// Rolling frame-time window feeding the avg/min/max fields.
#[derive(Debug, Default)]
pub struct FrameTimer {
    samples: VecDeque<f32>,
}

impl FrameTimer {
    const WINDOW: usize = 120;

    pub fn push(&mut self, frame_ms: f32) {
        if self.samples.len() == Self::WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(frame_ms);
    }

    /// (avg, min, max) in ms; zeros before the first sample.
    pub fn summary(&self) -> (f32, f32, f32) {
        if self.samples.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        let sum: f32 = self.samples.iter().sum();
        let min = self.samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self.samples.iter().copied().fold(0.0, f32::max);
        (sum / self.samples.len() as f32, min, max)
    }
}

/// F3 stats panel painted on top of the finished scene pass.
pub struct DebugOverlay {
    pub visible: bool,
    ctx: egui::Context,
    winit_state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(window: &Window, device: &wgpu::Device, target_format: wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();
        ctx.set_visuals(panel_visuals());
        ctx.style_mut(|style| style.override_font_id = Some(egui::FontId::monospace(13.0)));

        let winit_state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        // Drawn straight onto the swapchain view: no depth, no MSAA, no dithering.
        let renderer = egui_wgpu::Renderer::new(device, target_format, None, 1, false);

        Self { visible: false, ctx, winit_state, renderer }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> egui_winit::EventResponse {
        self.winit_state.on_window_event(window, event)
    }

    /// Lay out the panel for `stats` and paint it over `view`.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &Window,
        view: &wgpu::TextureView,
        screen: &egui_wgpu::ScreenDescriptor,
        stats: &DebugStats,
    ) {
        let input = self.winit_state.take_egui_input(window);
        let output = self.ctx.run(input, |ctx| {
            egui::Area::new(egui::Id::new("flyover_stats"))
                .fixed_pos(egui::pos2(10.0, 10.0))
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .fill(PANEL_FILL)
                        .inner_margin(egui::Margin::same(8.0))
                        .rounding(4.0)
                        .show(ui, |ui| stats_panel(ui, stats));
                });
        });
        self.winit_state.handle_platform_output(window, output.platform_output);

        let primitives = self.ctx.tessellate(output.shapes, output.pixels_per_point);
        for (id, delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer.update_buffers(device, queue, encoder, &primitives, screen);

        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.renderer.render(&mut pass.forget_lifetime(), &primitives, screen);

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

const PANEL_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);

fn panel_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = PANEL_FILL;
    visuals.window_stroke = egui::Stroke::NONE;
    visuals.window_shadow = Shadow::NONE;
    visuals.override_text_color = Some(egui::Color32::WHITE);
    visuals
}

fn stats_panel(ui: &mut egui::Ui, stats: &DebugStats) {
    ui.label(format!("FPS: {}", stats.fps));
    ui.label(format!(
        "Frame: {:.2} ms (min {:.1} / max {:.1})",
        stats.frame_time_avg_ms, stats.frame_time_min_ms, stats.frame_time_max_ms
    ));
    ui.label(format!("Draws: {}  Instances: {}", stats.draw_calls, stats.instances));
    ui.label(format!("Viewport: {}x{}", stats.resolution.0, stats.resolution.1));
    ui.separator();

    let t = stats.camera_target;
    ui.label(format!("Target: ({:.1}, {:.1}, {:.1})  dist {:.1}", t.x, t.y, t.z, stats.camera_distance));
    let easing = if stats.camera_transitioning { "  easing" } else { "" };
    ui.label(format!("Yaw {:.0}  Pitch {:.0}{easing}", stats.camera_yaw, stats.camera_pitch));
    ui.separator();

    ui.label(format!("Spotlight: {}", if stats.spotlight_on { "on" } else { "off" }));
    ui.label(format!("Artillery: {:.1}", stats.blink_intensity));
    ui.label(format!("Shading: {}", stats.shading));
}
