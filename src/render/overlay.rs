use egui::{ClippedPrimitive, Context, TexturesDelta, ViewportId};
use winit::event::WindowEvent;
use winit::window::Window;

use crate::ui;

/// egui state for the window plus the wgpu painter that draws it.
pub struct Overlay {
    context: Context,
    state: egui_winit::State,
    painter: egui_wgpu::Renderer,
    pending: Option<PendingPaint>,
}

struct PendingPaint {
    jobs: Vec<ClippedPrimitive>,
    textures: TexturesDelta,
    pixels_per_point: f32,
}

impl Overlay {
    /// Creates the overlay for `window`, painting into `surface_format` targets.
    pub fn new(
        window: &Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        font_scale: f32,
    ) -> Self {
        let context = Context::default();
        ui::apply_style(&context, font_scale);
        let state = egui_winit::State::new(
            context.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );
        let painter = egui_wgpu::Renderer::new(device, surface_format, None, 1);
        Self {
            context,
            state,
            painter,
            pending: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Feeds `event` to egui. Returns true when egui consumed it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// True while the pointer is over a panel or dragging a widget.
    pub fn wants_pointer_input(&self) -> bool {
        self.context.wants_pointer_input()
    }

    /// Runs one UI pass and keeps its output for the next [`Overlay::paint`].
    pub fn run(&mut self, window: &Window, build: impl FnMut(&Context)) {
        let raw_input = self.state.take_egui_input(window);
        let output = self.context.run(raw_input, build);
        self.state
            .handle_platform_output(window, output.platform_output);

        let jobs = self.context.tessellate(output.shapes, output.pixels_per_point);
        let mut textures = output.textures_delta;
        if let Some(previous) = self.pending.take() {
            // A UI pass that never reached the screen still owes its texture updates.
            let mut set = previous.textures.set;
            set.append(&mut textures.set);
            textures.set = set;
            textures.free.extend(previous.textures.free);
        }
        self.pending = Some(PendingPaint {
            jobs,
            textures,
            pixels_per_point: output.pixels_per_point,
        });
    }

    /// Draws the last UI pass on top of `target`.
    ///
    /// Returns the command buffers egui needs submitted before `encoder`.
    pub fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size_in_pixels: [u32; 2],
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };
        for (id, delta) in &pending.textures.set {
            self.painter.update_texture(device, queue, *id, delta);
        }

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: pending.pixels_per_point,
        };
        let commands = self
            .painter
            .update_buffers(device, queue, encoder, &pending.jobs, &screen);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.painter.render(&mut pass, &pending.jobs, &screen);
        }

        for id in &pending.textures.free {
            self.painter.free_texture(id);
        }
        commands
    }
}
