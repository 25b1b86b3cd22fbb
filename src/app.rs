use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use crate::assets::AssetLibrary;
use crate::gfx::{DrawCall, Frame, GraphicsContext};
use crate::input::{Modifiers, MouseButton, PointerEvent, PointerTracker};
use crate::render::{Overlay, Renderer};
use crate::scene::{AreaLightScene, SetupError};
use crate::settings::Settings;
use crate::ui;

/// Wheel deltas reported in pixels are converted to lines with this factor.
const PIXELS_PER_LINE: f32 = 40.0;

/// Opens the window and runs the demo until it is closed.
pub fn run(settings: &Settings, assets: &AssetLibrary) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&settings.title)
            .with_inner_size(LogicalSize::new(
                settings.window_width as f64,
                settings.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), settings))
        .context("failed to initialize renderer")?;
    let overlay = Overlay::new(
        &window,
        renderer.device(),
        renderer.surface_format(),
        settings.font_scale,
    );
    let mut scene = AreaLightScene::setup(assets, settings)?;
    let size = window.inner_size();
    scene.resize(size.width, size.height);

    let mut app = AppState {
        renderer,
        overlay,
        scene,
        gfx: GraphicsContext::new(),
        pointer: PointerTracker::new(),
        last_error: None,
    };

    event_loop.run_on_demand(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, elwt) {
            app.last_error = Some(err);
            elwt.exit();
        }
    })?;

    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Sets the scene up, records one frame without a window and describes it.
pub fn check(settings: &Settings, assets: &AssetLibrary) -> Result<FrameSummary, SetupError> {
    let mut scene = AreaLightScene::setup(assets, settings)?;
    let mut gfx = GraphicsContext::new();
    scene.update();
    scene.render(&mut gfx);
    let frame = gfx.finish_frame();
    Ok(FrameSummary::new(&frame, scene.lights().len()))
}

/// What a recorded frame would put on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub clear_color: Option<[f32; 4]>,
    pub lights: usize,
    pub draws: Vec<DrawSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawSummary {
    pub program: String,
    pub mesh: String,
    pub index_count: u32,
    pub depth_test: bool,
    pub face_culling: bool,
    /// Labels of the textures bound per unit.
    pub textures: Vec<Option<String>>,
}

impl FrameSummary {
    pub fn new(frame: &Frame, lights: usize) -> Self {
        Self {
            clear_color: frame.clear_color,
            lights,
            draws: frame.draws.iter().map(DrawSummary::new).collect(),
        }
    }
}

impl DrawSummary {
    fn new(draw: &DrawCall) -> Self {
        Self {
            program: draw.program.label().to_string(),
            mesh: draw.mesh.label.clone(),
            index_count: draw.mesh.index_count(),
            depth_test: draw.depth_test,
            face_culling: draw.face_culling,
            textures: draw
                .textures
                .iter()
                .map(|texture| texture.as_ref().map(|texture| texture.label().to_string()))
                .collect(),
        }
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Frame: {} draw(s), {} area light(s)",
            self.draws.len(),
            self.lights
        )?;
        for draw in &self.draws {
            let textures: Vec<&str> = draw
                .textures
                .iter()
                .map(|texture| texture.as_deref().unwrap_or("-"))
                .collect();
            writeln!(
                f,
                " - {} on {} ({} indices) depth={} cull={} textures=[{}]",
                draw.program,
                draw.mesh,
                draw.index_count,
                on_off(draw.depth_test),
                on_off(draw.face_culling),
                textures.join(", ")
            )?;
        }
        Ok(())
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

struct AppState {
    renderer: Renderer,
    overlay: Overlay,
    scene: AreaLightScene,
    gfx: GraphicsContext,
    pointer: PointerTracker,
    last_error: Option<anyhow::Error>,
}

/// The window system could not be brought up, e.g. because no display is available.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                if matches!(event, WindowEvent::RedrawRequested) {
                    return self.redraw();
                }
                let consumed = self.overlay.on_window_event(self.renderer.window(), event);
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(*size);
                        self.scene.resize(size.width, size.height);
                    }
                    WindowEvent::ModifiersChanged(modifiers) => {
                        let state = modifiers.state();
                        self.pointer.set_modifiers(Modifiers {
                            shift: state.shift_key(),
                            ctrl: state.control_key(),
                            alt: state.alt_key(),
                        });
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.handle_mouse_button(*state, *button, consumed);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let position = Vec2::new(position.x as f32, position.y as f32);
                        if let Some(drag) = self.pointer.move_to(position) {
                            self.scene.handle_pointer(&drag);
                        }
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        if !consumed && !self.overlay.wants_pointer_input() {
                            let lines = match delta {
                                MouseScrollDelta::LineDelta(_, y) => *y,
                                MouseScrollDelta::PixelDelta(pixels) => {
                                    pixels.y as f32 / PIXELS_PER_LINE
                                }
                            };
                            let wheel = self.pointer.wheel(lines);
                            self.scene.handle_pointer(&wheel);
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    // Presses over the UI stay with the UI. Releases and drags follow
    // whichever side saw the press.
    fn handle_mouse_button(
        &mut self,
        state: ElementState,
        button: winit::event::MouseButton,
        consumed: bool,
    ) {
        let button = match button {
            winit::event::MouseButton::Left => MouseButton::LEFT,
            winit::event::MouseButton::Right => MouseButton::RIGHT,
            winit::event::MouseButton::Middle => MouseButton::MIDDLE,
            _ => return,
        };
        let event: Option<PointerEvent> = match state {
            ElementState::Pressed if consumed || self.overlay.wants_pointer_input() => None,
            ElementState::Pressed => Some(self.pointer.press(button)),
            ElementState::Released => self.pointer.release(button),
        };
        if let Some(event) = event {
            self.scene.handle_pointer(&event);
        }
    }

    fn redraw(&mut self) -> Result<()> {
        self.scene.update();
        self.scene.render(&mut self.gfx);
        let frame = self.gfx.finish_frame();

        let scene = &mut self.scene;
        self.overlay.run(self.renderer.window(), |ctx| {
            let (material, light) = scene.ui_targets();
            ui::area_light_panel(ctx, material, light);
        });

        if let Err(err) = self.renderer.render(&frame, &mut self.overlay) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("surface timeout; retrying next frame");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::{assets_with, BRDF_SOURCE, MESH_SOURCE};
    use crate::scene::{BRDF_SHADER, LTC_AMP_TEXTURE, LTC_MAT_TEXTURE, MESH_SHADER};

    #[test]
    fn check_describes_the_first_frame() {
        let summary = check(
            &Settings::default(),
            &assets_with(BRDF_SOURCE, MESH_SOURCE, true),
        )
        .unwrap();
        assert_eq!(summary.clear_color, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(summary.lights, 1);
        assert_eq!(summary.draws.len(), 2);

        let floor = &summary.draws[0];
        assert_eq!(floor.program, BRDF_SHADER);
        assert_eq!(floor.index_count, 6);
        assert!(floor.depth_test && floor.face_culling);
        assert_eq!(
            floor.textures,
            vec![
                Some(LTC_MAT_TEXTURE.to_string()),
                Some(LTC_AMP_TEXTURE.to_string())
            ]
        );
        // Single-sided proxy keeps back-face culling.
        assert_eq!(summary.draws[1].program, MESH_SHADER);
        assert!(summary.draws[1].face_culling);
    }

    #[test]
    fn summary_lists_each_draw() {
        let summary = check(
            &Settings::default(),
            &assets_with(BRDF_SOURCE, MESH_SOURCE, true),
        )
        .unwrap();
        let text = summary.to_string();
        assert!(text.starts_with("Frame: 2 draw(s), 1 area light(s)\n"));
        assert!(text.contains(&format!(
            "textures=[{LTC_MAT_TEXTURE}, {LTC_AMP_TEXTURE}]"
        )));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn check_reports_shader_failures() {
        let broken = MESH_SOURCE.replace("@vertex", "");
        let err = check(
            &Settings::default(),
            &assets_with(BRDF_SOURCE, &broken, true),
        )
        .unwrap_err();
        assert!(matches!(err, SetupError::Shader(_)));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let err = WindowInitError::from_panic("event loop", Box::new("no display"));
        assert_eq!(err.to_string(), "failed to initialize event loop: no display");
        let err = WindowInitError::from_panic("window", Box::new(7_u8));
        assert_eq!(err.to_string(), "failed to initialize window: unknown panic");
    }
}
