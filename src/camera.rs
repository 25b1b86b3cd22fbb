//! Perspective camera and the pointer-driven orbit controller.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec2, Vec3};

use crate::input::{Modifiers, MouseButton, PointerEvent};

/// Perspective camera described by its eye, target and vertical field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPersp {
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    eye: Vec3,
    target: Vec3,
    world_up: Vec3,
}

impl CameraPersp {
    /// Camera for a `width` x `height` viewport, looking down -Z from the origin.
    ///
    /// `fov` is the vertical field of view in degrees.
    pub fn new(width: u32, height: u32, fov: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov: 60.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
            eye: Vec3::ZERO,
            target: Vec3::NEG_Z,
            world_up: Vec3::Y,
        };
        camera.set_perspective(fov, width as f32 / height.max(1) as f32, near, far);
        camera
    }

    pub fn set_perspective(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.fov = fov;
        self.near = near;
        self.far = far;
        self.set_aspect_ratio(aspect);
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = target;
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    pub fn near_clip(&self) -> f32 {
        self.near
    }

    pub fn far_clip(&self) -> f32 {
        self.far
    }

    pub fn eye_point(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn view_direction(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.world_up)
    }

    /// Projection with a 0..1 depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }
}

const MAX_ELEVATION: f32 = FRAC_PI_2 - 0.05;
const MIN_DISTANCE: f32 = 0.25;
const TUMBLE_SPEED: f32 = 0.01;
const PAN_SPEED: f32 = 0.002;
const DOLLY_SPEED: f32 = 0.01;
const WHEEL_STEP: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Orbit {
    pivot: Vec3,
    distance: f32,
    azimuth: f32,
    elevation: f32,
}

impl Orbit {
    fn from_camera(camera: &CameraPersp) -> Self {
        let offset = camera.eye_point() - camera.target();
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            pivot: camera.target(),
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance)
                .clamp(-1.0, 1.0)
                .asin()
                .clamp(-MAX_ELEVATION, MAX_ELEVATION),
        }
    }

    fn eye(&self) -> Vec3 {
        let (sin_el, cos_el) = self.elevation.sin_cos();
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        self.pivot + self.distance * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    fn apply(&self, camera: &mut CameraPersp) {
        camera.look_at(self.eye(), self.pivot);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Tumble,
    Pan,
    Dolly,
}

impl Action {
    fn for_button(button: MouseButton, modifiers: Modifiers) -> Option<Self> {
        match button {
            MouseButton::LEFT if modifiers.shift => Some(Action::Pan),
            MouseButton::LEFT if modifiers.ctrl => Some(Action::Dolly),
            MouseButton::LEFT => Some(Action::Tumble),
            MouseButton::MIDDLE => Some(Action::Pan),
            MouseButton::RIGHT => Some(Action::Dolly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    button: MouseButton,
    action: Action,
    start: Vec2,
    initial: Orbit,
}

/// Orbit controller: left drag tumbles, middle or shift-left drag pans,
/// right or ctrl-left drag and the wheel dolly.
#[derive(Debug, Default)]
pub struct CameraUi {
    gesture: Option<Gesture>,
}

impl CameraUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a drag gesture is moving the camera.
    pub fn is_dragging(&self) -> bool {
        self.gesture.is_some()
    }

    /// Updates `camera` in response to `event`.
    pub fn handle(&mut self, camera: &mut CameraPersp, event: &PointerEvent) {
        match *event {
            PointerEvent::Down {
                button,
                position,
                modifiers,
            } => {
                self.gesture = Action::for_button(button, modifiers).map(|action| Gesture {
                    button,
                    action,
                    start: position,
                    initial: Orbit::from_camera(camera),
                });
            }
            PointerEvent::Drag { position, .. } => {
                if let Some(gesture) = self.gesture {
                    let orbit = drag(&gesture, camera, position - gesture.start);
                    orbit.apply(camera);
                }
            }
            PointerEvent::Up { button, .. } => {
                if self.gesture.is_some_and(|gesture| gesture.button == button) {
                    self.gesture = None;
                }
            }
            PointerEvent::Wheel { delta, .. } => {
                let mut orbit = Orbit::from_camera(camera);
                orbit.distance = (orbit.distance * WHEEL_STEP.powf(delta)).max(MIN_DISTANCE);
                orbit.apply(camera);
            }
        }
    }
}

fn drag(gesture: &Gesture, camera: &CameraPersp, delta: Vec2) -> Orbit {
    let mut orbit = gesture.initial;
    match gesture.action {
        Action::Tumble => {
            orbit.azimuth -= delta.x * TUMBLE_SPEED;
            orbit.elevation =
                (orbit.elevation + delta.y * TUMBLE_SPEED).clamp(-MAX_ELEVATION, MAX_ELEVATION);
        }
        Action::Pan => {
            let forward = (orbit.pivot - orbit.eye()).normalize_or_zero();
            let right = forward.cross(camera.world_up()).normalize_or_zero();
            let up = right.cross(forward);
            let scale = orbit.distance * PAN_SPEED;
            orbit.pivot += (up * delta.y - right * delta.x) * scale;
        }
        Action::Dolly => {
            orbit.distance = (orbit.distance * (delta.y * DOLLY_SPEED).exp()).max(MIN_DISTANCE);
        }
    }
    orbit
}
