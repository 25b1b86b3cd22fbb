//! Interactive demo of rectangular area lights shaded with Linearly
//! Transformed Cosines.
//!
//! Scene, camera, material and UI logic is written against the recording
//! [`gfx::GraphicsContext`], so everything up to the final GPU submission
//! runs and tests without a window. [`render::Renderer`] replays the
//! recorded frames through wgpu and [`app::run`] ties it to a winit window.

pub mod app;
pub mod assets;
pub mod camera;
pub mod dds;
pub mod gfx;
pub mod input;
pub mod light;
pub mod material;
pub mod render;
pub mod scene;
pub mod settings;
pub mod ui;

pub use assets::{AssetError, AssetLibrary};
pub use camera::{CameraPersp, CameraUi};
pub use dds::{DdsError, DdsImage};
pub use gfx::{Batch, GraphicsContext, MeshData, ShaderError, ShaderProgram, Texture2d};
pub use input::{Modifiers, MouseButton, PointerEvent, PointerTracker};
pub use light::{AreaLight, AreaLightBuilder};
pub use material::PbrMaterial;
pub use render::{Overlay, Renderer};
pub use scene::{AreaLightScene, SetupError};
pub use settings::Settings;
