//! wgpu backend: replays recorded frames and paints the egui overlay.

pub mod native;
pub mod overlay;

pub use native::Renderer;
pub use overlay::Overlay;
