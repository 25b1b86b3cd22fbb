use std::path::PathBuf;

/// Asset directory shipped next to the crate manifest.
pub const DEFAULT_ASSETS_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

/// Startup configuration for the window, renderer and UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub title: String,
    /// Window size in logical pixels.
    pub window_width: u32,
    pub window_height: u32,
    /// Requested MSAA sample count; the renderer falls back to what the GPU supports.
    pub msaa_samples: u32,
    pub font_scale: f32,
    pub assets_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "LTC Area Light".to_string(),
            window_width: 1200,
            window_height: 600,
            msaa_samples: 8,
            font_scale: 1.5,
            assets_root: PathBuf::from(DEFAULT_ASSETS_ROOT),
        }
    }
}
