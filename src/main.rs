use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::error;

use ltc_area_light::app::{self, WindowInitError};
use ltc_area_light::settings::DEFAULT_ASSETS_ROOT;
use ltc_area_light::{AssetLibrary, SetupError, Settings};

/// Rectangular area lights shaded with Linearly Transformed Cosines.
#[derive(Debug, Parser)]
#[command(name = "ltc-area-light", version, about)]
struct Cli {
    /// Directory holding `shaders/` and `textures/`.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_ASSETS_ROOT)]
    assets: PathBuf,
    /// Window width in logical pixels.
    #[arg(long, default_value_t = 1200)]
    width: u32,
    /// Window height in logical pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,
    /// Requested MSAA sample count.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=16))]
    msaa: u32,
    /// Set the scene up and record one frame without opening a window.
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            window_width: self.width,
            window_height: self.height,
            msaa_samples: self.msaa,
            assets_root: self.assets.clone(),
            ..Settings::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        match err.downcast_ref::<SetupError>() {
            Some(shader_err @ SetupError::Shader(_)) => error!("{shader_err}"),
            _ => eprintln!("Error: {err:?}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings();
    let assets = AssetLibrary::open(&settings.assets_root);

    if cli.check {
        return run_check(&settings, &assets);
    }
    match app::run(&settings, &assets) {
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --check mode (set DISPLAY or WAYLAND_DISPLAY to open a window)."
            );
            run_check(&settings, &assets)
        }
        result => result,
    }
}

fn run_check(settings: &Settings, assets: &AssetLibrary) -> Result<()> {
    let summary = app::check(settings, assets)?;
    print!("{summary}");
    Ok(())
}
