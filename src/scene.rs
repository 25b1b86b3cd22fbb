use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::info;
use thiserror::Error;

use crate::assets::{AssetError, AssetLibrary};
use crate::camera::{CameraPersp, CameraUi};
use crate::dds::{DdsError, DdsImage};
use crate::gfx::{
    Batch, GraphicsContext, InternalFormat, MeshData, ShaderError, ShaderProgram, Texture2d,
    TextureFormat,
};
use crate::input::PointerEvent;
use crate::light::AreaLight;
use crate::material::PbrMaterial;
use crate::settings::Settings;

pub const BRDF_SHADER: &str = "shaders/area_light_brdf.wgsl";
pub const MESH_SHADER: &str = "shaders/area_light_mesh.wgsl";
pub const LTC_MAT_TEXTURE: &str = "textures/ltc_mat_64.dds";
pub const LTC_AMP_TEXTURE: &str = "textures/ltc_amp_64.dds";

/// Texture unit the LTC matrix table is bound to.
pub const LTC_MAT_UNIT: usize = 0;
/// Texture unit the LTC amplitude table is bound to.
pub const LTC_AMP_UNIT: usize = 1;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const FLOOR_SCALE: f32 = 10.0;

#[derive(Debug, Error)]
pub enum SetupError {
    /// Fatal: the demo cannot run without both programs.
    #[error("could not compile shader: {0}")]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("invalid lookup table {name}")]
    Texture {
        name: String,
        #[source]
        source: DdsError,
    },
}

/// The demo scene: a lit floor, its area lights and the orbiting camera.
#[derive(Debug)]
pub struct AreaLightScene {
    brdf: Arc<ShaderProgram>,
    floor: Batch,
    floor_material: PbrMaterial,
    lights: Vec<AreaLight>,
    ltc_mat: Arc<Texture2d>,
    ltc_amp: Arc<Texture2d>,
    camera: CameraPersp,
    camera_ui: CameraUi,
}

impl AreaLightScene {
    /// Compiles the programs, builds the geometry and loads the lookup tables.
    pub fn setup(assets: &AssetLibrary, settings: &Settings) -> Result<Self, SetupError> {
        let brdf = ShaderProgram::compile(BRDF_SHADER, &assets.load_text(BRDF_SHADER)?)?;
        brdf.expect_texture_unit("ltc_mat", LTC_MAT_UNIT as u32)?;
        brdf.expect_texture_unit("ltc_amp", LTC_AMP_UNIT as u32)?;
        let light_mesh = ShaderProgram::compile(MESH_SHADER, &assets.load_text(MESH_SHADER)?)?;

        let floor = Batch::new(MeshData::plane().scaled(FLOOR_SCALE), Arc::clone(&brdf));
        let floor_material = PbrMaterial::new()
            .with_base_color(Vec3::new(1.0, 0.9, 0.8))
            .with_metalness(0.0)
            .with_roughness(0.3)
            .with_f0(0.9);
        let lights = vec![AreaLight::builder()
            .visual(Some(light_mesh))
            .color(Vec3::new(0.0, 1.0, 1.0))
            .transform(
                Mat4::from_translation(Vec3::new(0.0, 1.5, 0.0))
                    * Mat4::from_rotation_x(FRAC_PI_2)
                    * Mat4::from_scale(Vec3::new(0.5, 1.0, 1.0)),
            )
            .build()];

        let ltc_amp = load_table(assets, LTC_AMP_TEXTURE, InternalFormat::Rg32Float)?;
        let ltc_mat = load_table(assets, LTC_MAT_TEXTURE, InternalFormat::Rgba32Float)?;

        let mut camera = CameraPersp::new(
            settings.window_width,
            settings.window_height,
            90.0,
            0.1,
            1000.0,
        );
        camera.look_at(Vec3::new(5.0, 5.0, 2.5), Vec3::ZERO);

        info!("scene ready with {} area light(s)", lights.len());
        Ok(Self {
            brdf,
            floor,
            floor_material,
            lights,
            ltc_mat,
            ltc_amp,
            camera,
            camera_ui: CameraUi::new(),
        })
    }

    /// Pushes light and camera state into the floor program.
    ///
    /// The floor program has a single light slot, so the last light wins.
    pub fn update(&mut self) {
        for light in &self.lights {
            self.brdf
                .uniform("light_vertices", light.transformed_vertices());
            self.brdf.uniform("light_color", light.color);
            self.brdf.uniform("light_intensity", light.intensity);
            self.brdf.uniform("double_sided", light.double_sided);
        }
        self.brdf.uniform("camera_pos", self.camera.eye_point());
    }

    /// Records the floor and light proxies into `gfx`.
    pub fn render(&self, gfx: &mut GraphicsContext) {
        gfx.clear(CLEAR_COLOR);

        let mut matrices = gfx.scoped_matrices();
        matrices.set_matrices(&self.camera);

        let mut depth = matrices.scoped_depth(true);
        let mut culling = depth.scoped_face_culling(true);

        let mut mat_bind = culling.scoped_texture_bind(LTC_MAT_UNIT, &self.ltc_mat);
        let mut textures = mat_bind.scoped_texture_bind(LTC_AMP_UNIT, &self.ltc_amp);

        self.floor_material
            .update_uniforms(Some(self.floor.program().as_ref()));
        textures.draw(&self.floor);

        for light in &self.lights {
            light.draw(&mut textures);
        }
    }

    /// Routes pointer input to the orbit controller.
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        self.camera_ui.handle(&mut self.camera, event);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.camera.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    pub fn camera(&self) -> &CameraPersp {
        &self.camera
    }

    pub fn brdf_program(&self) -> &Arc<ShaderProgram> {
        &self.brdf
    }

    pub fn ltc_textures(&self) -> (&Arc<Texture2d>, &Arc<Texture2d>) {
        (&self.ltc_mat, &self.ltc_amp)
    }

    pub fn material(&self) -> &PbrMaterial {
        &self.floor_material
    }

    pub fn material_mut(&mut self) -> &mut PbrMaterial {
        &mut self.floor_material
    }

    pub fn lights(&self) -> &[AreaLight] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut Vec<AreaLight> {
        &mut self.lights
    }

    /// The fields the UI panel edits: the floor material and the first light.
    pub fn ui_targets(&mut self) -> (&mut PbrMaterial, Option<&mut AreaLight>) {
        (&mut self.floor_material, self.lights.first_mut())
    }
}

fn load_table(
    assets: &AssetLibrary,
    name: &str,
    internal_format: InternalFormat,
) -> Result<Arc<Texture2d>, SetupError> {
    let bytes = assets.load(name)?;
    let image = DdsImage::parse(&bytes).map_err(|source| SetupError::Texture {
        name: name.to_string(),
        source,
    })?;
    Ok(Texture2d::from_dds(
        name,
        &image,
        TextureFormat::new(internal_format),
    ))
}
