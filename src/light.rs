use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::gfx::{Batch, GraphicsContext, MeshData, ShaderProgram};

/// Corners of the unit quad the light covers before its transform.
///
/// The order fixes the winding the BRDF integration relies on.
pub const LOCAL_CORNERS: [Vec3; 4] = [
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, -1.0),
    Vec3::new(-1.0, 0.0, -1.0),
    Vec3::new(-1.0, 0.0, 1.0),
];

/// A rectangular area light with an optional visible proxy.
#[derive(Debug, Clone)]
pub struct AreaLight {
    pub color: Vec3,
    pub intensity: f32,
    pub double_sided: bool,
    transform: Mat4,
    visual: Option<Batch>,
}

impl AreaLight {
    pub fn builder() -> AreaLightBuilder {
        AreaLightBuilder::default()
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Program drawing the proxy quad, if the light has one.
    pub fn visual(&self) -> Option<&Arc<ShaderProgram>> {
        self.visual.as_ref().map(Batch::program)
    }

    /// World-space corners of the light quad.
    pub fn transformed_vertices(&self) -> [Vec3; 4] {
        LOCAL_CORNERS.map(|corner| self.transform.transform_point3(corner))
    }

    /// Draws the proxy quad; does nothing when the light has no visual.
    pub fn draw(&self, gfx: &mut GraphicsContext) {
        let Some(batch) = &self.visual else {
            return;
        };
        let program = batch.program();
        program.uniform("light_color", self.color);
        program.uniform("light_intensity", self.intensity);

        let mut culling = gfx.scoped_face_culling(!self.double_sided);
        let mut model = culling.scoped_model_matrix();
        model.mult_model_matrix(self.transform);
        model.draw(batch);
    }
}

/// Collects light parameters; unset fields keep their defaults.
#[derive(Debug, Clone)]
pub struct AreaLightBuilder {
    color: Vec3,
    intensity: f32,
    double_sided: bool,
    transform: Mat4,
    visual: Option<Arc<ShaderProgram>>,
}

impl Default for AreaLightBuilder {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            double_sided: false,
            transform: Mat4::IDENTITY,
            visual: None,
        }
    }
}

impl AreaLightBuilder {
    /// Program used to draw the proxy quad. `None` leaves the light invisible.
    pub fn visual(mut self, program: Option<Arc<ShaderProgram>>) -> Self {
        self.visual = program;
        self
    }

    pub fn color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn build(self) -> AreaLight {
        AreaLight {
            color: self.color,
            intensity: self.intensity,
            double_sided: self.double_sided,
            transform: self.transform,
            visual: self
                .visual
                .map(|program| Batch::new(MeshData::plane(), program)),
        }
    }
}
