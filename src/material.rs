use glam::Vec3;

use crate::gfx::ShaderProgram;

/// Surface parameters of the lit floor. Values are passed to the shader as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PbrMaterial {
    pub base_color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub f0: f32,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            metalness: 0.0,
            roughness: 0.0,
            f0: 1.0,
        }
    }
}

impl PbrMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_color(mut self, base_color: Vec3) -> Self {
        self.base_color = base_color;
        self
    }

    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_f0(mut self, f0: f32) -> Self {
        self.f0 = f0;
        self
    }

    /// Pushes the material into `program`; does nothing without one.
    pub fn update_uniforms(&self, program: Option<&ShaderProgram>) {
        let Some(program) = program else {
            return;
        };
        program.uniform("base_color", self.base_color);
        program.uniform("metalness", self.metalness);
        program.uniform("roughness", self.roughness);
        program.uniform("f0", self.f0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::UniformValue;

    const MATERIAL_SHADER: &str = r#"
struct Transforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
};

struct Material {
    base_color: vec3<f32>,
    metalness: f32,
    roughness: f32,
    f0: f32,
};

@group(0) @binding(0) var<uniform> transforms: Transforms;
@group(0) @binding(1) var<uniform> material: Material;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return transforms.view_proj * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(material.base_color * material.metalness, material.roughness + material.f0);
}
"#;

    #[test]
    fn update_without_program_is_a_no_op() {
        PbrMaterial::default().update_uniforms(None);
    }

    #[test]
    fn out_of_range_values_pass_through() {
        let program = ShaderProgram::compile("material", MATERIAL_SHADER).unwrap();
        let material = PbrMaterial::new()
            .with_base_color(Vec3::new(1.0, 0.9, 0.8))
            .with_metalness(1.5)
            .with_roughness(-0.25)
            .with_f0(0.9);
        material.update_uniforms(Some(&program));

        assert_eq!(
            program.uniform_value("base_color"),
            Some(UniformValue::Vec3(Vec3::new(1.0, 0.9, 0.8)))
        );
        assert_eq!(program.uniform_value("metalness"), Some(UniformValue::F32(1.5)));
        assert_eq!(program.uniform_value("roughness"), Some(UniformValue::F32(-0.25)));
        assert_eq!(program.uniform_value("f0"), Some(UniformValue::F32(0.9)));
    }

    #[test]
    fn defaults_match_a_white_dielectric() {
        let material = PbrMaterial::default();
        assert_eq!(material.base_color, Vec3::ONE);
        assert_eq!((material.metalness, material.roughness, material.f0), (0.0, 0.0, 1.0));
    }
}
