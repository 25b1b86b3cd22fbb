use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::{Vec3, Vec4};
use log::{debug, info, warn};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ArraySize, Module, ScalarKind, TypeInner, VectorSize};
use parking_lot::Mutex;
use thiserror::Error;

use super::next_resource_id;

/// Bind group holding the transforms and the program's uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Binding of the per-draw transform block.
pub const TRANSFORMS_BINDING: u32 = 0;
/// Binding of the program's own uniform block.
pub const UNIFORM_BLOCK_BINDING: u32 = 1;
/// Bind group holding texture units; unit `n` uses bindings `2n` and `2n + 1`.
pub const TEXTURE_GROUP: u32 = 1;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to parse {program}:\n{message}")]
    Parse { program: String, message: String },
    #[error("{program} failed validation:\n{message}")]
    Validation { program: String, message: String },
    #[error("{program} has no entry point named {name}")]
    MissingEntryPoint { program: String, name: &'static str },
    #[error("{program} declares no uniform block at @group(0) @binding(1)")]
    MissingUniformBlock { program: String },
    #[error(
        "{program}: texture {name} must be bound to unit {unit} (@group(1) @binding({expected})), found {found:?}"
    )]
    TextureUnit {
        program: String,
        name: String,
        unit: u32,
        expected: u32,
        found: Option<u32>,
    },
}

/// Type of a member of a program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    F32,
    I32,
    U32,
    Vec3,
    Vec4,
    Vec3Array { len: u32, stride: u32 },
}

/// A value written into, or read back from, a uniform block.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    U32(u32),
    /// Stored as a `u32` since WGSL uniforms cannot hold `bool`.
    Bool(bool),
    Vec3(Vec3),
    Vec4(Vec4),
    Vec3Array(Vec<Vec3>),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<&[Vec3]> for UniformValue {
    fn from(value: &[Vec3]) -> Self {
        Self::Vec3Array(value.to_vec())
    }
}

impl<const N: usize> From<[Vec3; N]> for UniformValue {
    fn from(value: [Vec3; N]) -> Self {
        Self::Vec3Array(value.to_vec())
    }
}

/// Location of one member inside the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub offset: u32,
    pub kind: UniformKind,
}

/// Reflected layout of the struct bound at `@group(0) @binding(1)`.
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    size: u32,
    fields: BTreeMap<String, UniformField>,
}

impl UniformLayout {
    /// Size in bytes of the whole block, padding included.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn field(&self, name: &str) -> Option<UniformField> {
        self.fields.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Decodes the member `name` from a copy of the block.
    pub fn read(&self, bytes: &[u8], name: &str) -> Option<UniformValue> {
        let field = self.field(name)?;
        let at = field.offset as usize;
        let value = match field.kind {
            UniformKind::F32 => UniformValue::F32(read_pod(bytes, at)?),
            UniformKind::I32 => UniformValue::I32(read_pod(bytes, at)?),
            UniformKind::U32 => UniformValue::U32(read_pod(bytes, at)?),
            UniformKind::Vec3 => UniformValue::Vec3(Vec3::from_array(read_pod(bytes, at)?)),
            UniformKind::Vec4 => UniformValue::Vec4(Vec4::from_array(read_pod(bytes, at)?)),
            UniformKind::Vec3Array { len, stride } => {
                let mut items = Vec::with_capacity(len as usize);
                for index in 0..len as usize {
                    let item: [f32; 3] = read_pod(bytes, at + index * stride as usize)?;
                    items.push(Vec3::from_array(item));
                }
                UniformValue::Vec3Array(items)
            }
        };
        Some(value)
    }

    fn write(&self, bytes: &mut [u8], field: UniformField, value: &UniformValue) -> bool {
        let at = field.offset as usize;
        match (field.kind, value) {
            (UniformKind::F32, UniformValue::F32(v)) => write_pod(bytes, at, v),
            (UniformKind::I32, UniformValue::I32(v)) => write_pod(bytes, at, v),
            (UniformKind::U32, UniformValue::U32(v)) => write_pod(bytes, at, v),
            (UniformKind::U32, UniformValue::Bool(v)) => write_pod(bytes, at, &u32::from(*v)),
            (UniformKind::Vec3, UniformValue::Vec3(v)) => write_pod(bytes, at, &v.to_array()),
            (UniformKind::Vec4, UniformValue::Vec4(v)) => write_pod(bytes, at, &v.to_array()),
            (UniformKind::Vec3Array { len, stride }, UniformValue::Vec3Array(items))
                if items.len() <= len as usize =>
            {
                for (index, item) in items.iter().enumerate() {
                    write_pod(bytes, at + index * stride as usize, &item.to_array());
                }
            }
            _ => return false,
        }
        true
    }
}

fn read_pod<T: bytemuck::Pod>(bytes: &[u8], at: usize) -> Option<T> {
    let end = at + std::mem::size_of::<T>();
    bytes.get(at..end).map(bytemuck::pod_read_unaligned)
}

// Offsets come from the reflected layout, which fits inside the block.
fn write_pod<T: bytemuck::Pod>(bytes: &mut [u8], at: usize, value: &T) {
    let src = bytemuck::bytes_of(value);
    bytes[at..at + src.len()].copy_from_slice(src);
}

/// A validated WGSL program plus the CPU copy of its uniform block.
#[derive(Debug)]
pub struct ShaderProgram {
    id: u64,
    label: String,
    source: String,
    layout: UniformLayout,
    textures: HashMap<String, u32>,
    uniforms: Mutex<Vec<u8>>,
}

impl ShaderProgram {
    /// Parses and validates `source`, reflecting its uniform block and textures.
    pub fn compile(label: &str, source: &str) -> Result<Arc<Self>, ShaderError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|err| ShaderError::Parse {
            program: label.to_string(),
            message: err.emit_to_string(source),
        })?;
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|err| ShaderError::Validation {
                program: label.to_string(),
                message: err.emit_to_string(source),
            })?;

        for name in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
            if !module.entry_points.iter().any(|entry| entry.name == name) {
                return Err(ShaderError::MissingEntryPoint {
                    program: label.to_string(),
                    name,
                });
            }
        }

        let layout = reflect_uniform_block(&module).ok_or_else(|| ShaderError::MissingUniformBlock {
            program: label.to_string(),
        })?;
        let textures = reflect_textures(&module);
        info!(
            "compiled shader {label} ({} uniforms, {} textures)",
            layout.fields.len(),
            textures.len()
        );

        Ok(Arc::new(Self {
            id: next_resource_id(),
            label: label.to_string(),
            source: source.to_string(),
            uniforms: Mutex::new(vec![0; layout.size as usize]),
            layout,
            textures,
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// WGSL source the program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Writes `value` into the uniform named `name`.
    ///
    /// Unknown names and mismatched types are logged and ignored.
    pub fn uniform(&self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(field) = self.layout.field(name) else {
            warn!("{}: no active uniform named {name}", self.label);
            return;
        };
        let mut bytes = self.uniforms.lock();
        if !self.layout.write(&mut bytes, field, &value) {
            warn!(
                "{}: uniform {name} is {:?}, ignoring {value:?}",
                self.label, field.kind
            );
        }
    }

    /// Current value of the uniform named `name`.
    pub fn uniform_value(&self, name: &str) -> Option<UniformValue> {
        self.layout.read(&self.uniforms.lock(), name)
    }

    /// Copy of the whole uniform block.
    pub fn uniform_bytes(&self) -> Vec<u8> {
        self.uniforms.lock().clone()
    }

    /// Binding of the texture named `name` inside the texture group.
    pub fn texture_binding(&self, name: &str) -> Option<u32> {
        self.textures.get(name).copied()
    }

    /// Checks that the texture `name` samples from texture unit `unit`.
    pub fn expect_texture_unit(&self, name: &str, unit: u32) -> Result<(), ShaderError> {
        let expected = unit * 2;
        let found = self.texture_binding(name);
        if found == Some(expected) {
            return Ok(());
        }
        Err(ShaderError::TextureUnit {
            program: self.label.clone(),
            name: name.to_string(),
            unit,
            expected,
            found,
        })
    }
}

fn reflect_uniform_block(module: &Module) -> Option<UniformLayout> {
    let (_, global) = module.global_variables.iter().find(|(_, global)| {
        global.space == AddressSpace::Uniform
            && global.binding.as_ref().is_some_and(|binding| {
                binding.group == UNIFORM_GROUP && binding.binding == UNIFORM_BLOCK_BINDING
            })
    })?;
    let TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
        return None;
    };

    let mut fields = BTreeMap::new();
    for member in members {
        let Some(name) = member.name.as_ref() else {
            continue;
        };
        match uniform_kind(module, &module.types[member.ty].inner) {
            Some(kind) => {
                fields.insert(
                    name.clone(),
                    UniformField {
                        offset: member.offset,
                        kind,
                    },
                );
            }
            None => debug!("uniform {name} has a type the CPU side cannot write"),
        }
    }
    Some(UniformLayout {
        size: *span,
        fields,
    })
}

fn uniform_kind(module: &Module, inner: &TypeInner) -> Option<UniformKind> {
    let kind = match *inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => UniformKind::F32,
            ScalarKind::Sint => UniformKind::I32,
            ScalarKind::Uint => UniformKind::U32,
            _ => return None,
        },
        TypeInner::Vector { size, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            match size {
                VectorSize::Tri => UniformKind::Vec3,
                VectorSize::Quad => UniformKind::Vec4,
                VectorSize::Bi => return None,
            }
        }
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            stride,
        } => match uniform_kind(module, &module.types[base].inner)? {
            UniformKind::Vec3 => UniformKind::Vec3Array {
                len: len.get(),
                stride,
            },
            _ => return None,
        },
        _ => return None,
    };
    Some(kind)
}

fn reflect_textures(module: &Module) -> HashMap<String, u32> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, global)| {
            let binding = global.binding.as_ref()?;
            let is_image = matches!(module.types[global.ty].inner, TypeInner::Image { .. });
            if binding.group != TEXTURE_GROUP || !is_image {
                return None;
            }
            Some((global.name.clone()?, binding.binding))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::tests::{test_program, TEST_SHADER};

    const TEXTURED_SHADER: &str = r#"
struct Transforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
};

struct Params {
    corners: array<vec3<f32>, 4>,
    enabled: u32,
    bias: i32,
};

@group(0) @binding(0) var<uniform> transforms: Transforms;
@group(0) @binding(1) var<uniform> params: Params;
@group(1) @binding(0) var first: texture_2d<f32>;
@group(1) @binding(1) var first_sampler: sampler;
@group(1) @binding(2) var second: texture_2d<f32>;
@group(1) @binding(3) var second_sampler: sampler;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return transforms.view_proj * vec4<f32>(position + params.corners[0], 1.0);
}

@fragment
fn fs_main(@builtin(position) coord: vec4<f32>) -> @location(0) vec4<f32> {
    let uv = coord.xy / 64.0;
    let a = textureSample(first, first_sampler, uv);
    let b = textureSample(second, second_sampler, uv);
    return a + b * f32(params.enabled) + vec4<f32>(f32(params.bias));
}
"#;

    #[test]
    fn reflects_uniform_block() {
        let program = test_program();
        let layout = program.layout();
        assert_eq!(layout.size(), 16);
        assert_eq!(
            layout.field("tint"),
            Some(UniformField {
                offset: 0,
                kind: UniformKind::Vec3
            })
        );
        assert_eq!(
            layout.field("strength"),
            Some(UniformField {
                offset: 12,
                kind: UniformKind::F32
            })
        );
        assert_eq!(program.uniform_bytes().len(), 16);
    }

    #[test]
    fn writes_and_reads_back_values() {
        let program = ShaderProgram::compile("textured", TEXTURED_SHADER).unwrap();
        let corners = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE];
        program.uniform("corners", corners);
        program.uniform("enabled", true);
        program.uniform("bias", -3);

        assert_eq!(
            program.uniform_value("corners"),
            Some(UniformValue::Vec3Array(corners.to_vec()))
        );
        assert_eq!(program.uniform_value("enabled"), Some(UniformValue::U32(1)));
        assert_eq!(program.uniform_value("bias"), Some(UniformValue::I32(-3)));
        assert_eq!(
            program.layout().field("corners").map(|f| f.kind),
            Some(UniformKind::Vec3Array { len: 4, stride: 16 })
        );
    }

    #[test]
    fn unknown_names_and_mismatched_types_are_ignored() {
        let program = test_program();
        program.uniform("strength", 1.5f32);
        program.uniform("missing", 2.0f32);
        program.uniform("strength", Vec3::ONE);
        assert_eq!(program.uniform_value("strength"), Some(UniformValue::F32(1.5)));
        assert_eq!(program.uniform_value("missing"), None);
    }

    #[test]
    fn texture_units_follow_binding_pairs() {
        let program = ShaderProgram::compile("textured", TEXTURED_SHADER).unwrap();
        assert!(program.expect_texture_unit("first", 0).is_ok());
        assert!(program.expect_texture_unit("second", 1).is_ok());
        assert!(matches!(
            program.expect_texture_unit("second", 0),
            Err(ShaderError::TextureUnit {
                found: Some(2),
                expected: 0,
                ..
            })
        ));
        assert!(matches!(
            program.expect_texture_unit("third", 1),
            Err(ShaderError::TextureUnit { found: None, .. })
        ));
    }

    #[test]
    fn parse_errors_carry_the_diagnostic() {
        let broken = TEST_SHADER.replace("return vec4<f32>(params.tint", "return vec4<f32>(params.nope");
        match ShaderProgram::compile("broken", &broken) {
            Err(ShaderError::Parse { program, message }) => {
                assert_eq!(program, "broken");
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn programs_need_a_uniform_block_and_entry_points() {
        let no_block = r#"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
"#;
        assert!(matches!(
            ShaderProgram::compile("no-block", no_block),
            Err(ShaderError::MissingUniformBlock { .. })
        ));

        let no_fragment = TEST_SHADER.replace("fn fs_main", "fn fragment_main");
        assert!(matches!(
            ShaderProgram::compile("no-fragment", &no_fragment),
            Err(ShaderError::MissingEntryPoint { name: "fs_main", .. })
        ));
    }
}
