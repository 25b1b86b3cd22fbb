//! Immediate-mode graphics state.
//!
//! `GraphicsContext` mirrors the classic bind-then-draw model: matrices,
//! depth testing, face culling and texture units are set on the context and
//! every `draw` snapshots them into a [`DrawCall`]. The recorded [`Frame`] is
//! replayed on the GPU by [`crate::render::Renderer`], which keeps everything
//! in this module free of any device and usable from headless tools.

pub mod mesh;
pub mod shader;
pub mod texture;

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use log::warn;

use crate::camera::CameraPersp;

pub use mesh::{Batch, MeshData, Vertex};
pub use shader::{ShaderError, ShaderProgram, UniformKind, UniformValue};
pub use texture::{Filter, InternalFormat, Texture2d, TextureFormat, Wrap};

/// Number of texture units a program can sample from.
pub const TEXTURE_UNITS: usize = 2;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique id used by the renderer's resource caches.
pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Per-draw transforms as laid out in `@group(0) @binding(0)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Transforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
}

/// Texture bindings captured by a draw, indexed by unit.
pub type TextureBindings = [Option<Arc<Texture2d>>; TEXTURE_UNITS];

/// One recorded draw with the state that was current when it was issued.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub program: Arc<ShaderProgram>,
    pub mesh: Arc<MeshData>,
    /// Copy of the program's uniform block at the time of the draw.
    pub uniforms: Vec<u8>,
    pub view: Mat4,
    pub projection: Mat4,
    pub model: Mat4,
    pub depth_test: bool,
    pub face_culling: bool,
    pub textures: TextureBindings,
}

impl DrawCall {
    pub fn transforms(&self) -> Transforms {
        let normal = Mat3::from_mat4(self.model).inverse().transpose();
        Transforms {
            view_proj: (self.projection * self.view).to_cols_array_2d(),
            model: self.model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
        }
    }

    /// Reads a uniform from the snapshot taken when this draw was recorded.
    pub fn uniform_value(&self, name: &str) -> Option<UniformValue> {
        self.program.layout().read(&self.uniforms, name)
    }
}

/// Everything recorded between two calls to [`GraphicsContext::finish_frame`].
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub clear_color: Option<[f32; 4]>,
    pub draws: Vec<DrawCall>,
}

/// Immediate-mode graphics state that records draw calls.
#[derive(Debug)]
pub struct GraphicsContext {
    view: Mat4,
    projection: Mat4,
    model: Mat4,
    depth_test: bool,
    face_culling: bool,
    textures: TextureBindings,
    frame: Frame,
}

impl Default for GraphicsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsContext {
    pub fn new() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            depth_test: false,
            face_culling: false,
            textures: Default::default(),
            frame: Frame::default(),
        }
    }

    /// Clears the target, discarding anything drawn earlier in the frame.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.frame.draws.clear();
        self.frame.clear_color = Some(color);
    }

    /// Loads the camera's view and projection and resets the model matrix.
    pub fn set_matrices(&mut self, camera: &CameraPersp) {
        self.view = camera.view_matrix();
        self.projection = camera.projection_matrix();
        self.model = Mat4::IDENTITY;
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.model = model;
    }

    pub fn mult_model_matrix(&mut self, transform: Mat4) {
        self.model *= transform;
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn enable_depth(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    pub fn face_culling(&self) -> bool {
        self.face_culling
    }

    pub fn enable_face_culling(&mut self, enabled: bool) {
        self.face_culling = enabled;
    }

    /// Binds `texture` to `unit`; `None` unbinds it.
    pub fn bind_texture(&mut self, unit: usize, texture: Option<Arc<Texture2d>>) {
        match self.textures.get_mut(unit) {
            Some(slot) => *slot = texture,
            None => warn!("ignoring bind to texture unit {unit}, only {TEXTURE_UNITS} exist"),
        }
    }

    pub fn bound_texture(&self, unit: usize) -> Option<&Arc<Texture2d>> {
        self.textures.get(unit).and_then(Option::as_ref)
    }

    /// Records a draw of `batch` with the current state.
    pub fn draw(&mut self, batch: &Batch) {
        let program = Arc::clone(batch.program());
        let uniforms = program.uniform_bytes();
        self.frame.draws.push(DrawCall {
            program,
            mesh: Arc::clone(batch.mesh()),
            uniforms,
            view: self.view,
            projection: self.projection,
            model: self.model,
            depth_test: self.depth_test,
            face_culling: self.face_culling,
            textures: self.textures.clone(),
        });
    }

    /// Draws recorded so far in the current frame.
    pub fn pending_draws(&self) -> &[DrawCall] {
        &self.frame.draws
    }

    /// Hands over the recorded frame and starts a new one.
    pub fn finish_frame(&mut self) -> Frame {
        std::mem::take(&mut self.frame)
    }

    /// Saves view, projection and model matrices until the guard drops.
    pub fn scoped_matrices(&mut self) -> ScopedState<'_> {
        let restore = Restore::Matrices {
            view: self.view,
            projection: self.projection,
            model: self.model,
        };
        ScopedState::new(self, restore)
    }

    /// Saves the model matrix until the guard drops.
    pub fn scoped_model_matrix(&mut self) -> ScopedState<'_> {
        let restore = Restore::Model(self.model);
        ScopedState::new(self, restore)
    }

    /// Sets depth testing for the lifetime of the guard.
    pub fn scoped_depth(&mut self, enabled: bool) -> ScopedState<'_> {
        let restore = Restore::Depth(self.depth_test);
        self.depth_test = enabled;
        ScopedState::new(self, restore)
    }

    /// Sets back-face culling for the lifetime of the guard.
    pub fn scoped_face_culling(&mut self, enabled: bool) -> ScopedState<'_> {
        let restore = Restore::FaceCulling(self.face_culling);
        self.face_culling = enabled;
        ScopedState::new(self, restore)
    }

    /// Binds `texture` to `unit` for the lifetime of the guard.
    pub fn scoped_texture_bind(&mut self, unit: usize, texture: &Arc<Texture2d>) -> ScopedState<'_> {
        let previous = self.bound_texture(unit).cloned();
        self.bind_texture(unit, Some(Arc::clone(texture)));
        ScopedState::new(self, Restore::Texture { unit, previous })
    }
}

#[derive(Debug)]
enum Restore {
    Matrices {
        view: Mat4,
        projection: Mat4,
        model: Mat4,
    },
    Model(Mat4),
    Depth(bool),
    FaceCulling(bool),
    Texture {
        unit: usize,
        previous: Option<Arc<Texture2d>>,
    },
}

/// Guard that puts one piece of graphics state back when dropped.
///
/// Dereferences to the [`GraphicsContext`], so drawing continues through the
/// guard and guards nest by shadowing.
pub struct ScopedState<'a> {
    gfx: &'a mut GraphicsContext,
    restore: Option<Restore>,
}

impl<'a> ScopedState<'a> {
    fn new(gfx: &'a mut GraphicsContext, restore: Restore) -> Self {
        Self {
            gfx,
            restore: Some(restore),
        }
    }
}

impl Deref for ScopedState<'_> {
    type Target = GraphicsContext;

    fn deref(&self) -> &Self::Target {
        self.gfx
    }
}

impl DerefMut for ScopedState<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.gfx
    }
}

impl Drop for ScopedState<'_> {
    fn drop(&mut self) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        match restore {
            Restore::Matrices {
                view,
                projection,
                model,
            } => {
                self.gfx.view = view;
                self.gfx.projection = projection;
                self.gfx.model = model;
            }
            Restore::Model(model) => self.gfx.model = model,
            Restore::Depth(enabled) => self.gfx.depth_test = enabled,
            Restore::FaceCulling(enabled) => self.gfx.face_culling = enabled,
            Restore::Texture { unit, previous } => self.gfx.bind_texture(unit, previous),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::Vec3;

    use super::*;
    use crate::dds::DdsImage;

    pub(crate) const TEST_SHADER: &str = r#"
struct Transforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
};

struct Params {
    tint: vec3<f32>,
    strength: f32,
};

@group(0) @binding(0) var<uniform> transforms: Transforms;
@group(0) @binding(1) var<uniform> params: Params;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return transforms.view_proj * transforms.model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(params.tint * params.strength, 1.0);
}
"#;

    pub(crate) fn test_program() -> Arc<ShaderProgram> {
        ShaderProgram::compile("test", TEST_SHADER).unwrap()
    }

    pub(crate) fn test_texture(label: &str) -> Arc<Texture2d> {
        let image = DdsImage {
            width: 1,
            height: 1,
            channels: 2,
            source_type: crate::dds::ChannelType::F32,
            texels: vec![0.5, 0.25],
        };
        Texture2d::from_dds(label, &image, TextureFormat::new(InternalFormat::Rg32Float))
    }

    #[test]
    fn scoped_state_restores_on_drop() {
        let mut gfx = GraphicsContext::new();
        let texture = test_texture("lut");
        {
            let mut depth = gfx.scoped_depth(true);
            let mut culling = depth.scoped_face_culling(true);
            let textured = culling.scoped_texture_bind(1, &texture);
            assert!(textured.depth_test());
            assert!(textured.face_culling());
            assert!(textured.bound_texture(1).is_some());
        }
        assert!(!gfx.depth_test());
        assert!(!gfx.face_culling());
        assert!(gfx.bound_texture(1).is_none());
    }

    #[test]
    fn scoped_matrices_restore_model_changes() {
        let mut gfx = GraphicsContext::new();
        {
            let mut scoped = gfx.scoped_matrices();
            scoped.mult_model_matrix(Mat4::from_translation(Vec3::X));
            {
                let mut inner = scoped.scoped_model_matrix();
                inner.mult_model_matrix(Mat4::from_scale(Vec3::splat(2.0)));
                assert_eq!(
                    inner.model_matrix(),
                    Mat4::from_translation(Vec3::X) * Mat4::from_scale(Vec3::splat(2.0))
                );
            }
            assert_eq!(scoped.model_matrix(), Mat4::from_translation(Vec3::X));
        }
        assert_eq!(gfx.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn scoped_texture_bind_restores_previous_binding() {
        let mut gfx = GraphicsContext::new();
        let first = test_texture("first");
        let second = test_texture("second");
        gfx.bind_texture(0, Some(Arc::clone(&first)));
        {
            let scoped = gfx.scoped_texture_bind(0, &second);
            assert_eq!(scoped.bound_texture(0).map(|t| t.id()), Some(second.id()));
        }
        assert_eq!(gfx.bound_texture(0).map(|t| t.id()), Some(first.id()));
    }

    #[test]
    fn draw_snapshots_state_and_uniforms() {
        let mut gfx = GraphicsContext::new();
        let program = test_program();
        let batch = Batch::new(MeshData::plane(), Arc::clone(&program));

        program.uniform("strength", 2.0f32);
        {
            let mut depth = gfx.scoped_depth(true);
            depth.draw(&batch);
        }
        program.uniform("strength", 3.0f32);
        gfx.draw(&batch);

        let frame = gfx.finish_frame();
        assert_eq!(frame.draws.len(), 2);
        assert!(frame.draws[0].depth_test);
        assert!(!frame.draws[1].depth_test);
        assert_eq!(
            frame.draws[0].uniform_value("strength"),
            Some(UniformValue::F32(2.0))
        );
        assert_eq!(
            frame.draws[1].uniform_value("strength"),
            Some(UniformValue::F32(3.0))
        );
        assert!(gfx.pending_draws().is_empty());
    }

    #[test]
    fn clear_discards_earlier_draws() {
        let mut gfx = GraphicsContext::new();
        let batch = Batch::new(MeshData::plane(), test_program());
        gfx.draw(&batch);
        gfx.clear([0.0, 0.0, 0.0, 1.0]);
        let frame = gfx.finish_frame();
        assert!(frame.draws.is_empty());
        assert_eq!(frame.clear_color, Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn binding_past_the_last_unit_is_ignored() {
        let mut gfx = GraphicsContext::new();
        gfx.bind_texture(TEXTURE_UNITS, Some(test_texture("extra")));
        assert!(gfx.bound_texture(TEXTURE_UNITS).is_none());
    }

    #[test]
    fn transforms_include_normal_matrix() {
        let mut gfx = GraphicsContext::new();
        gfx.set_model_matrix(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        gfx.draw(&Batch::new(MeshData::plane(), test_program()));
        let transforms = gfx.pending_draws()[0].transforms();
        assert_eq!(transforms.normal[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(transforms.normal[1], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(std::mem::size_of::<Transforms>(), 176);
    }
}
