use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::next_resource_id;
use super::shader::ShaderProgram;

/// Interleaved vertex: `position.xyz` followed by `normal.xyz`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Indexed triangle list with a stable id for the renderer's buffer cache.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    id: u64,
    pub label: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// The 2x2 plane in XZ facing +Y, corners at `(±1, 0, ±1)`.
    ///
    /// Triangles wind counter-clockwise when seen from +Y.
    pub fn plane() -> Self {
        let corners = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        Self {
            id: next_resource_id(),
            label: "plane".to_string(),
            vertices: corners
                .into_iter()
                .map(|corner| Vertex::new(corner, Vec3::Y))
                .collect(),
            indices: vec![0, 3, 2, 0, 2, 1],
        }
    }

    /// Uniformly scales every position.
    pub fn scaled(mut self, factor: f32) -> Self {
        for vertex in &mut self.vertices {
            vertex.position = (Vec3::from_array(vertex.position) * factor).to_array();
        }
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Geometry paired with the program that draws it.
#[derive(Debug, Clone)]
pub struct Batch {
    mesh: Arc<MeshData>,
    program: Arc<ShaderProgram>,
}

impl Batch {
    pub fn new(mesh: MeshData, program: Arc<ShaderProgram>) -> Self {
        Self {
            mesh: Arc::new(mesh),
            program,
        }
    }

    pub fn mesh(&self) -> &Arc<MeshData> {
        &self.mesh
    }

    pub fn program(&self) -> &Arc<ShaderProgram> {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(mesh: &MeshData, index: u32) -> Vec3 {
        Vec3::from_array(mesh.vertices[index as usize].position)
    }

    #[test]
    fn plane_triangles_face_up() {
        let plane = MeshData::plane();
        assert_eq!(plane.index_count(), 6);
        for triangle in plane.indices.chunks_exact(3) {
            let a = position(&plane, triangle[0]);
            let b = position(&plane, triangle[1]);
            let c = position(&plane, triangle[2]);
            let normal = (b - a).cross(c - a).normalize();
            assert_eq!(normal, Vec3::Y);
        }
        assert!(plane.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn scaled_plane_keeps_id_and_normals() {
        let plane = MeshData::plane();
        let id = plane.id();
        let floor = plane.scaled(10.0);
        assert_eq!(floor.id(), id);
        assert_eq!(floor.vertices[2].position, [10.0, 0.0, 10.0]);
        assert_eq!(floor.vertices[2].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn planes_get_distinct_ids() {
        assert_ne!(MeshData::plane().id(), MeshData::plane().id());
    }
}
