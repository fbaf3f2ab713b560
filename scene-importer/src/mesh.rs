//! Mesh representation and utilities

use bitflags::bitflags;

use crate::{
    aabb::AABB,
    bone::Bone,
    types::{Color4D, Vector3D},
};

/// Maximum number of texture coordinate channels per mesh
pub const MAX_NUMBER_OF_TEXTURECOORDS: usize = 8;

/// Maximum number of vertex color channels per mesh
pub const MAX_NUMBER_OF_COLOR_SETS: usize = 8;

bitflags! {
    /// Kinds of primitives present in a mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrimitiveType: u32 {
        /// Faces with a single index
        const POINT = 0x1;
        /// Faces with two indices
        const LINE = 0x2;
        /// Faces with three indices
        const TRIANGLE = 0x4;
        /// Faces with more than three indices
        const POLYGON = 0x8;
    }
}

impl PrimitiveType {
    /// Primitive kind of a face with `count` indices
    pub fn for_index_count(count: usize) -> Self {
        match count {
            0 => Self::empty(),
            1 => Self::POINT,
            2 => Self::LINE,
            3 => Self::TRIANGLE,
            _ => Self::POLYGON,
        }
    }
}

/// A face in a mesh
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Face {
    pub(crate) indices: Vec<u32>,
}

impl Face {
    /// Create a face from vertex indices
    pub fn new(indices: Vec<u32>) -> Self {
        Self { indices }
    }

    /// Get the number of indices in this face
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    /// Get the indices of this face
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl From<Vec<u32>> for Face {
    fn from(indices: Vec<u32>) -> Self {
        Self::new(indices)
    }
}

/// A mesh containing vertices, faces, and other geometric data
///
/// Per-vertex arrays (normals, texture coordinates, colors) are either absent
/// or exactly as long as the vertex array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub(crate) name: String,
    pub(crate) vertices: Vec<Vector3D>,
    pub(crate) normals: Option<Vec<Vector3D>>,
    pub(crate) texture_coords: [Option<Vec<Vector3D>>; MAX_NUMBER_OF_TEXTURECOORDS],
    pub(crate) uv_components: [u32; MAX_NUMBER_OF_TEXTURECOORDS],
    pub(crate) colors: [Option<Vec<Color4D>>; MAX_NUMBER_OF_COLOR_SETS],
    pub(crate) faces: Vec<Face>,
    pub(crate) primitive_types: PrimitiveType,
    pub(crate) material_index: u32,
    pub(crate) bones: Vec<Bone>,
}

impl Mesh {
    /// Create a mesh from positions and faces. Primitive types are derived
    /// from the faces.
    pub fn new<S: Into<String>>(name: S, vertices: Vec<Vector3D>, faces: Vec<Face>) -> Self {
        let mut mesh = Self {
            name: name.into(),
            vertices,
            faces,
            ..Self::default()
        };
        mesh.update_primitive_types();
        mesh
    }

    /// Attach per-vertex normals
    pub fn with_normals(mut self, normals: Vec<Vector3D>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Attach a 2-component texture coordinate channel
    pub fn with_texture_coords(mut self, channel: usize, coords: Vec<Vector3D>) -> Self {
        if channel < MAX_NUMBER_OF_TEXTURECOORDS {
            self.texture_coords[channel] = Some(coords);
            self.uv_components[channel] = 2;
        }
        self
    }

    /// Attach a vertex color channel
    pub fn with_vertex_colors(mut self, channel: usize, colors: Vec<Color4D>) -> Self {
        if channel < MAX_NUMBER_OF_COLOR_SETS {
            self.colors[channel] = Some(colors);
        }
        self
    }

    /// Set the material index
    pub fn with_material_index(mut self, index: u32) -> Self {
        self.material_index = index;
        self
    }

    /// Attach bones
    pub fn with_bones(mut self, bones: Vec<Bone>) -> Self {
        self.bones = bones;
        self
    }

    /// Get the name of the mesh
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of vertices in the mesh
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the vertices of the mesh
    pub fn vertices(&self) -> &[Vector3D] {
        &self.vertices
    }

    /// Raw bytes of the vertex positions, ready for upload to a GPU buffer
    #[cfg(feature = "bytemuck")]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get the normals of the mesh
    pub fn normals(&self) -> Option<&[Vector3D]> {
        self.normals.as_deref()
    }

    /// Check if the mesh has normals
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Get texture coordinates for a specific channel
    pub fn texture_coords(&self, channel: usize) -> Option<&[Vector3D]> {
        self.texture_coords.get(channel)?.as_deref()
    }

    /// Number of meaningful components in a texture coordinate channel
    pub fn num_uv_components(&self, channel: usize) -> u32 {
        self.uv_components.get(channel).copied().unwrap_or(0)
    }

    /// Check if a texture coordinate channel is present
    pub fn has_texture_coords(&self, channel: usize) -> bool {
        self.texture_coords(channel).is_some()
    }

    /// Get vertex colors for a specific channel
    pub fn vertex_colors(&self, channel: usize) -> Option<&[Color4D]> {
        self.colors.get(channel)?.as_deref()
    }

    /// Get the number of faces in the mesh
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get the faces of the mesh
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Get the material index for this mesh
    pub fn material_index(&self) -> usize {
        self.material_index as usize
    }

    /// Get the primitive types present in this mesh
    pub fn primitive_types(&self) -> PrimitiveType {
        self.primitive_types
    }

    /// Check if the mesh contains points
    pub fn has_points(&self) -> bool {
        self.primitive_types.contains(PrimitiveType::POINT)
    }

    /// Check if the mesh contains lines
    pub fn has_lines(&self) -> bool {
        self.primitive_types.contains(PrimitiveType::LINE)
    }

    /// Check if the mesh contains triangles
    pub fn has_triangles(&self) -> bool {
        self.primitive_types.contains(PrimitiveType::TRIANGLE)
    }

    /// Check if the mesh contains polygons
    pub fn has_polygons(&self) -> bool {
        self.primitive_types.contains(PrimitiveType::POLYGON)
    }

    /// Get the axis-aligned bounding box of the mesh
    pub fn aabb(&self) -> AABB {
        AABB::from_points(self.vertices.iter().copied())
    }

    /// Get the number of bones in the mesh
    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    /// Get a bone by index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// Get all bones in the mesh
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Check if the mesh has bones (is rigged for skeletal animation)
    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Find a bone by name
    pub fn find_bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.name() == name)
    }

    /// Get all bone names
    pub fn bone_names(&self) -> Vec<&str> {
        self.bones.iter().map(|bone| bone.name()).collect()
    }

    /// Recompute [`primitive_types`](Self::primitive_types) from the faces
    pub(crate) fn update_primitive_types(&mut self) {
        self.primitive_types = self
            .faces
            .iter()
            .fold(PrimitiveType::empty(), |acc, f| {
                acc | PrimitiveType::for_index_count(f.num_indices())
            });
    }

    /// Sum of bone weights per vertex
    pub fn vertex_weight_sums(&self) -> Vec<f32> {
        let mut sums = vec![0.0; self.vertices.len()];
        for weight in self.bones.iter().flat_map(|b| b.weights()) {
            if let Some(sum) = sums.get_mut(weight.vertex_id as usize) {
                *sum += weight.weight;
            }
        }
        sums
    }
}
