//! Placeholder geometry for scenes that only carry a skeleton
//!
//! Formats such as SMD animation files or LightWave scenes without objects
//! produce a node hierarchy but nothing to draw. [`SkeletonMeshBuilder`]
//! turns the hierarchy into a mesh skinned to it, so such a scene can still
//! be displayed and animated.

use crate::{
    bone::{Bone, VertexWeight},
    material::{Material, material_keys},
    mesh::{Face, Mesh},
    node::NodeId,
    scene::Scene,
    types::{Matrix4x4, Vector3D},
};

/// Name of the generated mesh
pub const SKELETON_MESH_NAME: &str = "SkeletonMesh";

/// Name of the generated material
pub const SKELETON_MATERIAL_NAME: &str = "SkeletonMaterial";

/// Builds one bone-shaped mesh for a whole node hierarchy.
///
/// Every node with children gets a thin pyramid pointing at each child. Every
/// leaf gets a small octahedron. The vertices of each node are weighted 1.0
/// to a bone named after the node.
#[derive(Debug, Default)]
pub struct SkeletonMeshBuilder {
    vertices: Vec<Vector3D>,
    faces: Vec<Face>,
    bones: Vec<Bone>,
}

impl SkeletonMeshBuilder {
    /// Build geometry for every node of `scene`
    pub fn new(scene: &Scene) -> Self {
        let mut builder = Self::default();
        let globals = scene.global_transforms();
        let mut stack = vec![scene.root];
        while let Some(id) = stack.pop() {
            builder.add_node(scene, id, globals[id.index()]);
            stack.extend(scene.nodes[id.index()].children.iter().rev().copied());
        }
        builder
    }

    fn add_node(&mut self, scene: &Scene, id: NodeId, global: Matrix4x4) {
        let node = &scene.nodes[id.index()];
        let start = self.vertices.len();

        if node.children.is_empty() {
            let own = node.transformation.w_axis.truncate();
            self.add_knob(own.length() * 0.18);
        } else {
            for child in &node.children {
                let child_pos = scene.nodes[child.index()].transformation.w_axis.truncate();
                self.add_pyramid(child_pos);
            }
        }

        if self.vertices.len() == start {
            return;
        }
        // Geometry was built in node space; move it to mesh (root) space.
        for v in &mut self.vertices[start..] {
            *v = global.transform_point3(*v);
        }
        let weights = (start..self.vertices.len())
            .map(|i| VertexWeight::new(i as u32, 1.0))
            .collect();
        self.bones
            .push(Bone::new(node.name.clone(), global.inverse(), weights));
    }

    fn add_pyramid(&mut self, child_pos: Vector3D) {
        let distance = child_pos.length();
        if distance < 1e-4 {
            return;
        }
        let up = child_pos / distance;
        let orth = if up.dot(Vector3D::X).abs() > 0.99 {
            Vector3D::Y
        } else {
            Vector3D::X
        };
        let front = up.cross(orth).normalize() * distance * 0.1;
        let side = front.cross(up).normalize() * distance * 0.1;

        for (a, b) in [(-front, -side), (-side, front), (front, side), (side, -front)] {
            self.add_triangle(a, child_pos, b);
        }
    }

    fn add_knob(&mut self, size: f32) {
        let (xp, xn) = (Vector3D::X * size, Vector3D::NEG_X * size);
        let (yp, yn) = (Vector3D::Y * size, Vector3D::NEG_Y * size);
        let (zp, zn) = (Vector3D::Z * size, Vector3D::NEG_Z * size);
        for [a, b, c] in [
            [xp, yp, zp],
            [yp, xn, zp],
            [xn, yn, zp],
            [yn, xp, zp],
            [yp, xp, zn],
            [xn, yp, zn],
            [yn, xn, zn],
            [xp, yn, zn],
        ] {
            self.add_triangle(a, b, c);
        }
    }

    fn add_triangle(&mut self, a: Vector3D, b: Vector3D, c: Vector3D) {
        let base = self.vertices.len() as u32;
        self.vertices.extend([a, b, c]);
        self.faces.push(Face::new(vec![base, base + 1, base + 2]));
    }

    /// Number of vertices generated so far
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Finish the mesh. Every face gets a flat normal.
    pub fn into_mesh(self, material_index: u32) -> Mesh {
        let mut normals = vec![Vector3D::ZERO; self.vertices.len()];
        for face in &self.faces {
            let [a, b, c] = [0, 1, 2].map(|i| face.indices[i] as usize);
            let n = (self.vertices[b] - self.vertices[a]).cross(self.vertices[c] - self.vertices[a]);
            let n = if n.length() < 1e-5 { Vector3D::X } else { n.normalize() };
            for i in [a, b, c] {
                normals[i] = n;
            }
        }
        Mesh::new(SKELETON_MESH_NAME, self.vertices, self.faces)
            .with_normals(normals)
            .with_bones(self.bones)
            .with_material_index(material_index)
    }

    /// Material used for skeleton meshes
    pub fn material() -> Material {
        let mut material = Material::named(SKELETON_MATERIAL_NAME);
        material.set_integer(material_keys::TWOSIDED, 1);
        material
    }
}

/// Add a skeleton mesh and its material to `scene`, attached to the root.
pub fn attach_skeleton_mesh(scene: &mut Scene) {
    let mesh = SkeletonMeshBuilder::new(scene);
    let material_index = scene.materials.len() as u32;
    scene.materials.push(SkeletonMeshBuilder::material());
    scene.meshes.push(mesh.into_mesh(material_index));
    let mesh_index = (scene.meshes.len() - 1) as u32;
    let root = scene.root.index();
    scene.nodes[root].meshes.push(mesh_index);
}
