//! Staging area for scene construction
//!
//! Readers never touch a [`Scene`] while parsing. They fill a
//! [`SceneBuilder`] and call [`SceneBuilder::build`] once the whole file has
//! been understood. `build` validates the staged data and either returns a
//! complete scene or an error; nothing half-built ever escapes.

use crate::{
    animation::Animation,
    camera::Camera,
    error::{Error, Result},
    light::Light,
    material::Material,
    mesh::Mesh,
    metadata::Metadata,
    node::{NodeData, NodeId},
    scene::{Scene, SceneFlags},
    types::{Handedness, Matrix4x4},
};

/// Collects nodes and scene data before committing them as a [`Scene`].
#[derive(Debug, Default)]
pub struct SceneBuilder {
    nodes: Vec<NodeData>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    animations: Vec<Animation>,
    lights: Vec<Light>,
    cameras: Vec<Camera>,
    metadata: Metadata,
    flags: SceneFlags,
    handedness: Handedness,
    problems: Vec<String>,
}

impl SceneBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, optionally as the last child of `parent`
    pub fn add_node<S: Into<String>>(
        &mut self,
        name: S,
        transformation: Matrix4x4,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(NodeData::new(name.into(), transformation));
        if let Some(parent) = parent {
            self.link(parent, id);
        }
        id
    }

    /// Make `child` the last child of `parent`. The child must not have a
    /// parent yet.
    pub fn link(&mut self, parent: NodeId, child: NodeId) {
        let count = self.nodes.len();
        if parent.index() >= count || child.index() >= count {
            self.problems
                .push(format!("link {parent:?} -> {child:?} references a missing node"));
            return;
        }
        if parent == child {
            self.problems
                .push(format!("node '{}' cannot parent itself", self.nodes[child.index()].name));
            return;
        }
        if self.nodes[child.index()].parent.is_some() {
            self.problems.push(format!(
                "node '{}' already has a parent",
                self.nodes[child.index()].name
            ));
            return;
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Instance a mesh on a node
    pub fn attach_mesh(&mut self, node: NodeId, mesh_index: u32) {
        match self.nodes.get_mut(node.index()) {
            Some(data) => data.meshes.push(mesh_index),
            None => self
                .problems
                .push(format!("mesh {mesh_index} attached to missing node {node:?}")),
        }
    }

    /// Attach metadata to a node
    pub fn set_node_metadata(&mut self, node: NodeId, metadata: Metadata) {
        if let Some(data) = self.nodes.get_mut(node.index()) {
            data.metadata = Some(metadata);
        }
    }

    /// Name of a staged node
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.index()).map(|n| n.name.as_str())
    }

    /// Number of staged nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Add a mesh and return its index
    pub fn add_mesh(&mut self, mesh: Mesh) -> u32 {
        self.meshes.push(mesh);
        (self.meshes.len() - 1) as u32
    }

    /// Number of staged meshes
    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Add a material and return its index
    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    /// Number of staged materials
    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    /// Add an animation
    pub fn add_animation(&mut self, animation: Animation) {
        self.animations.push(animation);
    }

    /// Add a light
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Add a camera
    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    /// Set scene flags
    pub fn insert_flags(&mut self, flags: SceneFlags) {
        self.flags |= flags;
    }

    /// Declare the coordinate convention of the staged data
    pub fn set_handedness(&mut self, handedness: Handedness) {
        self.handedness = handedness;
    }

    /// Scene level metadata
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Commit the staged data.
    ///
    /// Fails with [`Error::InvalidScene`] unless there is exactly one node
    /// without a parent and every index and per-vertex array is consistent.
    pub fn build(self) -> Result<Scene> {
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(Error::invalid_scene(problem));
        }

        let mut roots = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(i, _)| NodeId::from_index(i));
        let root = roots
            .next()
            .ok_or_else(|| Error::invalid_scene("scene has no root node"))?;
        if let Some(extra) = roots.next() {
            return Err(Error::invalid_scene(format!(
                "scene has more than one root: '{}' and '{}'",
                self.nodes[root.index()].name,
                self.nodes[extra.index()].name
            )));
        }

        let scene = Scene {
            nodes: self.nodes,
            root,
            meshes: self.meshes,
            materials: self.materials,
            animations: self.animations,
            lights: self.lights,
            cameras: self.cameras,
            metadata: self.metadata,
            flags: self.flags,
            handedness: self.handedness,
            diagnostics: Vec::new(),
        };
        scene.validate()?;
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_single_root() {
        let mut builder = SceneBuilder::new();
        builder.add_node("a", Matrix4x4::IDENTITY, None);
        builder.add_node("b", Matrix4x4::IDENTITY, None);
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("more than one root"));

        assert!(SceneBuilder::new().build().is_err());
    }

    #[test]
    fn test_bad_links_are_reported_at_build_time() {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        let child = builder.add_node("child", Matrix4x4::IDENTITY, Some(root));
        // second parent for the same node
        let other = builder.add_node("other", Matrix4x4::IDENTITY, Some(root));
        builder.link(other, child);
        builder.add_node("ghost", Matrix4x4::IDENTITY, Some(NodeId(99)));
        assert!(matches!(builder.build(), Err(Error::InvalidScene { .. })));
    }

    #[test]
    fn test_mesh_without_material_is_rejected() {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        let mesh = builder.add_mesh(Mesh::new(
            "p",
            vec![crate::types::Vector3D::ZERO],
            vec![crate::mesh::Face::new(vec![0])],
        ));
        builder.attach_mesh(root, mesh);
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_flags_and_handedness_are_committed() {
        let mut builder = SceneBuilder::new();
        builder.add_node("root", Matrix4x4::IDENTITY, None);
        builder.insert_flags(SceneFlags::INCOMPLETE);
        builder.set_handedness(Handedness::Left);
        let scene = builder.build().expect("skeleton-only scene is valid");
        assert!(scene.is_incomplete());
        assert_eq!(scene.handedness(), Handedness::Left);
        assert_eq!(scene.num_meshes(), 0);
    }
}
