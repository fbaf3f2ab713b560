//! Scene representation and management
//!
//! A [`Scene`] owns every piece of imported data in flat arrays. Nodes
//! reference meshes by index, meshes reference materials by index and
//! animation channels and bones reference nodes by name. All of those links
//! are checked by [`Scene::validate`] before a scene is handed out.

use std::collections::HashSet;

use bitflags::bitflags;

use crate::{
    aabb::AABB,
    animation::Animation,
    camera::Camera,
    error::{Error, Result},
    importer::{Importer, PropertyStore},
    light::Light,
    material::Material,
    mesh::Mesh,
    metadata::Metadata,
    node::{Node, NodeData, NodeId},
    postprocess::PostProcessSteps,
    types::{Handedness, Matrix4x4},
};

bitflags! {
    /// Scene state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneFlags: u32 {
        /// The scene lacks meshes or materials; usually a pure skeleton or animation file
        const INCOMPLETE = 0x1;
        /// The scene passed structural validation
        const VALIDATED = 0x2;
        /// Validation passed but raised warnings
        const VALIDATION_WARNING = 0x4;
        /// Vertices are shared between faces
        const NON_VERBOSE_FORMAT = 0x8;
        /// The scene describes terrain patches
        const TERRAIN = 0x10;
    }
}

/// A 3D scene containing meshes, materials, animations, and other assets
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) materials: Vec<Material>,
    pub(crate) animations: Vec<Animation>,
    pub(crate) lights: Vec<Light>,
    pub(crate) cameras: Vec<Camera>,
    pub(crate) metadata: Metadata,
    pub(crate) flags: SceneFlags,
    pub(crate) handedness: Handedness,
    pub(crate) diagnostics: Vec<String>,
}

impl Scene {
    /// Load a scene from a file with default settings
    ///
    /// For more control, use `Importer::new().read_file(path).import_file(path)`.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Importer::new().import_file(path)
    }

    /// Load a scene from a file with post-processing steps
    pub fn from_file_with_flags<P: AsRef<std::path::Path>>(
        path: P,
        post_process: PostProcessSteps,
    ) -> Result<Self> {
        Importer::new()
            .read_file(&path)
            .with_post_process(post_process)
            .import_file(path)
    }

    /// Load a scene from a file with properties and post-processing steps
    ///
    /// # Example
    /// ```rust,no_run
    /// use scene_importer::{Scene, PropertyStore, postprocess::PostProcessSteps, import_properties};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut props = PropertyStore::new();
    /// props.set_int(import_properties::SMD_KEYFRAME, 5);
    ///
    /// let scene = Scene::from_file_with_props(
    ///     "walk.smd",
    ///     PostProcessSteps::VALIDATE_DATA_STRUCTURE,
    ///     &props,
    /// )?;
    /// # let _ = scene;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file_with_props<P: AsRef<std::path::Path>>(
        path: P,
        post_process: PostProcessSteps,
        props: &PropertyStore,
    ) -> Result<Self> {
        Importer::new()
            .read_file(&path)
            .with_post_process(post_process)
            .with_property_store_ref(props)
            .import_file(path)
    }

    /// Load a scene from memory with default settings
    ///
    /// `hint` is the file extension used to pick a reader.
    pub fn from_memory(data: &[u8], hint: Option<&str>) -> Result<Self> {
        Importer::new().import_from_memory(data, hint)
    }

    /// Get the scene flags
    pub fn flags(&self) -> SceneFlags {
        self.flags
    }

    /// Check if the scene is incomplete
    pub fn is_incomplete(&self) -> bool {
        self.flags.contains(SceneFlags::INCOMPLETE)
    }

    /// Check if the scene was validated
    pub fn is_validated(&self) -> bool {
        self.flags.contains(SceneFlags::VALIDATED)
    }

    /// Check if the scene contains validation warnings
    pub fn has_validation_warnings(&self) -> bool {
        self.flags.contains(SceneFlags::VALIDATION_WARNING)
    }

    /// Check if the scene is non-verbose
    pub fn is_non_verbose(&self) -> bool {
        self.flags.contains(SceneFlags::NON_VERBOSE_FORMAT)
    }

    /// Check if terrain patches are present
    pub fn has_terrain(&self) -> bool {
        self.flags.contains(SceneFlags::TERRAIN)
    }

    /// Coordinate convention the scene data is expressed in
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Recoverable problems reported while importing, in the order they occurred
    pub fn import_diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Get the root node of the scene
    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, self.root)
    }

    /// Get a node by handle
    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id.index() < self.nodes.len()).then(|| Node::new(self, id))
    }

    /// Get the number of nodes in the scene
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in depth-first pre-order, starting at the root
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.root_node().descendants()
    }

    /// Find a node by name anywhere in the hierarchy
    pub fn find_node(&self, name: &str) -> Option<Node<'_>> {
        self.root_node().find_node(name)
    }

    /// Get the number of meshes in the scene
    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Get a mesh by index
    pub fn mesh(&self, index: usize) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    /// Get an iterator over all meshes
    pub fn meshes(&self) -> std::slice::Iter<'_, Mesh> {
        self.meshes.iter()
    }

    /// Get the number of materials in the scene
    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    /// Get a material by index
    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// Get an iterator over all materials
    pub fn materials(&self) -> std::slice::Iter<'_, Material> {
        self.materials.iter()
    }

    /// Get the number of animations in the scene
    pub fn num_animations(&self) -> usize {
        self.animations.len()
    }

    /// Get an animation by index
    pub fn animation(&self, index: usize) -> Option<&Animation> {
        self.animations.get(index)
    }

    /// Get an iterator over all animations
    pub fn animations(&self) -> std::slice::Iter<'_, Animation> {
        self.animations.iter()
    }

    /// Get the number of cameras in the scene
    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    /// Get a camera by index
    pub fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    /// Get an iterator over all cameras
    pub fn cameras(&self) -> std::slice::Iter<'_, Camera> {
        self.cameras.iter()
    }

    /// Get the number of lights in the scene
    pub fn num_lights(&self) -> usize {
        self.lights.len()
    }

    /// Get a light by index
    pub fn light(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    /// Get an iterator over all lights
    pub fn lights(&self) -> std::slice::Iter<'_, Light> {
        self.lights.iter()
    }

    /// Get scene metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Bounds of all mesh instances, in root space
    pub fn bounding_box(&self) -> AABB {
        let mut bounds = AABB::empty();
        for node in self.nodes() {
            let global = node.global_transformation();
            for mesh in node.mesh_indices().filter_map(|i| self.meshes.get(i)) {
                bounds.expand_to_include_aabb(&mesh.aabb().transformed(&global));
            }
        }
        bounds
    }

    /// Check every structural invariant of the scene graph.
    ///
    /// The hierarchy must be a tree rooted at [`Scene::root_node`] that reaches
    /// every node exactly once, and every index must point into its array.
    pub fn validate(&self) -> Result<()> {
        let node_count = self.nodes.len();
        if self.root.index() >= node_count {
            return Err(Error::invalid_scene("scene has no root node"));
        }
        if self.nodes[self.root.index()].parent.is_some() {
            return Err(Error::invalid_scene("root node has a parent"));
        }

        let mut visited = vec![false; node_count];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.index()], true) {
                return Err(Error::invalid_scene(format!(
                    "node '{}' is reachable twice",
                    self.nodes[id.index()].name
                )));
            }
            let node = &self.nodes[id.index()];
            for &mesh in &node.meshes {
                if mesh as usize >= self.meshes.len() {
                    return Err(Error::invalid_scene(format!(
                        "node '{}' references mesh {mesh} of {}",
                        node.name,
                        self.meshes.len()
                    )));
                }
            }
            for &child in &node.children {
                let child_node = self.nodes.get(child.index()).ok_or_else(|| {
                    Error::invalid_scene(format!("node '{}' has a dangling child", node.name))
                })?;
                if child_node.parent != Some(id) {
                    return Err(Error::invalid_scene(format!(
                        "node '{}' does not point back to its parent '{}'",
                        child_node.name, node.name
                    )));
                }
                stack.push(child);
            }
        }
        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(Error::invalid_scene(format!(
                "node '{}' is not reachable from the root",
                self.nodes[orphan].name
            )));
        }

        for mesh in &self.meshes {
            validate_mesh(mesh, self.materials.len())?;
        }
        Ok(())
    }

    /// Global transform of every node, indexed by node id
    pub(crate) fn global_transforms(&self) -> Vec<Matrix4x4> {
        let mut globals = vec![Matrix4x4::IDENTITY; self.nodes.len()];
        let mut stack = vec![(self.root, Matrix4x4::IDENTITY)];
        while let Some((id, parent)) = stack.pop() {
            let node = &self.nodes[id.index()];
            let global = parent * node.transformation;
            globals[id.index()] = global;
            stack.extend(node.children.iter().map(|&c| (c, global)));
        }
        globals
    }

    /// Names used by more than one node
    pub(crate) fn duplicate_node_names(&self) -> HashSet<&str> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .filter(|n| !seen.insert(n.name.as_str()))
            .map(|n| n.name.as_str())
            .collect()
    }
}

fn validate_mesh(mesh: &Mesh, material_count: usize) -> Result<()> {
    let vertex_count = mesh.vertices.len();
    if vertex_count == 0 || mesh.faces.is_empty() {
        return Err(Error::invalid_scene(format!(
            "mesh '{}' has no vertices or faces",
            mesh.name
        )));
    }
    if mesh.material_index as usize >= material_count {
        return Err(Error::invalid_scene(format!(
            "mesh '{}' references material {} of {material_count}",
            mesh.name, mesh.material_index
        )));
    }
    for face in &mesh.faces {
        if face.indices.is_empty() {
            return Err(Error::invalid_scene(format!(
                "mesh '{}' has an empty face",
                mesh.name
            )));
        }
        if let Some(&bad) = face.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::invalid_scene(format!(
                "mesh '{}' face index {bad} exceeds {vertex_count} vertices",
                mesh.name
            )));
        }
    }

    let parallel = mesh
        .normals
        .iter()
        .map(Vec::len)
        .chain(mesh.texture_coords.iter().flatten().map(Vec::len))
        .chain(mesh.colors.iter().flatten().map(Vec::len));
    for len in parallel {
        if len != vertex_count {
            return Err(Error::invalid_scene(format!(
                "mesh '{}' has a per-vertex array of {len} entries for {vertex_count} vertices",
                mesh.name
            )));
        }
    }

    for bone in &mesh.bones {
        if let Some(w) = bone
            .weights
            .iter()
            .find(|w| w.vertex_id as usize >= vertex_count)
        {
            return Err(Error::invalid_scene(format!(
                "bone '{}' weights vertex {} of mesh '{}'",
                bone.name, w.vertex_id, mesh.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::SceneBuilder, mesh::Face, types::Vector3D};

    fn triangle_scene() -> Scene {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        let child = builder.add_node(
            "moved",
            Matrix4x4::from_translation(Vector3D::new(10.0, 0.0, 0.0)),
            Some(root),
        );
        let material = builder.add_material(Material::named("m"));
        let mesh = builder.add_mesh(
            Mesh::new(
                "tri",
                vec![Vector3D::ZERO, Vector3D::X, Vector3D::Y],
                vec![Face::new(vec![0, 1, 2])],
            )
            .with_material_index(material),
        );
        builder.attach_mesh(child, mesh);
        builder.build().expect("valid scene")
    }

    #[test]
    fn test_accessors() {
        let scene = triangle_scene();
        assert_eq!(scene.num_nodes(), 2);
        assert_eq!(scene.num_meshes(), 1);
        assert_eq!(scene.meshes().len(), 1);
        assert!(scene.mesh(1).is_none());
        assert_eq!(scene.material(0).map(|m| m.name()), Some("m".to_string()));
        assert_eq!(scene.find_node("moved").map(|n| n.num_meshes()), Some(1));
        assert!(!scene.is_incomplete());
        assert_eq!(scene.handedness(), Handedness::Right);
    }

    #[test]
    fn test_bounding_box_uses_global_transforms() {
        let bounds = triangle_scene().bounding_box();
        assert_eq!(bounds.min, Vector3D::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vector3D::new(11.0, 1.0, 0.0));
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mut scene = triangle_scene();
        scene.meshes[0].faces.push(Face::new(vec![0, 1, 9]));
        assert!(matches!(scene.validate(), Err(Error::InvalidScene { .. })));

        let mut scene = triangle_scene();
        scene.nodes[0].meshes.push(4);
        assert!(scene.validate().is_err());

        let mut scene = triangle_scene();
        scene.meshes[0].normals = Some(vec![Vector3D::Z; 2]);
        assert!(scene.validate().is_err());

        let mut scene = triangle_scene();
        scene.meshes[0].material_index = 3;
        assert!(scene.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_broken_tree() {
        let mut scene = triangle_scene();
        scene.nodes[1].parent = None;
        assert!(scene.validate().is_err());

        let mut scene = triangle_scene();
        scene.nodes[1].children.push(NodeId(0));
        scene.nodes[0].parent = Some(NodeId(1));
        assert!(scene.validate().is_err());
    }
}
