//! Scene node representation and hierarchy
//!
//! Nodes live in an arena owned by the [`Scene`]. A node refers to its parent
//! and children by [`NodeId`] and to meshes by index, so a node never owns
//! anything but its own name, transform and metadata.

use crate::{metadata::Metadata, scene::Scene, types::Matrix4x4};

/// Handle of a node inside the scene that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in the scene's node arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Storage record of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub(crate) name: String,
    pub(crate) transformation: Matrix4x4,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) meshes: Vec<u32>,
    pub(crate) metadata: Option<Metadata>,
}

impl NodeData {
    pub(crate) fn new(name: String, transformation: Matrix4x4) -> Self {
        Self {
            name,
            transformation,
            parent: None,
            children: Vec::new(),
            meshes: Vec::new(),
            metadata: None,
        }
    }
}

/// A node in the scene hierarchy
#[derive(Clone, Copy)]
pub struct Node<'a> {
    scene: &'a Scene,
    id: NodeId,
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("children", &self.num_children())
            .field("meshes", &self.num_meshes())
            .finish()
    }
}

impl<'a> Node<'a> {
    pub(crate) fn new(scene: &'a Scene, id: NodeId) -> Self {
        Self { scene, id }
    }

    fn data(&self) -> &'a NodeData {
        &self.scene.nodes[self.id.index()]
    }

    /// Arena handle of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the name of the node
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Get the transformation matrix of the node, relative to its parent
    pub fn transformation(&self) -> Matrix4x4 {
        self.data().transformation
    }

    /// Transformation from this node's space to the scene root's space
    pub fn global_transformation(&self) -> Matrix4x4 {
        let mut result = self.transformation();
        let mut current = self.parent();
        while let Some(node) = current {
            result = node.transformation() * result;
            current = node.parent();
        }
        result
    }

    /// Get the parent node
    pub fn parent(&self) -> Option<Node<'a>> {
        self.data().parent.map(|id| Node::new(self.scene, id))
    }

    /// Get the number of child nodes
    pub fn num_children(&self) -> usize {
        self.data().children.len()
    }

    /// Get a child node by index
    pub fn child(&self, index: usize) -> Option<Node<'a>> {
        self.data()
            .children
            .get(index)
            .map(|&id| Node::new(self.scene, id))
    }

    /// Get an iterator over all child nodes
    pub fn children(&self) -> NodeIterator<'a> {
        NodeIterator {
            scene: self.scene,
            ids: self.data().children.iter(),
        }
    }

    /// Get the number of meshes attached to this node
    pub fn num_meshes(&self) -> usize {
        self.data().meshes.len()
    }

    /// Get a mesh index by index
    pub fn mesh_index(&self, index: usize) -> Option<usize> {
        self.data().meshes.get(index).map(|&m| m as usize)
    }

    /// Get an iterator over all mesh indices
    pub fn mesh_indices(&self) -> MeshIndexIterator<'a> {
        MeshIndexIterator {
            indices: self.data().meshes.iter(),
        }
    }

    /// Get the raw mesh index array
    pub fn mesh_indices_raw(&self) -> &'a [u32] {
        &self.data().meshes
    }

    /// Get node metadata
    pub fn metadata(&self) -> Option<&'a Metadata> {
        self.data().metadata.as_ref()
    }

    /// Number of ancestors between this node and the root
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |n| n.parent()).count()
    }

    /// Find a node by name in this subtree (depth-first, self included)
    pub fn find_node(&self, name: &str) -> Option<Node<'a>> {
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            let node = Node::new(self.scene, id);
            if node.name() == name {
                return Some(node);
            }
            stack.extend(node.data().children.iter().rev().copied());
        }
        None
    }

    /// Visit this node and all descendants in depth-first pre-order
    pub fn descendants(&self) -> impl Iterator<Item = Node<'a>> + use<'a> {
        let scene = self.scene;
        let mut stack = vec![self.id];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(scene.nodes[id.index()].children.iter().rev().copied());
            Some(Node::new(scene, id))
        })
    }
}

/// Iterator over child nodes
pub struct NodeIterator<'a> {
    scene: &'a Scene,
    ids: std::slice::Iter<'a, NodeId>,
}

impl<'a> Iterator for NodeIterator<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|&id| Node::new(self.scene, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl ExactSizeIterator for NodeIterator<'_> {}

/// Iterator over mesh indices in a node
pub struct MeshIndexIterator<'a> {
    indices: std::slice::Iter<'a, u32>,
}

impl Iterator for MeshIndexIterator<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        self.indices.next().map(|&i| i as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl ExactSizeIterator for MeshIndexIterator<'_> {}

#[cfg(test)]
mod tests {
    use crate::{builder::SceneBuilder, types::Vector3D};

    use super::*;

    #[test]
    fn test_navigation_and_lookup() {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        let arm = builder.add_node(
            "arm",
            Matrix4x4::from_translation(Vector3D::new(1.0, 0.0, 0.0)),
            Some(root),
        );
        let hand = builder.add_node(
            "hand",
            Matrix4x4::from_translation(Vector3D::new(0.0, 2.0, 0.0)),
            Some(arm),
        );
        builder.add_node("leg", Matrix4x4::IDENTITY, Some(root));
        let scene = builder.build().expect("valid hierarchy");

        let root_node = scene.root_node();
        assert_eq!(root_node.name(), "root");
        assert_eq!(root_node.num_children(), 2);
        assert_eq!(root_node.children().len(), 2);

        let found = root_node.find_node("hand").expect("hand exists");
        assert_eq!(found.id(), hand);
        assert_eq!(found.depth(), 2);
        assert_eq!(found.parent().map(|p| p.name()), Some("arm"));
        assert_eq!(
            found.global_transformation().w_axis.truncate(),
            Vector3D::new(1.0, 2.0, 0.0)
        );

        let order: Vec<&str> = root_node.descendants().map(|n| n.name()).collect();
        assert_eq!(order, ["root", "arm", "hand", "leg"]);
        assert!(root_node.find_node("missing").is_none());
    }

    #[test]
    fn test_descendants_outlive_the_starting_view() {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        let arm = builder.add_node("arm", Matrix4x4::IDENTITY, Some(root));
        builder.add_node("hand", Matrix4x4::IDENTITY, Some(arm));
        let scene = builder.build().expect("valid hierarchy");

        // the starting node is a temporary
        let below_arm = Node::new(&scene, arm).descendants();
        let names: Vec<&str> = below_arm.map(|n| n.name()).collect();
        assert_eq!(names, ["arm", "hand"]);
        assert_eq!(scene.nodes().count(), 3);
    }
}
