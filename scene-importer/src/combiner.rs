//! Merging scenes into one
//!
//! A master scene receives attachment scenes below some of its nodes. All
//! arrays of an attachment are appended to the master and its indices are
//! shifted; its root becomes a child of the attachment node.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::{
    error::{Error, Result},
    node::NodeId,
    postprocess::convert_to_right_handed,
    scene::{Scene, SceneFlags},
};

bitflags! {
    /// Options for [`merge_scenes`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MergeFlags: u32 {
        /// Rename attachment nodes whose names are already taken
        const GEN_UNIQUE_NAMES = 0x1;
        /// Rename attachment materials whose names are already taken
        const GEN_UNIQUE_MATNAMES = 0x2;
    }
}

/// A scene to be placed below a node of the master scene
#[derive(Debug, Clone)]
pub struct AttachmentInfo {
    /// The scene to attach
    pub scene: Scene,
    /// Node of the master that becomes the parent of the scene's root
    pub attach_to: NodeId,
}

impl AttachmentInfo {
    /// Attach `scene` below `attach_to`
    pub fn new(scene: Scene, attach_to: NodeId) -> Self {
        Self { scene, attach_to }
    }
}

/// Merge `attachments` into `master`.
///
/// Every participant is converted to right-handed first. Attachments are
/// appended in order. The merged scene is validated before it is returned.
pub fn merge_scenes(
    mut master: Scene,
    attachments: Vec<AttachmentInfo>,
    flags: MergeFlags,
) -> Result<Scene> {
    convert_to_right_handed(&mut master);
    let master_nodes = master.nodes.len();

    let mut node_names: HashSet<String> = master.nodes.iter().map(|n| n.name.clone()).collect();
    let mut material_names: HashSet<String> =
        master.materials.iter().map(|m| m.name()).collect();

    for AttachmentInfo { mut scene, attach_to } in attachments {
        if attach_to.index() >= master_nodes {
            return Err(Error::invalid_parameter(format!(
                "attachment node {} does not exist in the master scene",
                attach_to.index()
            )));
        }
        convert_to_right_handed(&mut scene);
        if flags.contains(MergeFlags::GEN_UNIQUE_NAMES) {
            make_node_names_unique(&mut scene, &mut node_names);
        }
        if flags.contains(MergeFlags::GEN_UNIQUE_MATNAMES) {
            make_material_names_unique(&mut scene, &mut material_names);
        }
        append(&mut master, scene, attach_to);
    }

    if master.meshes.is_empty() || master.materials.is_empty() {
        master.flags |= SceneFlags::INCOMPLETE;
    } else {
        master.flags.remove(SceneFlags::INCOMPLETE);
    }
    master.validate()?;
    Ok(master)
}

fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    (1u32..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Rename nodes of `scene` whose names are in `taken` and apply the renames
/// to everything that refers to nodes by name.
///
/// A reference by name resolves to the first node carrying that name, so
/// only the rename of a name's first occurrence is applied to references.
fn make_node_names_unique(scene: &mut Scene, taken: &mut HashSet<String>) {
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    for node in &mut scene.nodes {
        let first = seen.insert(node.name.clone());
        if taken.contains(&node.name) {
            let new_name = unique_name(&node.name, taken);
            if first {
                renames.insert(node.name.clone(), new_name.clone());
            }
            node.name = new_name;
        }
        taken.insert(node.name.clone());
    }
    if renames.is_empty() {
        return;
    }

    let rename = |name: &mut String| {
        if let Some(new_name) = renames.get(name) {
            *name = new_name.clone();
        }
    };
    for bone in scene.meshes.iter_mut().flat_map(|m| m.bones.iter_mut()) {
        rename(&mut bone.name);
    }
    for channel in scene.animations.iter_mut().flat_map(|a| a.channels.iter_mut()) {
        rename(&mut channel.node_name);
    }
    for light in &mut scene.lights {
        rename(&mut light.name);
    }
    for camera in &mut scene.cameras {
        rename(&mut camera.name);
    }
}

fn make_material_names_unique(scene: &mut Scene, taken: &mut HashSet<String>) {
    for material in &mut scene.materials {
        let name = material.name();
        if taken.contains(&name) {
            let new_name = unique_name(&name, taken);
            material.set_name(&new_name);
            taken.insert(new_name);
        } else {
            taken.insert(name);
        }
    }
}

fn append(master: &mut Scene, scene: Scene, attach_to: NodeId) {
    let node_offset = master.nodes.len() as u32;
    let mesh_offset = master.meshes.len() as u32;
    let material_offset = master.materials.len() as u32;
    let shift = |id: NodeId| NodeId(id.0 + node_offset);

    let sub_root = shift(scene.root);
    for mut node in scene.nodes {
        node.parent = node.parent.map(shift);
        node.children.iter_mut().for_each(|c| *c = shift(*c));
        node.meshes.iter_mut().for_each(|m| *m += mesh_offset);
        master.nodes.push(node);
    }
    master.nodes[sub_root.index()].parent = Some(attach_to);
    master.nodes[attach_to.index()].children.push(sub_root);

    master.meshes.extend(scene.meshes.into_iter().map(|mut mesh| {
        mesh.material_index += material_offset;
        mesh
    }));
    master.materials.extend(scene.materials);
    master.animations.extend(scene.animations);
    master.lights.extend(scene.lights);
    master.cameras.extend(scene.cameras);
    master.diagnostics.extend(scene.diagnostics);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        animation::{Animation, NodeAnimation},
        builder::SceneBuilder,
        light::{Light, LightType},
        material::Material,
        mesh::{Face, Mesh},
        types::{Handedness, Matrix4x4, Vector3D},
    };

    fn master() -> Scene {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node("root", Matrix4x4::IDENTITY, None);
        builder.add_node("slot", Matrix4x4::IDENTITY, Some(root));
        builder.add_node("lamp", Matrix4x4::IDENTITY, Some(root));
        builder.build().expect("master")
    }

    fn part(name: &str) -> Scene {
        let mut builder = SceneBuilder::new();
        let root = builder.add_node(name, Matrix4x4::IDENTITY, None);
        let lamp = builder.add_node("lamp", Matrix4x4::IDENTITY, Some(root));
        builder.add_material(Material::named("DefaultMaterial"));
        let mesh = builder.add_mesh(Mesh::new(
            "tri",
            vec![Vector3D::ZERO, Vector3D::X, Vector3D::Z],
            vec![Face::new(vec![0, 1, 2])],
        ));
        builder.attach_mesh(lamp, mesh);
        builder.add_light(Light::new("lamp", LightType::Point));
        let mut anim = Animation::new("a", 10.0, 25.0);
        anim.channels.push(NodeAnimation::new("lamp"));
        builder.add_animation(anim);
        builder.build().expect("part")
    }

    #[test]
    fn test_merge_appends_and_reparents() {
        let master = master();
        let slot = master.find_node("slot").expect("slot").id();
        let merged = merge_scenes(
            master,
            vec![AttachmentInfo::new(part("a"), slot), AttachmentInfo::new(part("b"), slot)],
            MergeFlags::empty(),
        )
        .expect("merge");

        assert_eq!(merged.num_nodes(), 7);
        assert_eq!(merged.num_meshes(), 2);
        assert_eq!(merged.mesh(1).expect("mesh").material_index(), 1);
        let slot = merged.find_node("slot").expect("slot");
        let names: Vec<&str> = slot.children().map(|n| n.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(!merged.is_incomplete());
    }

    #[test]
    fn test_unique_names_are_applied_consistently() {
        let master = master();
        let slot = master.find_node("slot").expect("slot").id();
        let merged = merge_scenes(
            master,
            vec![AttachmentInfo::new(part("a"), slot), AttachmentInfo::new(part("a"), slot)],
            MergeFlags::GEN_UNIQUE_NAMES | MergeFlags::GEN_UNIQUE_MATNAMES,
        )
        .expect("merge");

        let mut names: Vec<&str> = merged.nodes().map(|n| n.name()).collect();
        names.sort_unstable();
        assert_eq!(names, ["a", "a_1", "lamp", "lamp_1", "lamp_2", "root", "slot"]);
        let lights: Vec<&str> = merged.lights().map(|l| l.name()).collect();
        assert_eq!(lights, ["lamp_1", "lamp_2"]);
        assert_eq!(merged.animation(1).expect("anim").channels()[0].node_name(), "lamp_2");
        let materials: Vec<String> = merged.materials().map(|m| m.name()).collect();
        assert_eq!(materials, ["DefaultMaterial", "DefaultMaterial_1"]);
    }

    #[test]
    fn test_duplicate_names_inside_an_attachment_keep_their_references() {
        let master = master();
        let slot = master.find_node("slot").expect("slot").id();

        let mut builder = SceneBuilder::new();
        let root = builder.add_node("part", Matrix4x4::IDENTITY, None);
        builder.add_node("lamp", Matrix4x4::IDENTITY, Some(root));
        builder.add_node("lamp", Matrix4x4::IDENTITY, Some(root));
        builder.add_node("bulb", Matrix4x4::IDENTITY, Some(root));
        builder.add_node("bulb", Matrix4x4::IDENTITY, Some(root));
        builder.add_light(Light::new("bulb", LightType::Point));
        let mut anim = Animation::new("a", 10.0, 25.0);
        anim.channels.push(NodeAnimation::new("lamp"));
        builder.add_animation(anim);
        let part = builder.build().expect("part");

        let merged = merge_scenes(master, vec![AttachmentInfo::new(part, slot)], MergeFlags::GEN_UNIQUE_NAMES)
            .expect("merge");
        let part = merged.find_node("part").expect("part");
        let names: Vec<&str> = part.children().map(|n| n.name()).collect();
        // "lamp" was taken by the master, "bulb" only clashes within the part
        assert_eq!(names, ["lamp_1", "lamp_2", "bulb", "bulb_1"]);
        assert_eq!(merged.light(0).expect("light").name(), "bulb");
        assert_eq!(merged.animation(0).expect("anim").channels()[0].node_name(), "lamp_1");
    }

    #[test]
    fn test_left_handed_participants_are_converted() {
        let mut master = master();
        master.handedness = Handedness::Left;
        let slot = master.find_node("slot").expect("slot").id();
        let merged = merge_scenes(master, vec![AttachmentInfo::new(part("a"), slot)], MergeFlags::empty())
            .expect("merge");
        assert_eq!(merged.handedness(), Handedness::Right);
        assert_eq!(merged.mesh(0).expect("mesh").faces()[0].indices(), [0, 1, 2]);
    }

    #[test]
    fn test_bad_attachment_node() {
        let err = merge_scenes(
            master(),
            vec![AttachmentInfo::new(part("a"), NodeId(99))],
            MergeFlags::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
