//! Post-processing steps for imported scenes
//!
//! Only the transforms the import pipeline itself relies on are provided:
//! handedness conversion, winding and UV flips, and structural validation.

use bitflags::bitflags;

use crate::{
    error::Result,
    scene::{Scene, SceneFlags},
    types::{Handedness, Vector3D, mirror_z},
};

bitflags! {
    /// Post-processing steps that can be applied to imported scenes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PostProcessSteps: u32 {
        /// Converts all the imported data to a left-handed coordinate space.
        const MAKE_LEFT_HANDED = 0x4;

        /// Validates the imported scene data structure.
        const VALIDATE_DATA_STRUCTURE = 0x400;

        /// Flips all UV coordinates along the y-axis.
        const FLIP_UVS = 0x80_0000;

        /// Flips face winding order from CCW to CW or vice versa.
        const FLIP_WINDING_ORDER = 0x100_0000;
    }
}

impl PostProcessSteps {
    /// Get the raw value
    pub fn as_raw(self) -> u32 {
        self.bits()
    }

    /// Create from raw value, dropping unknown bits
    pub fn from_raw(value: u32) -> Self {
        Self::from_bits_truncate(value)
    }

    /// Preset for left-handed coordinate systems (like DirectX)
    pub const CONVERT_TO_LEFT_HANDED: Self = Self::from_bits_truncate(
        Self::MAKE_LEFT_HANDED.bits() | Self::FLIP_UVS.bits() | Self::FLIP_WINDING_ORDER.bits(),
    );
}

/// Run `steps` on `scene`. Validation runs last.
pub fn apply(scene: &mut Scene, steps: PostProcessSteps) -> Result<()> {
    if steps.contains(PostProcessSteps::MAKE_LEFT_HANDED) {
        make_left_handed(scene);
    }
    if steps.contains(PostProcessSteps::FLIP_UVS) {
        flip_uvs(scene);
    }
    if steps.contains(PostProcessSteps::FLIP_WINDING_ORDER) {
        flip_winding_order(scene);
    }
    if steps.contains(PostProcessSteps::VALIDATE_DATA_STRUCTURE) {
        scene.validate()?;
        let duplicates = scene.duplicate_node_names();
        if !duplicates.is_empty() {
            let mut names: Vec<&str> = duplicates.into_iter().collect();
            names.sort_unstable();
            log::warn!("node names are not unique: {}", names.join(", "));
            scene.flags |= SceneFlags::VALIDATION_WARNING;
        }
        scene.flags |= SceneFlags::VALIDATED;
    }
    Ok(())
}

/// Bring a scene built in a left-handed system into the right-handed one
/// every imported scene is handed out in. Does nothing for right-handed
/// scenes.
pub fn convert_to_right_handed(scene: &mut Scene) {
    if scene.handedness == Handedness::Left {
        make_left_handed(scene);
        flip_winding_order(scene);
    }
}

/// Mirror all data at the XY plane, toggling the scene's handedness.
///
/// Positions, normals, transforms, bone offsets, animation keys, lights and
/// cameras are all mirrored, so applying this twice restores the input.
pub fn make_left_handed(scene: &mut Scene) {
    let flip = |v: &mut Vector3D| v.z = -v.z;

    for node in &mut scene.nodes {
        node.transformation = mirror_z(node.transformation);
    }
    for mesh in &mut scene.meshes {
        mesh.vertices.iter_mut().for_each(flip);
        if let Some(normals) = &mut mesh.normals {
            normals.iter_mut().for_each(flip);
        }
        for bone in &mut mesh.bones {
            bone.offset_matrix = mirror_z(bone.offset_matrix);
        }
    }
    for channel in scene.animations.iter_mut().flat_map(|a| a.channels.iter_mut()) {
        for key in &mut channel.position_keys {
            flip(&mut key.value);
        }
        for key in &mut channel.rotation_keys {
            key.value.x = -key.value.x;
            key.value.y = -key.value.y;
        }
    }
    for light in &mut scene.lights {
        flip(&mut light.position);
        flip(&mut light.direction);
        flip(&mut light.up);
    }
    for camera in &mut scene.cameras {
        flip(&mut camera.position);
        flip(&mut camera.look_at);
        flip(&mut camera.up);
    }
    scene.handedness = match scene.handedness {
        Handedness::Right => Handedness::Left,
        Handedness::Left => Handedness::Right,
    };
}

/// Reverse the index order of every face
pub fn flip_winding_order(scene: &mut Scene) {
    for face in scene.meshes.iter_mut().flat_map(|m| m.faces.iter_mut()) {
        face.indices.reverse();
    }
}

/// Replace every texture coordinate `v` with `1 - v`
pub fn flip_uvs(scene: &mut Scene) {
    for channel in scene
        .meshes
        .iter_mut()
        .flat_map(|m| m.texture_coords.iter_mut().flatten())
    {
        for uv in channel {
            uv.y = 1.0 - uv.y;
        }
    }
}
