//! SMD and VTA import through the public importer

use std::sync::Arc;

use approx::assert_relative_eq;
use scene_importer::{Importer, Vector3D, import_properties, io::MemoryFileSystem};

const CHAIN: &str = "version 1
nodes
0 \"hip\" -1
1 \"knee\" 0
2 \"foot\" 1
end
skeleton
time 0
0 0 0 0 0 0 0
1 0 -2 0 0 0 0
2 0 -2 0 0 0 0
end
triangles
leg.tga
0 0 0 0 1 0 0 0 0 2 0 0.3 1 0.3
1 0 -2 0 1 0 0 1 0 2 1 0.5 2 0.4
2 0 -4 0 1 0 0 1 1
feet.tga
2 0 -4 0 0 1 0 0 0 1 2 1.0
2 1 -4 0 0 1 0 1 0 1 2 0.5
2 1 -4 1 0 1 0 1 1
end
";

#[test]
fn test_weights_are_normalized() {
    let scene = Importer::new()
        .import_from_memory(CHAIN.as_bytes(), Some("smd"))
        .expect("smd");
    assert_eq!(scene.num_meshes(), 2);
    assert_eq!(scene.num_materials(), 2);

    for mesh in scene.meshes() {
        for face in mesh.faces() {
            assert!(face.indices().iter().all(|&i| (i as usize) < mesh.num_vertices()));
        }
        for sum in mesh.vertex_weight_sums() {
            assert!(sum == 0.0 || (sum - 1.0).abs() <= 1e-3, "weight sum {sum}");
        }
    }

    let foot = scene.find_node("foot").expect("foot");
    assert_eq!(foot.parent().expect("parent").name(), "knee");
    let global = foot.global_transformation().w_axis.truncate();
    assert!(global.abs_diff_eq(Vector3D::new(0.0, -4.0, 0.0), 1e-6));
}

const SHAPES: &str = "version 1
nodes
0 \"root\" -1
end
skeleton
time 0
0 0 0 0 0 0 0
end
vertexanimation
time 0
0 0 0 0 0 0 1
1 1 0 0 0 0 1
2 0 1 0 0 0 1
time 5
0 0 0 5 0 0 1
1 1 0 5 0 0 1
2 0 1 5 0 0 1
time 10
0 0 0 10 0 0 1
1 1 0 10 0 0 1
2 0 1 10 0 0 1
end
";

#[test]
fn test_keyframe_filter() {
    let scene = Importer::new()
        .read_file("shapes.vta")
        .with_property_int(import_properties::SMD_KEYFRAME, 5)
        .import_from_memory(SHAPES.as_bytes(), Some("vta"))
        .expect("vta");
    let mesh = scene.mesh(0).expect("mesh");
    assert_eq!(mesh.num_vertices(), 3);
    assert!(mesh.vertices().iter().all(|v| v.z == 5.0));
}

const WALK: &str = "version 1
nodes
0 \"pelvis\" -1
1 \"thigh\" 0
end
skeleton
time 0
0 0 0 0 0 0 0
1 0 1 0 0 0 0
time 1
0 0 0 1 0 0 0
1 0 1 0 0.5 0 0
end
";

#[test]
fn test_animation_list_through_file_system() {
    let fs = MemoryFileSystem::new()
        .with_file("models/leg.smd", CHAIN)
        .with_file("models/leg_animation.txt", "walk walk.smd\n")
        .with_file("models/walk.smd", WALK);
    let scene = Importer::new()
        .read_file("models/leg.smd")
        .with_file_system(Arc::new(fs))
        .import_file("models/leg.smd")
        .expect("smd with animation list");

    let names: Vec<&str> = scene.animations().map(|a| a.name()).collect();
    assert_eq!(names, ["", "walk"]);
    let walk = scene.animation(1).expect("walk");
    assert_relative_eq!(walk.duration(), 1.0);
    let thigh = walk.find_channel("thigh").expect("thigh channel");
    assert_eq!(thigh.rotation_keys().len(), 2);
}

#[test]
fn test_skeleton_only_file_is_incomplete() {
    let scene = Importer::new()
        .import_from_memory(WALK.as_bytes(), Some("smd"))
        .expect("skeleton");
    assert!(scene.is_incomplete());
    assert_eq!(scene.root_node().name(), "pelvis");
    assert_eq!(scene.mesh(0).expect("skeleton mesh").name(), "SkeletonMesh");
}
