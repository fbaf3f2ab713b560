//! LightWave scenes that pull in objects of other formats

use std::{collections::HashSet, sync::Arc};

use scene_importer::{Handedness, Importer, Scene, io::MemoryFileSystem};

const BOX_AC: &str = "AC3Db
MATERIAL \"white\" rgb 1 1 1  amb 0.2 0.2 0.2  emis 0 0 0  spec 0 0 0  shi 0  trans 0
OBJECT poly
name \"box\"
numvert 4
0 0 0
1 0 0
1 1 0
0 1 0
numsurf 1
SURF 0x10
mat 0
refs 4
0 0 0
1 0 0
2 0 0
3 0 0
kids 0
";

const LEG_SMD: &str = "version 1
nodes
0 \"hip\" -1
1 \"knee\" 0
end
skeleton
time 0
0 0 0 0 0 0 0
1 0 -2 0 0 0 0
end
triangles
leg.tga
0 0 0 0 1 0 0 0 0 1 0 1.0
1 0 -2 0 1 0 0 1 0 1 1 1.0
1 1 -2 0 1 0 0 1 1
end
";

const STAGE: &str = "LWSC
3

FirstFrame 1
LastFrame 90
FramesPerSecond 30

LoadObject objects/box.ac
ObjectMotion (unnamed)
NumChannels 1
Channel 1
{ Envelope
  2
  Key 0 0 0 0 0 0 0 0 0
  Key 1 2 0 0 0 0 0 0 0
  Behaviors 1 1
}

LoadObjectLayer 1 objects/leg.smd
ParentItem 10000000
PivotPosition 0 1 0

AddCamera
CameraName Overview
";

fn stage_file_system() -> MemoryFileSystem {
    MemoryFileSystem::new()
        .with_file("scenes/stage.lws", STAGE)
        .with_file("scenes/objects/box.ac", BOX_AC)
        .with_file("scenes/objects/leg.smd", LEG_SMD)
}

fn import_stage(fs: MemoryFileSystem) -> (Scene, Arc<MemoryFileSystem>) {
    let fs = Arc::new(fs);
    let scene = Importer::new()
        .read_file("scenes/stage.lws")
        .with_file_system(fs.clone())
        .import_file("scenes/stage.lws")
        .expect("stage");
    (scene, fs)
}

#[test]
fn test_objects_of_every_format_are_merged() {
    let (scene, fs) = import_stage(stage_file_system());
    assert_eq!(scene.handedness(), Handedness::Right);
    assert!(!scene.is_incomplete());
    assert_eq!(fs.open_count("scenes/objects/box.ac"), 1);
    assert_eq!(fs.open_count("scenes/objects/leg.smd"), 1);

    // one AC3D mesh and one SMD mesh per texture
    assert_eq!(scene.num_meshes(), 2);
    let materials: HashSet<String> = scene.materials().map(|m| m.name()).collect();
    assert_eq!(materials.len(), scene.num_materials());
    assert!(materials.contains("white"));
    for mesh in scene.meshes() {
        assert!(mesh.material_index() < scene.num_materials());
    }

    let hip = scene.find_node("hip").expect("smd skeleton");
    let ancestors: Vec<&str> = std::iter::successors(hip.parent(), |n| n.parent())
        .map(|n| n.name())
        .collect();
    assert_eq!(
        &ancestors[..4],
        ["<SMD_root>", "leg_(10000001)", "Pivot:leg_(10000001)", "box_(10000000)"]
    );
    assert_eq!(ancestors.last().copied(), Some("<LWSRoot>"));

    // bones still name nodes of the merged tree
    let node_names: HashSet<&str> = scene.nodes().map(|n| n.name()).collect();
    for bone in scene.meshes().flat_map(|m| m.bones()) {
        assert!(node_names.contains(bone.name()), "{}", bone.name());
    }
    assert_eq!(scene.camera(0).expect("camera").name(), "Overview_(30000000)");
}

#[test]
fn test_scene_and_object_animations_are_kept() {
    let (scene, _) = import_stage(stage_file_system());
    let master = scene
        .animations()
        .find(|a| a.name() == "LWSMasterAnim")
        .expect("scene animation");
    assert_eq!(master.ticks_per_second(), 30.0);
    let channel = master
        .find_channel("Pivot:box_(10000000)")
        .expect("box channel");
    let last = channel.position_keys().last().expect("keys");
    // 2 s at 30 fps, relative to the first frame
    assert_eq!(last.time, 60.0);
    assert_eq!(last.value.y, 1.0);

    // the SMD skeleton pose comes along as its own animation
    assert!(scene.animations().any(|a| a.find_channel("knee").is_some()));
}

#[test]
fn test_missing_objects_leave_empty_slots() {
    let fs = MemoryFileSystem::new()
        .with_file("scenes/stage.lws", STAGE)
        .with_file("scenes/objects/box.ac", BOX_AC);
    let (scene, _) = import_stage(fs);
    assert_eq!(scene.num_meshes(), 1);
    let slot = scene.find_node("leg_(10000001)").expect("empty slot");
    assert_eq!(slot.num_children(), 0);
    assert!(scene.import_diagnostics().iter().any(|d| d.contains("leg.smd")));
}

#[test]
fn test_unbalanced_nesting_is_rejected() {
    let mut text = String::from("LWSC\n3\n");
    text.push_str(&"{ Nested\n".repeat(10_000));
    let err = Importer::new()
        .import_from_memory(text.as_bytes(), Some("lws"))
        .expect_err("too deep");
    assert!(err.is_recursion_limit(), "{err}");
}
