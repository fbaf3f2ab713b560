//! Shared loading of referenced files and tree reconstruction

use std::sync::Arc;

use scene_importer::{
    BatchLoader, Importer, PropertyStore, ReaderRegistry, hierarchy, import_properties,
    io::MemoryFileSystem,
};

const TRIANGLE: &str = "solid tri
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
endsolid tri
";

#[test]
fn test_shared_object_is_read_once() {
    let scene_text = "LWSC
3
LoadObject parts/tri.stl
LoadObject parts/tri.stl
LoadObject parts/../parts/tri.stl
";
    let fs = Arc::new(
        MemoryFileSystem::new()
            .with_file("level/scene.lws", scene_text)
            .with_file("level/parts/tri.stl", TRIANGLE),
    );
    let scene = Importer::new()
        .read_file("level/scene.lws")
        .with_file_system(fs.clone())
        .import_file("level/scene.lws")
        .expect("scene");

    assert_eq!(fs.open_count("level/parts/tri.stl"), 1);
    assert_eq!(scene.num_meshes(), 3);
    for (slot, solid) in ["tri_(10000000)", "tri_(10000001)", "tri_(10000002)"]
        .into_iter()
        .zip(["tri", "tri_1", "tri_2"])
    {
        let slot = scene.find_node(slot).expect("slot");
        assert!(slot.find_node(solid).is_some(), "{solid} below {}", slot.name());
    }

    let materials: Vec<String> = scene.materials().map(|m| m.name()).collect();
    let unique: std::collections::HashSet<&String> = materials.iter().collect();
    assert_eq!(unique.len(), materials.len());
}

#[test]
fn test_favour_speed_keeps_material_names() {
    let scene_text = "LWSC\n3\nLoadObject tri.stl\nLoadObject tri.stl\n";
    let fs = Arc::new(
        MemoryFileSystem::new()
            .with_file("scene.lws", scene_text)
            .with_file("tri.stl", TRIANGLE),
    );
    let scene = Importer::new()
        .read_file("scene.lws")
        .with_file_system(fs)
        .with_property_bool(import_properties::FAVOUR_SPEED, true)
        .import_file("scene.lws")
        .expect("scene");
    let materials: Vec<String> = scene.materials().map(|m| m.name()).collect();
    assert_eq!(materials.len(), 2);
    assert_eq!(materials[0], materials[1]);
}

#[test]
fn test_batch_loader_reports_failures_per_request() {
    let fs = MemoryFileSystem::new()
        .with_file("a.stl", TRIANGLE)
        .with_file("broken.stl", "");
    let registry = ReaderRegistry::with_default_readers();
    let mut loader = BatchLoader::new(&fs, &registry);

    let a = loader.add_load_request("a.stl", PropertyStore::new());
    let missing = loader.add_load_request("missing.stl", PropertyStore::new());
    let broken = loader.add_load_request("broken.stl", PropertyStore::new());
    assert!(loader.get_import(a).is_err(), "nothing is loaded before load_all");

    loader.load_all();
    assert!(loader.get_import(missing).is_err());
    assert!(loader.get_import(broken).is_err());
    let scene = loader.get_import(a).expect("loaded");
    assert_eq!(scene.num_meshes(), 1);
}

#[test]
fn test_long_parent_chains_resolve() {
    const COUNT: u32 = 100_000;
    // every node names the next one as parent, declared leaf first
    let entries: Vec<(u32, Option<u32>)> = (0..COUNT)
        .map(|id| (id, (id + 1 < COUNT).then_some(id + 1)))
        .collect();
    let tree = hierarchy::resolve(&entries, "TEST").expect("chain");
    assert_eq!(tree.roots, [COUNT as usize - 1]);
    assert!(tree.issues.is_empty());

    let order = tree.preorder();
    assert_eq!(order.len(), COUNT as usize);
    assert_eq!(order.first().copied(), Some(COUNT as usize - 1));
    assert_eq!(order.last().copied(), Some(0));
}

#[test]
fn test_cycles_and_double_claims_are_broken() {
    let entries = [
        (1, Some(3)),
        (2, Some(1)),
        (3, Some(2)),
        (4, None),
        (5, Some(4)),
        (5, Some(4)),
        (6, Some(5)),
        (7, Some(9)),
    ];
    let tree = hierarchy::resolve(&entries, "TEST").expect("resolves");

    // every record ends up in the tree exactly once
    let mut order = tree.preorder();
    order.sort_unstable();
    assert_eq!(order, (0..entries.len()).collect::<Vec<_>>());

    // the last attached link of the 1 -> 3 -> 2 -> 1 cycle is dropped and
    // the unknown parent 9 makes 7 a root
    assert_eq!(tree.dropped, [0]);
    assert_eq!(tree.roots, [0, 3, 7]);
    // the node 6 is claimed by the first 5 only
    assert_eq!(tree.children[4], [6]);
    assert!(tree.children[5].is_empty());
    assert!(tree.issues.len() >= 3);
}
