//! Import properties and how they reach the readers

use std::sync::Arc;

use scene_importer::{
    Importer, PropertyStore, PropertyValue, import_properties, io::MemoryFileSystem,
};

const LAYERS: &str = "solid one
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
endsolid one
solid two
facet normal 0 0 1
outer loop
vertex 0 0 1
vertex 1 0 1
vertex 0 1 1
endloop
endfacet
endsolid two
";

const QUAD_AC: &str = "AC3Db
MATERIAL \"m\" rgb 1 1 1  amb 0 0 0  emis 0 0 0  spec 0 0 0  shi 0  trans 0
OBJECT poly
subdiv 1
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

#[test]
fn test_last_value_wins() {
    let mut store = PropertyStore::new();
    store
        .set_int(import_properties::ONE_LAYER_ONLY, 0)
        .set_bool(import_properties::FAVOUR_SPEED, true)
        .set_int(import_properties::ONE_LAYER_ONLY, 1);
    assert_eq!(store.len(), 3);
    assert_eq!(store.get_int(import_properties::ONE_LAYER_ONLY, -1), 1);
    assert_eq!(store.get_int(import_properties::FAVOUR_SPEED, 0), 1);
    assert_eq!(store.get_float(import_properties::ONE_LAYER_ONLY, 0.0), 1.0);
    assert_eq!(store.get_string(import_properties::ONE_LAYER_ONLY), None);

    let mut overrides = PropertyStore::new();
    overrides.set_string("name", "value");
    overrides.set_int(import_properties::ONE_LAYER_ONLY, 0);
    let merged = store.merged(&overrides);
    assert_eq!(merged.get_int(import_properties::ONE_LAYER_ONLY, -1), 0);
    assert_eq!(merged.get("name"), Some(&PropertyValue::String("value".into())));
    // the original is untouched
    assert_eq!(store.get_int(import_properties::ONE_LAYER_ONLY, -1), 1);
}

#[test]
fn test_builder_properties_reach_the_reader() {
    let all = Importer::new()
        .import_from_memory(LAYERS.as_bytes(), Some("stl"))
        .expect("all layers");
    assert_eq!(all.num_meshes(), 2);

    let mut store = PropertyStore::new();
    store.set_int(import_properties::ONE_LAYER_ONLY, 0);
    let second = Importer::new()
        .read_file("layers.stl")
        .with_property_store_ref(&store)
        .with_property_int(import_properties::ONE_LAYER_ONLY, 1)
        .import_from_memory(LAYERS.as_bytes(), Some("stl"))
        .expect("second layer");
    assert_eq!(second.num_meshes(), 1);
    assert_eq!(second.mesh(0).expect("mesh").vertices()[0].z, 1.0);
}

#[test]
fn test_properties_are_inherited_by_referenced_files() {
    let fs = Arc::new(
        MemoryFileSystem::new()
            .with_file("scene.lws", "LWSC\n3\nLoadObject quad.ac\nLoadObjectLayer 0 layers.stl\n")
            .with_file("quad.ac", QUAD_AC)
            .with_file("layers.stl", LAYERS),
    );
    let import = |eval_subdivision: bool| {
        Importer::new()
            .read_file("scene.lws")
            .with_file_system(fs.clone())
            .with_property_bool(import_properties::AC_EVAL_SUBDIVISION, eval_subdivision)
            .with_property_int(import_properties::ONE_LAYER_ONLY, 1)
            .import_file("scene.lws")
            .expect("scene")
    };

    let scene = import(true);
    let quad = scene.find_node("quad_(10000000)").expect("quad slot");
    let quad_mesh = quad
        .descendants()
        .find_map(|n| n.mesh_index(0))
        .and_then(|i| scene.mesh(i))
        .expect("quad mesh");
    assert_eq!(quad_mesh.num_faces(), 4);

    // the layer of LoadObjectLayer overrides the inherited one
    let layers = scene.find_node("layers_(10000001)").expect("stl slot");
    let stl_meshes: usize = layers.descendants().map(|n| n.num_meshes()).sum();
    assert_eq!(stl_meshes, 1);
    let stl_mesh = layers
        .descendants()
        .find_map(|n| n.mesh_index(0))
        .and_then(|i| scene.mesh(i))
        .expect("stl mesh");
    assert_eq!(stl_mesh.vertices()[0].z, 0.0);

    let scene = import(false);
    assert!(scene.meshes().any(|m| m.num_faces() == 1 && m.has_polygons()));
}

#[test]
fn test_global_keyframe_is_the_smd_fallback() {
    let text = "version 1
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
time 3
0 0 0 3 0 0 1
1 1 0 3 0 0 1
2 0 1 3 0 0 1
end
";
    let frame_of = |builder: scene_importer::ImportBuilder| {
        builder
            .import_from_memory(text.as_bytes(), Some("vta"))
            .expect("vta")
            .mesh(0)
            .expect("mesh")
            .vertices()[0]
            .z
    };
    let importer = Importer::new();
    assert_eq!(frame_of(importer.read_file("a.vta")), 0.0);
    assert_eq!(
        frame_of(
            importer
                .read_file("a.vta")
                .with_property_int(import_properties::GLOBAL_KEYFRAME, 3)
        ),
        3.0
    );
    assert_eq!(
        frame_of(
            importer
                .read_file("a.vta")
                .with_property_int(import_properties::GLOBAL_KEYFRAME, 3)
                .with_property_int(import_properties::SMD_KEYFRAME, 0)
        ),
        0.0
    );
}
