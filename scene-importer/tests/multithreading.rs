// Integration tests for multi-threading support in scene-importer
use scene_importer::{Importer, Scene, io::MemoryFileSystem};
use std::sync::{Arc, mpsc};
use std::thread;

const TRIANGLES: &str = "solid pair
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
facet normal 0 0 1
outer loop
vertex 1 0 0
vertex 1 1 0
vertex 0 1 0
endloop
endfacet
endsolid pair
";

fn scene_with_objects(count: usize) -> String {
    let mut text = String::from("LWSC\n3\n");
    for _ in 0..count {
        text.push_str("LoadObject pair.stl\n");
    }
    text
}

// Test 1: Multiple threads processing the same scene
#[test]
fn test_shared_scene_processing() {
    let scene = Importer::new()
        .import_from_memory(TRIANGLES.as_bytes(), Some("stl"))
        .expect("stl");
    let scene = Arc::new(scene);

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let scene = Arc::clone(&scene);
            thread::spawn(move || {
                let vertices: usize = scene.meshes().map(|m| m.num_vertices()).sum();
                let faces: usize = scene.meshes().map(|m| m.num_faces()).sum();
                println!("  Thread {thread_id}: {vertices} vertices, {faces} faces");
                (vertices, faces)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("thread panicked"), (6, 2));
    }
}

// Test 2: Each thread runs its own multi-file import
#[test]
fn test_independent_imports() {
    let handles: Vec<_> = (1..=6)
        .map(|objects| {
            thread::spawn(move || {
                let fs = Arc::new(
                    MemoryFileSystem::new()
                        .with_file("scene.lws", scene_with_objects(objects))
                        .with_file("pair.stl", TRIANGLES),
                );
                let scene = Importer::new()
                    .read_file("scene.lws")
                    .with_file_system(fs.clone())
                    .import_file("scene.lws")
                    .expect("scene");
                assert_eq!(fs.open_count("pair.stl"), 1);
                (objects, scene)
            })
        })
        .collect();

    for handle in handles {
        let (objects, scene) = handle.join().expect("thread panicked");
        assert_eq!(scene.num_meshes(), objects);
        // generated names only depend on this import
        let last = format!("pair_({:08X})", 0x1000_0000 + objects - 1);
        assert!(scene.find_node(&last).is_some(), "{last}");
        assert!(scene.import_diagnostics().is_empty());
    }
}

// Test 3: Producer-Consumer pattern with scene data
#[test]
fn test_producer_consumer() {
    let (sender, receiver) = mpsc::channel::<Scene>();

    let producer = thread::spawn(move || {
        let importer = Importer::new();
        for _ in 0..3 {
            let scene = importer
                .import_from_memory(TRIANGLES.as_bytes(), Some("stl"))
                .expect("stl");
            sender.send(scene).expect("consumer alive");
        }
    });

    let consumer = thread::spawn(move || {
        receiver
            .iter()
            .map(|scene| scene.meshes().map(|m| m.num_faces()).sum::<usize>())
            .sum::<usize>()
    });

    producer.join().expect("producer panicked");
    assert_eq!(consumer.join().expect("consumer panicked"), 6);
}

// Test 4: One importer shared by reference across scoped threads
#[test]
fn test_shared_importer() {
    let importer = Importer::new();
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let scene = importer
                    .import_from_memory(TRIANGLES.as_bytes(), Some("stl"))
                    .expect("stl");
                assert_eq!(scene.root_node().name(), "<STL_ASCII>");
            });
        }
    });
}

// Test 5: Compilation test for Send/Sync traits
#[test]
fn test_send_sync_compilation() {
    fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<scene_importer::Scene>();
    assert_send_sync::<scene_importer::node::Node<'static>>();
    assert_send_sync::<scene_importer::mesh::Mesh>();
    assert_send_sync::<scene_importer::Material>();
    assert_send_sync::<scene_importer::light::Light>();
    assert_send_sync::<scene_importer::camera::Camera>();
    assert_send_sync::<scene_importer::Bone>();
    assert_send_sync::<scene_importer::animation::Animation>();
    assert_send_sync::<scene_importer::Importer>();
    assert_send_sync::<scene_importer::io::MemoryFileSystem>();
}
