// Integration tests for async/await support in scene-importer

// Allow unused imports since they're used conditionally based on features
#[allow(unused_imports)]
use scene_importer::Importer;
#[allow(unused_imports)]
use std::time::Duration;

#[cfg(feature = "tokio")]
mod async_tests {
    use super::*;

    const TRIANGLE: &str = "solid async\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid async\n";

    fn write_model(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}_{name}", std::process::id()));
        std::fs::write(&path, TRIANGLE).expect("Failed to write test file");
        path
    }

    #[tokio::test]
    async fn test_async_import() {
        let path = write_model("async_triangle.stl");
        let result = Importer::new().import_file_async(&path).await;
        let _ = std::fs::remove_file(&path);

        let scene = result.expect("async import");
        // the scene can be held across await points
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(scene.num_meshes(), 1);
        assert_eq!(scene.mesh(0).expect("mesh").num_faces(), 1);
    }

    #[tokio::test]
    async fn test_async_import_error() {
        let result = Importer::new()
            .import_file_async("does/not/exist.stl")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_scene_moves_into_spawned_task() {
        let path = write_model("spawned_triangle.stl");
        let scene = Importer::new()
            .read_file(&path)
            .import_file_async(&path)
            .await;
        let _ = std::fs::remove_file(&path);
        let scene = scene.expect("async import");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            scene.meshes().map(|m| m.num_vertices()).sum::<usize>()
        });
        assert_eq!(handle.await.expect("task"), 3);
    }

    #[tokio::test]
    async fn test_concurrent_imports() {
        let paths: Vec<_> = (0..4)
            .map(|i| write_model(&format!("concurrent_{i}.stl")))
            .collect();
        let tasks: Vec<_> = paths
            .iter()
            .cloned()
            .map(|path| tokio::spawn(async move { Importer::new().import_file_async(path).await }))
            .collect();
        for task in tasks {
            let scene = task.await.expect("task").expect("import");
            assert_eq!(scene.root_node().name(), "<STL_ASCII>");
        }
        for path in paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(not(feature = "tokio"))]
mod sync_tests {
    #[allow(unused_imports)]
    use super::*;

    #[test]
    fn test_send_sync_traits_without_tokio() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<scene_importer::Scene>();
        assert_send_sync::<scene_importer::mesh::Mesh>();
        assert_send_sync::<scene_importer::Material>();
        assert_send_sync::<scene_importer::Importer>();
        assert_send_sync::<scene_importer::ImportBuilder>();
    }
}
