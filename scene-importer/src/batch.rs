//! Loading files referenced by another file
//!
//! A [`BatchLoader`] collects load requests, imports each distinct file once
//! and hands the results out by request id. Two requests for the same file
//! with the same properties share one import; every [`BatchLoader::get_import`]
//! still returns its own copy of the scene.

use crate::{
    error::{Error, Result},
    formats::ReaderRegistry,
    importer::PropertyStore,
    io::{self, FileSystem, normalize_path},
    scene::Scene,
};

/// Deepest chain of files referencing files that will be followed
pub const MAX_BATCH_DEPTH: usize = 32;

/// Handle returned by [`BatchLoader::add_load_request`]
pub type LoadRequestId = usize;

#[derive(Debug)]
enum RequestState {
    Pending,
    Loaded(Result<Scene>),
    Taken,
}

#[derive(Debug)]
struct LoadRequest {
    path: String,
    properties: PropertyStore,
    refs: usize,
    state: RequestState,
}

/// Deduplicating loader for referenced files
#[derive(Debug)]
pub struct BatchLoader<'a> {
    io: &'a dyn FileSystem,
    registry: &'a ReaderRegistry,
    base_properties: &'a PropertyStore,
    chain: Vec<String>,
    requests: Vec<LoadRequest>,
}

static NO_PROPERTIES: PropertyStore = PropertyStore::new();

impl<'a> BatchLoader<'a> {
    /// Top-level loader dispatching to `registry`, with no inherited properties
    pub fn new(io: &'a dyn FileSystem, registry: &'a ReaderRegistry) -> Self {
        Self::with_context(io, registry, &NO_PROPERTIES, Vec::new())
    }

    pub(crate) fn with_context(
        io: &'a dyn FileSystem,
        registry: &'a ReaderRegistry,
        base_properties: &'a PropertyStore,
        chain: Vec<String>,
    ) -> Self {
        Self {
            io,
            registry,
            base_properties,
            chain,
            requests: Vec::new(),
        }
    }

    /// Queue `path` for loading with extra `properties`.
    ///
    /// A request for a file that is already queued with equal properties
    /// returns the existing id and bumps its reference count.
    pub fn add_load_request(&mut self, path: &str, properties: PropertyStore) -> LoadRequestId {
        let path = normalize_path(path);
        if let Some(id) = self
            .requests
            .iter()
            .position(|r| r.path == path && r.properties == properties)
        {
            self.requests[id].refs += 1;
            return id;
        }
        self.requests.push(LoadRequest {
            path,
            properties,
            refs: 1,
            state: RequestState::Pending,
        });
        self.requests.len() - 1
    }

    /// Number of distinct requests
    pub fn num_requests(&self) -> usize {
        self.requests.len()
    }

    /// Import every pending request. Failures are logged and kept for
    /// [`get_import`](Self::get_import); they never stop the other requests.
    pub fn load_all(&mut self) {
        for index in 0..self.requests.len() {
            if !matches!(self.requests[index].state, RequestState::Pending) {
                continue;
            }
            let result = self.load(&self.requests[index]);
            let request = &mut self.requests[index];
            match &result {
                Ok(_) => log::debug!("loaded referenced file {}", request.path),
                Err(e) => log::error!("failed to load referenced file {}: {e}", request.path),
            }
            request.state = RequestState::Loaded(result);
        }
    }

    fn load(&self, request: &LoadRequest) -> Result<Scene> {
        if self.chain.contains(&request.path) {
            return Err(Error::SelfReference {
                path: request.path.clone(),
            });
        }
        if self.chain.len() >= MAX_BATCH_DEPTH {
            return Err(Error::RecursionLimit {
                format: "batch",
                limit: MAX_BATCH_DEPTH,
            });
        }
        let data = io::read_all(self.io, &request.path)?;
        let properties = self.base_properties.merged(&request.properties);
        self.registry
            .import(&request.path, &data, self.io, &properties, &self.chain)
    }

    /// Result of a request.
    ///
    /// Each reference taken by [`add_load_request`](Self::add_load_request)
    /// can be redeemed once. The scene is cloned while other references
    /// remain and moved out on the last one.
    pub fn get_import(&mut self, id: LoadRequestId) -> Result<Scene> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown load request {id}")))?;
        match &request.state {
            RequestState::Pending => {
                return Err(Error::invalid_parameter(format!(
                    "{} has not been loaded yet",
                    request.path
                )));
            }
            RequestState::Taken => {
                return Err(Error::invalid_parameter(format!(
                    "every reference to {} was already redeemed",
                    request.path
                )));
            }
            RequestState::Loaded(_) => {}
        }
        request.refs -= 1;
        if request.refs > 0 {
            if let RequestState::Loaded(result) = &request.state {
                return result.clone();
            }
        }
        match std::mem::replace(&mut request.state, RequestState::Taken) {
            RequestState::Loaded(result) => result,
            _ => Err(Error::other("load request changed state")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFileSystem;

    const TRIANGLE: &str = "solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n";

    #[test]
    fn test_dedup_and_refcount() {
        let fs = MemoryFileSystem::new().with_file("tri.stl", TRIANGLE);
        let registry = ReaderRegistry::with_default_readers();
        let mut loader = BatchLoader::new(&fs, &registry);

        let a = loader.add_load_request("tri.stl", PropertyStore::new());
        let b = loader.add_load_request("./tri.stl", PropertyStore::new());
        let mut other = PropertyStore::new();
        other.set_bool("x", true);
        let c = loader.add_load_request("tri.stl", other);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(loader.num_requests(), 2);

        loader.load_all();
        assert_eq!(fs.open_count("tri.stl"), 2);

        let first = loader.get_import(a).expect("first copy");
        let second = loader.get_import(a).expect("second copy");
        assert_eq!(first, second);
        assert!(loader.get_import(a).is_err());
    }

    #[test]
    fn test_get_before_load_and_unknown_id() {
        let fs = MemoryFileSystem::new();
        let registry = ReaderRegistry::with_default_readers();
        let mut loader = BatchLoader::new(&fs, &registry);
        let id = loader.add_load_request("missing.stl", PropertyStore::new());
        assert!(loader.get_import(id).is_err());
        assert!(loader.get_import(42).is_err());

        loader.load_all();
        assert!(loader.get_import(id).is_err());
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let fs = MemoryFileSystem::new().with_file("tri.stl", TRIANGLE);
        let registry = ReaderRegistry::with_default_readers();
        let mut loader = BatchLoader::with_context(
            &fs,
            &registry,
            &NO_PROPERTIES,
            vec!["tri.stl".to_string()],
        );
        let id = loader.add_load_request("tri.stl", PropertyStore::new());
        loader.load_all();
        assert!(matches!(
            loader.get_import(id),
            Err(Error::SelfReference { .. })
        ));
        assert_eq!(fs.open_count("tri.stl"), 0);
    }

    #[test]
    fn test_depth_limit() {
        let fs = MemoryFileSystem::new().with_file("tri.stl", TRIANGLE);
        let registry = ReaderRegistry::with_default_readers();
        let chain = (0..MAX_BATCH_DEPTH).map(|i| format!("level{i}.lws")).collect();
        let mut loader = BatchLoader::with_context(&fs, &registry, &NO_PROPERTIES, chain);
        let id = loader.add_load_request("tri.stl", PropertyStore::new());
        loader.load_all();
        assert!(loader.get_import(id).is_err_and(|e| e.is_recursion_limit()));
    }
}
