//! Scene importer functionality

use std::{path::Path, sync::Arc};

use crate::{
    error::{Error, Result},
    formats::{ReaderFactory, ReaderRegistry},
    io::{self, DefaultFileSystem, FileSystem},
    postprocess::{self, PostProcessSteps},
    scene::Scene,
    types::Matrix4x4,
};

/// File name given to buffers imported from memory. The hint is appended as
/// the extension so extension-based dispatch still works.
pub const MEMORY_FILE_PREFIX: &str = "$$$___magic___$$$";

/// A property store for configuring import behavior
///
/// Properties are kept in the order they were set. When a name is set more
/// than once, the last value wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyStore {
    properties: Vec<(String, PropertyValue)>,
}

impl PropertyStore {
    /// Create a new empty property store
    pub const fn new() -> Self {
        Self {
            properties: Vec::new(),
        }
    }

    /// Set an integer property
    pub fn set_int<S: Into<String>>(&mut self, name: S, value: i32) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Integer(value)));
        self
    }

    /// Set a float property
    pub fn set_float<S: Into<String>>(&mut self, name: S, value: f32) -> &mut Self {
        self.properties.push((name.into(), PropertyValue::Float(value)));
        self
    }

    /// Set a string property
    pub fn set_string<S: Into<String>, V: Into<String>>(&mut self, name: S, value: V) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::String(value.into())));
        self
    }

    /// Set a boolean property
    pub fn set_bool<S: Into<String>>(&mut self, name: S, value: bool) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Boolean(value)));
        self
    }

    /// Set a matrix property
    pub fn set_matrix<S: Into<String>>(&mut self, name: S, value: Matrix4x4) -> &mut Self {
        self.properties
            .push((name.into(), PropertyValue::Matrix(value)));
        self
    }

    /// Current value of a property
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Check if a property has been set
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Integer value of a property. Booleans read as 0 or 1.
    pub fn get_int(&self, name: &str, default: i32) -> i32 {
        match self.get(name) {
            Some(PropertyValue::Integer(v)) => *v,
            Some(PropertyValue::Boolean(b)) => i32::from(*b),
            _ => default,
        }
    }

    /// Boolean value of a property. Integers are true when non-zero.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(PropertyValue::Boolean(b)) => *b,
            Some(PropertyValue::Integer(v)) => *v != 0,
            _ => default,
        }
    }

    /// Float value of a property. Integers are converted.
    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        match self.get(name) {
            Some(PropertyValue::Float(v)) => *v,
            Some(PropertyValue::Integer(v)) => *v as f32,
            _ => default,
        }
    }

    /// String value of a property
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Matrix value of a property
    pub fn get_matrix(&self, name: &str) -> Option<Matrix4x4> {
        match self.get(name) {
            Some(PropertyValue::Matrix(m)) => Some(*m),
            _ => None,
        }
    }

    /// A copy of this store with `overrides` applied on top
    pub fn merged(&self, overrides: &PropertyStore) -> PropertyStore {
        let mut merged = self.clone();
        merged.properties.extend(overrides.properties.iter().cloned());
        merged
    }

    /// Get all properties as a slice
    pub fn properties(&self) -> &[(String, PropertyValue)] {
        &self.properties
    }

    /// Clear all properties
    pub fn clear(&mut self) {
        self.properties.clear();
    }

    /// Check if the property store is empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Get the number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }
}

impl From<Vec<(String, PropertyValue)>> for PropertyStore {
    fn from(properties: Vec<(String, PropertyValue)>) -> Self {
        Self { properties }
    }
}

impl From<PropertyStore> for Vec<(String, PropertyValue)> {
    fn from(store: PropertyStore) -> Self {
        store.properties
    }
}

/// Common import property keys
pub mod import_properties {
    /// Keyframe used by readers that pick a single frame (int, default 0)
    pub const GLOBAL_KEYFRAME: &str = "IMPORT_GLOBAL_KEYFRAME";

    /// SMD: frame kept from a `vertexanimation` section (int, defaults to [`GLOBAL_KEYFRAME`])
    pub const SMD_KEYFRAME: &str = "IMPORT_SMD_KEYFRAME";

    /// SMD: read `<name>_animation.txt` next to the model (bool, default true)
    pub const SMD_LOAD_ANIMATION_LIST: &str = "IMPORT_SMD_LOAD_ANIMATION_LIST";

    /// LWS: first frame of the imported range, overriding the file (int)
    pub const LWS_ANIM_START: &str = "IMPORT_LWS_ANIM_START";

    /// LWS: last frame of the imported range, overriding the file (int)
    pub const LWS_ANIM_END: &str = "IMPORT_LWS_ANIM_END";

    /// Skip optional work such as making merged names unique (bool, default false)
    pub const FAVOUR_SPEED: &str = "FAVOUR_SPEED";

    /// Do not generate placeholder meshes for bone-only scenes (bool, default false)
    pub const NO_SKELETON_MESHES: &str = "IMPORT_NO_SKELETON_MESHES";

    /// Import only the layer with this index from layered files (int, unset = all)
    pub const ONE_LAYER_ONLY: &str = "IMPORT_ONE_LAYER_ONLY";

    /// AC3D: evaluate `subdiv` levels with Catmull-Clark (bool, default true)
    pub const AC_EVAL_SUBDIVISION: &str = "IMPORT_AC_EVAL_SUBDIVISION";
}

/// Property values that can be set for import configuration
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Integer property
    Integer(i32),
    /// Float property
    Float(f32),
    /// String property
    String(String),
    /// Boolean property
    Boolean(bool),
    /// Matrix property (4x4 transformation matrix)
    Matrix(Matrix4x4),
}

/// Builder for configuring and executing scene imports
#[derive(Debug, Clone)]
pub struct ImportBuilder {
    registry: Arc<ReaderRegistry>,
    post_process: PostProcessSteps,
    properties: PropertyStore,
    file_system: Option<Arc<dyn FileSystem>>,
}

impl ImportBuilder {
    /// Create a new import builder using the built-in readers
    pub fn new() -> Self {
        Self::with_registry(ReaderRegistry::global())
    }

    pub(crate) fn with_registry(registry: Arc<ReaderRegistry>) -> Self {
        Self {
            registry,
            post_process: PostProcessSteps::default(),
            properties: PropertyStore::new(),
            file_system: None,
        }
    }

    /// Set the post-processing steps to apply
    pub fn with_post_process(mut self, steps: PostProcessSteps) -> Self {
        self.post_process = steps;
        self
    }

    /// Add post-processing steps to the current set
    pub fn add_post_process(mut self, steps: PostProcessSteps) -> Self {
        self.post_process |= steps;
        self
    }

    /// Set an integer property
    pub fn with_property_int<S: Into<String>>(mut self, name: S, value: i32) -> Self {
        self.properties.set_int(name, value);
        self
    }

    /// Set a float property
    pub fn with_property_float<S: Into<String>>(mut self, name: S, value: f32) -> Self {
        self.properties.set_float(name, value);
        self
    }

    /// Set a string property
    pub fn with_property_string<S: Into<String>, V: Into<String>>(
        mut self,
        name: S,
        value: V,
    ) -> Self {
        self.properties.set_string(name, value);
        self
    }

    /// Set a boolean property
    pub fn with_property_bool<S: Into<String>>(mut self, name: S, value: bool) -> Self {
        self.properties.set_bool(name, value);
        self
    }

    /// Set a matrix property
    pub fn with_property_matrix<S: Into<String>>(mut self, name: S, value: Matrix4x4) -> Self {
        self.properties.set_matrix(name, value);
        self
    }

    /// Set properties from a PropertyStore
    pub fn with_property_store(mut self, store: PropertyStore) -> Self {
        self.properties.properties.extend(store.properties);
        self
    }

    /// Set properties from a PropertyStore by reference
    pub fn with_property_store_ref(mut self, store: &PropertyStore) -> Self {
        self.properties
            .properties
            .extend(store.properties.iter().cloned());
        self
    }

    /// Set a custom file system. The primary file and every file it
    /// references are opened through it.
    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    /// Properties that will be passed to the readers
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Import a scene from a file path
    pub fn import_file<P: AsRef<Path>>(self, path: P) -> Result<Scene> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let fs = self.file_system();
        if !fs.exists(&path) {
            return Err(Error::file_error(format!("file not found: {path}")));
        }
        let data = io::read_all(fs.as_ref(), &path)?;
        self.run(&path, &data, fs.as_ref())
    }

    /// Import a scene from memory buffer
    ///
    /// `hint` is the file extension used to pick a reader. Files referenced by
    /// the buffer are looked up through the configured file system.
    pub fn import_from_memory(self, data: &[u8], hint: Option<&str>) -> Result<Scene> {
        if data.is_empty() {
            return Err(Error::invalid_parameter("memory buffer is empty"));
        }
        let name = format!("{MEMORY_FILE_PREFIX}.{}", hint.unwrap_or_default());
        let fs = self.file_system();
        self.run(&name, data, fs.as_ref())
    }

    /// Import a scene from a file path on a blocking worker thread
    #[cfg(feature = "tokio")]
    pub async fn import_file_async<P: AsRef<Path>>(self, path: P) -> Result<Scene> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || self.import_file(path))
            .await
            .map_err(|e| Error::import_failed(format!("import task failed: {e}")))?
    }

    fn file_system(&self) -> Arc<dyn FileSystem> {
        self.file_system
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultFileSystem))
    }

    fn run(&self, path: &str, data: &[u8], fs: &dyn FileSystem) -> Result<Scene> {
        log::info!("importing {path} ({} bytes)", data.len());
        let mut scene = self
            .registry
            .import(path, data, fs, &self.properties, &[])?;
        postprocess::apply(&mut scene, self.post_process)?;
        log::debug!(
            "imported {path}: {} nodes, {} meshes, {} diagnostics",
            scene.num_nodes(),
            scene.num_meshes(),
            scene.import_diagnostics().len()
        );
        Ok(scene)
    }
}

impl Default for ImportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Main importer interface
#[derive(Debug, Clone)]
pub struct Importer {
    registry: Arc<ReaderRegistry>,
}

impl Importer {
    /// Create a new importer with the built-in readers
    pub fn new() -> Self {
        Self {
            registry: ReaderRegistry::global(),
        }
    }

    /// Create an importer that dispatches to the readers of `registry`
    pub fn with_registry(registry: ReaderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Register an additional reader. It is consulted after the existing ones.
    pub fn register_reader(&mut self, factory: ReaderFactory) -> &mut Self {
        Arc::make_mut(&mut self.registry).register(factory);
        self
    }

    /// Readers known to this importer
    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    /// Start building an import operation
    pub fn read_file<P: AsRef<Path>>(&self, _path: P) -> ImportBuilder {
        ImportBuilder::with_registry(self.registry.clone())
    }

    /// Start building an import operation from memory
    pub fn read_from_memory(&self, _data: &[u8]) -> ImportBuilder {
        ImportBuilder::with_registry(self.registry.clone())
    }

    /// Quick import with default settings
    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> Result<Scene> {
        self.read_file(&path).import_file(path)
    }

    /// Quick import from memory with default settings
    pub fn import_from_memory(&self, data: &[u8], hint: Option<&str>) -> Result<Scene> {
        self.read_from_memory(data).import_from_memory(data, hint)
    }

    /// Quick import on a blocking worker thread
    #[cfg(feature = "tokio")]
    pub async fn import_file_async<P: AsRef<Path>>(&self, path: P) -> Result<Scene> {
        self.read_file(&path).import_file_async(path).await
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}
