//! Format readers and reader dispatch
//!
//! Every supported file format is handled by a [`FormatReader`]. Readers are
//! created fresh for each import from a [`ReaderRegistry`], parse the bytes
//! they are given into format-local records, and commit those through a
//! [`crate::builder::SceneBuilder`]. Anything an import needs besides its own
//! bytes (files it references, configuration, name counters, diagnostics)
//! comes from the [`ImportContext`].

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use crate::{
    batch::BatchLoader,
    error::{Error, Result},
    importer::PropertyStore,
    importer_desc::ImporterDesc,
    io::{FileSystem, directory_of, extension_of, normalize_path},
    metadata::{MetadataEntry, common_metadata},
    scene::Scene,
};

pub mod ac;
pub mod lws;
pub mod smd;
pub mod stl;

/// Deepest nesting a reader follows before giving up
pub const MAX_DEPTH: usize = 1000;

/// Creates a fresh reader for one import
pub type ReaderFactory = fn() -> Box<dyn FormatReader>;

/// A reader for one family of file formats
pub trait FormatReader {
    /// Static description of the formats this reader handles
    fn info(&self) -> &'static ImporterDesc;

    /// Check whether the reader understands `data`.
    ///
    /// Without `deep_check` this is cheap: an extension or magic-number test.
    /// With it, the reader may scan the start of the file for a signature.
    /// It never parses the whole file.
    fn can_read(&self, path: &str, data: &[u8], deep_check: bool) -> bool;

    /// Pick up configuration before [`read`](Self::read) is called
    fn configure(&mut self, _properties: &PropertyStore) {}

    /// Parse `data` into a validated scene
    fn read(&mut self, path: &str, data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Scene>;
}

/// Whether the extension of `path` is one of the reader's extensions
pub fn has_extension(path: &str, desc: &ImporterDesc) -> bool {
    extension_of(path).is_some_and(|ext| desc.supports_extension(&ext))
}

/// Ordered collection of reader constructors
#[derive(Debug, Clone, Default)]
pub struct ReaderRegistry {
    factories: Vec<ReaderFactory>,
}

impl ReaderRegistry {
    /// A registry without readers
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in reader
    pub fn with_default_readers() -> Self {
        let mut registry = Self::empty();
        registry
            .register(|| Box::new(stl::StlReader::default()))
            .register(|| Box::new(smd::SmdReader::default()))
            .register(|| Box::new(ac::AcReader::default()))
            .register(|| Box::new(lws::LwsReader::default()));
        registry
    }

    /// Shared registry of the built-in readers
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ReaderRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_default_readers()))
            .clone()
    }

    /// Add a reader. Readers are consulted in registration order.
    pub fn register(&mut self, factory: ReaderFactory) -> &mut Self {
        self.factories.push(factory);
        self
    }

    /// Number of registered readers
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no reader is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Descriptions of the registered readers
    pub fn descriptions(&self) -> impl Iterator<Item = &'static ImporterDesc> + '_ {
        self.factories.iter().map(|factory| factory().info())
    }

    /// Pick the reader for a file.
    ///
    /// Readers whose extension matches get a cheap check first. If none of
    /// them accepts, every reader gets a deep signature check.
    pub fn find_reader(&self, path: &str, data: &[u8]) -> Option<Box<dyn FormatReader>> {
        let by_extension = self.factories.iter().map(|factory| factory()).find(|reader| {
            has_extension(path, reader.info()) && reader.can_read(path, data, false)
        });
        by_extension.or_else(|| {
            self.factories
                .iter()
                .map(|factory| factory())
                .find(|reader| reader.can_read(path, data, true))
        })
    }

    /// Import `data` as the file `path`.
    ///
    /// `chain` lists the normalized paths of the files currently being
    /// imported further up, outermost first.
    pub fn import(
        &self,
        path: &str,
        data: &[u8],
        io: &dyn FileSystem,
        properties: &PropertyStore,
        chain: &[String],
    ) -> Result<Scene> {
        let mut reader = self
            .find_reader(path, data)
            .ok_or_else(|| Error::unsupported_format(path))?;
        let desc = reader.info();
        log::debug!("{path}: reading with {}", desc.name);

        reader.configure(properties);
        let mut chain = chain.to_vec();
        chain.push(normalize_path(path));
        let mut ctx = ImportContext::new(io, properties, self, chain);
        let mut scene = reader.read(path, data, &mut ctx)?;

        let mut diagnostics = ctx.into_diagnostics();
        diagnostics.append(&mut scene.diagnostics);
        scene.diagnostics = diagnostics;
        if !scene.metadata.contains_key(common_metadata::SOURCE_FORMAT) {
            scene
                .metadata
                .insert(common_metadata::SOURCE_FORMAT, MetadataEntry::from(desc.name));
        }
        Ok(scene)
    }
}

/// Per-import state handed to a reader.
///
/// Nothing in here outlives the import, so concurrent imports never share
/// counters or diagnostics.
pub struct ImportContext<'a> {
    io: &'a dyn FileSystem,
    properties: &'a PropertyStore,
    registry: &'a ReaderRegistry,
    chain: Vec<String>,
    counters: HashMap<&'static str, u32>,
    diagnostics: Vec<String>,
}

impl<'a> ImportContext<'a> {
    /// Context for importing the last file of `chain`
    pub fn new(
        io: &'a dyn FileSystem,
        properties: &'a PropertyStore,
        registry: &'a ReaderRegistry,
        chain: Vec<String>,
    ) -> Self {
        Self {
            io,
            properties,
            registry,
            chain,
            counters: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// File system used for every referenced file
    pub fn io(&self) -> &'a dyn FileSystem {
        self.io
    }

    /// Configuration of this import
    pub fn properties(&self) -> &'a PropertyStore {
        self.properties
    }

    /// Normalized path of the file being imported
    pub fn current_file(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or_default()
    }

    /// Files being imported, outermost first, ending with the current one
    pub fn import_chain(&self) -> &[String] {
        &self.chain
    }

    /// Log a recoverable problem as a warning and record it on the scene
    pub fn warn<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        log::warn!("{}: {message}", self.current_file());
        self.diagnostics.push(message);
    }

    /// Log a recoverable problem as an error and record it on the scene
    pub fn error<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        log::error!("{}: {message}", self.current_file());
        self.diagnostics.push(message);
    }

    /// Record problems that were already logged elsewhere
    pub fn record<I: IntoIterator<Item = String>>(&mut self, issues: I) {
        self.diagnostics.extend(issues);
    }

    /// Problems recorded so far
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Next value of the per-import counter `kind`, starting at 0
    pub fn next_name_index(&mut self, kind: &'static str) -> u32 {
        let counter = self.counters.entry(kind).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    /// Loader for files referenced by the current one. It inherits the file
    /// system, properties and import chain of this context.
    pub fn batch_loader(&self) -> BatchLoader<'a> {
        BatchLoader::with_context(self.io, self.registry, self.properties, self.chain.clone())
    }

    /// Locate a referenced file.
    ///
    /// `reference` is tried as given, then relative to the directory of the
    /// current file, then with up to three `../` prefixes below that
    /// directory. Returns the first candidate that exists.
    pub fn find_referenced_file(&self, reference: &str) -> Option<String> {
        let reference = fix_drive_letter(reference);
        let dir = directory_of(self.current_file());
        let mut candidates = vec![reference.clone()];
        let mut prefix = String::new();
        for _ in 0..4 {
            candidates.push(format!("{dir}{prefix}{reference}"));
            prefix.push_str("../");
        }
        candidates.into_iter().find(|candidate| self.io.exists(candidate))
    }

    pub(crate) fn into_diagnostics(self) -> Vec<String> {
        self.diagnostics
    }
}

/// `C:path` means `C:\path` in old Windows-authored files
fn fix_drive_letter(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() > 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && !matches!(bytes[2], b'\\' | b'/')
    {
        format!("{}\\{}", &path[..2], &path[2..])
    } else {
        path.to_string()
    }
}
