//! Custom I/O system support
//!
//! Readers never open files themselves. The primary file and every file it
//! references are opened through a [`FileSystem`], so imports can run from
//! disk, from memory, or from an archive the caller provides.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::{Error, Result};

/// Trait for custom file I/O implementations
pub trait FileSystem: std::fmt::Debug + Send + Sync {
    /// Check if a file exists
    fn exists(&self, path: &str) -> bool;

    /// Open a file for reading
    fn open(&self, path: &str) -> Result<Box<dyn FileStream>>;

    /// Get the directory separator character
    fn separator(&self) -> char {
        std::path::MAIN_SEPARATOR
    }
}

/// Trait for file stream operations
pub trait FileStream: Send {
    /// Read data from the stream
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Get the current position in the stream
    fn tell(&self) -> Result<u64>;

    /// Seek to a position in the stream
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Get the size of the file
    fn size(&self) -> Result<u64>;
}

/// Open `path` and read it to the end
pub fn read_all(fs: &dyn FileSystem, path: &str) -> Result<Vec<u8>> {
    let mut stream = fs.open(path)?;
    let size = usize::try_from(stream.size()?)
        .map_err(|_| Error::io_error(format!("{path} is too large to load")))?;
    let mut data = vec![0u8; size];
    let mut filled = 0;
    while filled < size {
        match stream.read(&mut data[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    data.truncate(filled);
    Ok(data)
}

/// Directory part of `path` including the trailing separator, or "" if none
pub fn directory_of(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[..=pos],
        None => "",
    }
}

/// Lowercase extension of `path` without the dot
pub fn extension_of(path: &str) -> Option<String> {
    let file = &path[directory_of(path).len()..];
    file.rfind('.')
        .map(|pos| file[pos + 1..].to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// File name of `path` without directory and extension
pub fn base_name_of(path: &str) -> &str {
    let file = &path[directory_of(path).len()..];
    match file.rfind('.') {
        Some(pos) if pos > 0 => &file[..pos],
        _ => file,
    }
}

/// Collapse `.` and `..` segments and unify separators to `/`
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(&p) if p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Default file system implementation using std::fs
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFileSystem;

impl FileSystem for DefaultFileSystem {
    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).is_file()
    }

    fn open(&self, path: &str) -> Result<Box<dyn FileStream>> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::file_error(format!("unable to open {path}: {e}")))?;
        Ok(Box::new(StdFileStream::new(file)))
    }
}

/// File stream implementation using std::fs::File
pub struct StdFileStream {
    file: std::fs::File,
}

impl StdFileStream {
    fn new(file: std::fs::File) -> Self {
        Self { file }
    }
}

impl FileStream for StdFileStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        Ok(self.file.read(buffer)?)
    }

    fn tell(&self) -> Result<u64> {
        use std::io::Seek;
        let mut file = &self.file;
        Ok(file.stream_position()?)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        use std::io::{Seek, SeekFrom};
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Memory-based file system for testing or embedded resources
///
/// Paths are compared after [`normalize_path`], so `a\b.ac`, `a/./b.ac` and
/// `a/c/../b.ac` all name the same file. Every successful `open` is counted.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: HashMap<String, Arc<[u8]>>,
    opens: Mutex<HashMap<String, usize>>,
}

impl MemoryFileSystem {
    /// Create a new memory file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the memory file system
    pub fn add_file<S: AsRef<str>>(&mut self, path: S, data: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize_path(path.as_ref()), Arc::from(data.into()));
    }

    /// Add a file from a shared byte buffer.
    pub fn add_file_shared<S: AsRef<str>>(&mut self, path: S, data: Arc<[u8]>) {
        self.files.insert(normalize_path(path.as_ref()), data);
    }

    /// Builder-style [`add_file`](Self::add_file)
    pub fn with_file<S: AsRef<str>>(mut self, path: S, data: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, data);
        self
    }

    /// Get the number of files in the memory file system
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// How many times `path` has been opened
    pub fn open_count(&self, path: &str) -> usize {
        let opens = self.opens.lock().unwrap_or_else(|e| e.into_inner());
        opens.get(&normalize_path(path)).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn open(&self, path: &str) -> Result<Box<dyn FileStream>> {
        let key = normalize_path(path);
        let data = self
            .files
            .get(&key)
            .ok_or_else(|| Error::file_error(format!("File not found: {path}")))?;
        let mut opens = self.opens.lock().unwrap_or_else(|e| e.into_inner());
        *opens.entry(key).or_insert(0) += 1;
        Ok(Box::new(ReadOnlyMemoryFileStream::new(data.clone())))
    }

    fn separator(&self) -> char {
        '/'
    }
}

/// Read-only memory file stream backed by a shared byte buffer.
#[derive(Clone)]
pub struct ReadOnlyMemoryFileStream {
    data: Arc<[u8]>,
    position: usize,
}

impl ReadOnlyMemoryFileStream {
    /// Create a new read-only memory file stream.
    pub fn new(data: Arc<[u8]>) -> Self {
        Self { data, position: 0 }
    }
}

impl FileStream for ReadOnlyMemoryFileStream {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let available = self.data.len().saturating_sub(self.position);
        let to_read = buffer.len().min(available);

        if to_read > 0 {
            buffer[..to_read].copy_from_slice(&self.data[self.position..self.position + to_read]);
            self.position += to_read;
        }

        Ok(to_read)
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.position as u64)
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        let position = usize::try_from(position)
            .map_err(|_| Error::io_error("Seek position too large"))?;
        if position > self.data.len() {
            return Err(Error::io_error("Seek position beyond end of file"));
        }
        self.position = position;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}
