//! Metadata support for scenes and nodes
//!
//! Readers record where a scene came from (format name and version) in the
//! scene metadata. Nodes may carry metadata as well.

use std::collections::HashMap;

use crate::types::Vector3D;

/// Common metadata keys used across different file formats
pub mod common_metadata {
    /// Scene metadata holding the name of the reader which loaded the source asset.
    /// This is always present if the scene was created from an imported asset.
    pub const SOURCE_FORMAT: &str = "SourceAsset_Format";

    /// Scene metadata holding the version of the source asset as a string, if available.
    /// Not all formats add this metadata.
    pub const SOURCE_FORMAT_VERSION: &str = "SourceAsset_FormatVersion";

    /// Scene metadata holding the name of the software which generated the source asset, if available.
    pub const SOURCE_GENERATOR: &str = "SourceAsset_Generator";
}

/// A metadata entry containing a typed value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataEntry {
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 32-bit unsigned integer
    UInt32(u32),
    /// 32-bit floating point
    Float(f32),
    /// String value
    String(String),
    /// 3D vector
    Vector3D(Vector3D),
}

impl MetadataEntry {
    /// Get as boolean if this is a boolean entry
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as i32, widening from u32 when it fits
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            Self::UInt32(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get as f32 if this is a float entry
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string slice if this is a string entry
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get as vector if this is a vector entry
    pub fn as_vector3d(&self) -> Option<&Vector3D> {
        match self {
            Self::Vector3D(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for MetadataEntry {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataEntry {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// A collection of metadata entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    entries: HashMap<String, MetadataEntry>,
}

impl Metadata {
    /// Create a new empty metadata collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of metadata entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the metadata collection is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a metadata entry by key
    pub fn get(&self, key: &str) -> Option<&MetadataEntry> {
        self.entries.get(key)
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataEntry)> {
        self.entries.iter()
    }

    /// Get a string value by key
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_string()
    }

    /// Get an i32 value by key
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key)?.as_i32()
    }

    /// Insert a new metadata entry
    pub fn insert<S: Into<String>>(&mut self, key: S, entry: MetadataEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Remove a metadata entry by key
    pub fn remove(&mut self, key: &str) -> Option<MetadataEntry> {
        self.entries.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut meta = Metadata::new();
        assert!(meta.is_empty());
        meta.insert(common_metadata::SOURCE_FORMAT, "AC3D".into());
        meta.insert("count", MetadataEntry::UInt32(3));
        assert_eq!(meta.get_string(common_metadata::SOURCE_FORMAT), Some("AC3D"));
        assert_eq!(meta.get_i32("count"), Some(3));
        assert_eq!(meta.get_i32(common_metadata::SOURCE_FORMAT), None);
        assert_eq!(meta.len(), 2);
        assert!(meta.remove("count").is_some());
        assert!(!meta.contains_key("count"));
    }
}
