//! Importer description functionality
//!
//! Every reader publishes a static [`ImporterDesc`] describing the formats it
//! understands. The functions here answer questions about the built-in
//! readers without importing anything.

use crate::formats::ReaderRegistry;

/// Flags indicating features common to many importers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImporterFlags {
    bits: u32,
}

impl ImporterFlags {
    /// Indicates that there is a textual encoding of the file format; and that it is supported.
    pub const SUPPORT_TEXT_FLAVOUR: Self = Self { bits: 0x1 };

    /// Indicates that there is a binary encoding of the file format; and that it is supported.
    pub const SUPPORT_BINARY_FLAVOUR: Self = Self { bits: 0x2 };

    /// Indicates that there is a compressed encoding of the file format; and that it is supported.
    pub const SUPPORT_COMPRESSED_FLAVOUR: Self = Self { bits: 0x4 };

    /// Indicates that the importer reads only a very particular subset of the file format.
    pub const LIMITED_SUPPORT: Self = Self { bits: 0x8 };

    /// Indicates that the importer is highly experimental and should be used with care.
    pub const EXPERIMENTAL: Self = Self { bits: 0x10 };

    /// Create empty flags
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Create flags from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Get the raw bits
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Check if flags contain a specific flag
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Combine flags
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }
}

impl std::ops::BitOr for ImporterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ImporterFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// Meta information about a particular importer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterDesc {
    /// Full name of the importer
    pub name: &'static str,

    /// Original author (left blank if unknown)
    pub author: &'static str,

    /// Current maintainer, left blank if unknown
    pub maintainer: &'static str,

    /// Implementation comments, i.e. unimplemented features
    pub comments: &'static str,

    /// Feature flags
    pub flags: ImporterFlags,

    /// Minimum format version supported by this importer
    pub min_major: u32,

    /// Maximum format version supported by this importer
    pub max_major: u32,

    /// Minimum format version supported by this importer
    pub min_minor: u32,

    /// Maximum format version supported by this importer
    pub max_minor: u32,

    /// Lowercase file extensions this importer can handle, without the dot
    pub file_extensions: &'static [&'static str],
}

impl ImporterDesc {
    /// Whether `extension` (any case, with or without a leading dot) is handled
    pub fn supports_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.file_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Get importer description for a given file extension
///
/// # Example
/// ```rust
/// use scene_importer::get_importer_desc;
///
/// let desc = get_importer_desc("stl").expect("STL is built in");
/// assert!(desc.file_extensions.contains(&"stl"));
/// assert!(get_importer_desc("invalid_extension_xyz").is_none());
/// ```
pub fn get_importer_desc(extension: &str) -> Option<&'static ImporterDesc> {
    ReaderRegistry::global()
        .descriptions()
        .find(|desc| desc.supports_extension(extension))
}

/// Get descriptions of all built-in importers
///
/// # Example
/// ```rust
/// use scene_importer::get_all_importer_descs;
///
/// for desc in get_all_importer_descs() {
///     println!("  {} - Extensions: {:?}", desc.name, desc.file_extensions);
/// }
/// ```
pub fn get_all_importer_descs() -> Vec<&'static ImporterDesc> {
    ReaderRegistry::global().descriptions().collect()
}

/// Check whether any built-in importer handles `extension`
pub fn is_extension_supported(extension: &str) -> bool {
    get_importer_desc(extension).is_some()
}

/// All extensions handled by the built-in importers, as `*.ext;*.ext` list
pub fn get_import_extensions() -> String {
    get_all_importer_descs()
        .iter()
        .flat_map(|desc| desc.file_extensions.iter())
        .map(|ext| format!("*.{ext}"))
        .collect::<Vec<_>>()
        .join(";")
}
