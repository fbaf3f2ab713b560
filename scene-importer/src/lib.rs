//! # Scene Importer
//!
//! Native readers for legacy 3D scene formats, all producing one common,
//! validated scene graph.
//!
//! ## Features
//!
//! - **Formats**: AC3D (`.ac`), Valve SMD/VTA, LightWave scenes (`.lws`,
//!   `.mot`) and STL in both flavours
//! - **One model**: every reader commits through [`builder::SceneBuilder`],
//!   so every [`Scene`] has a single root and consistent indices
//! - **Multi-file scenes**: referenced files are loaded once through a
//!   [`batch::BatchLoader`] and merged with [`combiner::merge_scenes`]
//! - **Custom I/O**: imports read through an injectable [`io::FileSystem`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_importer::{Importer, postprocess::PostProcessSteps};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let importer = Importer::new();
//! let scene = importer
//!     .read_file("model.ac")
//!     .with_post_process(PostProcessSteps::FLIP_UVS)
//!     .import_file("model.ac")?;
//!
//! println!("Loaded {} meshes", scene.meshes().count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Each format lives in [`formats`] behind the [`formats::FormatReader`]
//! trait. Readers parse into format-local records first and convert them
//! in one step. Problems a reader can work around are logged through the
//! `log` facade and kept in [`Scene::import_diagnostics`]; everything else
//! fails the import with an [`Error`].

#![warn(missing_docs)]

// Re-export common types for convenience
pub use crate::{
    error::{Error, Result},
    importer::{ImportBuilder, Importer, PropertyStore, PropertyValue, import_properties},
    scene::{Scene, SceneFlags},
    types::*,
};

// Re-export logging functionality
pub use crate::logging::{LogLevel, LogStream, Logger};

// Re-export metadata functionality
pub use crate::metadata::{Metadata, MetadataEntry};

// Re-export material functionality
pub use crate::material::{Material, TextureInfo, TextureType, material_keys};

// Re-export AABB functionality
pub use crate::aabb::AABB;

// Re-export bone functionality
pub use crate::bone::{Bone, VertexWeight};

// Re-export reader plumbing
pub use crate::{
    batch::BatchLoader,
    combiner::{AttachmentInfo, MergeFlags, merge_scenes},
    formats::{FormatReader, ImportContext, ReaderRegistry},
    importer_desc::{
        ImporterDesc, ImporterFlags, get_all_importer_descs, get_import_extensions,
        get_importer_desc, is_extension_supported,
    },
};

// Core modules
pub mod builder;
pub mod error;
pub mod importer;
pub mod importer_desc;
pub mod scene;
pub mod types;

// Component modules
pub mod animation;
pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod node;

// Data structure modules
pub mod aabb;
pub mod bone;
pub mod metadata;

// Format readers and the machinery they share
pub mod batch;
pub mod combiner;
pub mod formats;
pub mod hierarchy;
pub mod scanner;
pub mod skeleton;
pub mod subdivision;
pub mod weights;

// Advanced features
pub mod io;
pub mod logging;
pub mod postprocess;

/// Version information
pub mod version {
    /// Version of this crate
    pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
}
