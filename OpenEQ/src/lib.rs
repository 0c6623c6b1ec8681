#![allow(non_snake_case)]
//! # OpenEQ
//!
//! A pure-Rust decoder for legacy EverQuest zone data.
//!
//! ## Supported Formats
//!
//! - **S3D archives** - PFS containers of zlib-chunked files (read and write)
//! - **WLD** - Fragment-table scene descriptions: materials, meshes,
//!   skeletons, lights and object placements
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```no_run
//! use openeq::archive::read_s3d;
//!
//! let files = read_s3d("gfaydark.s3d")?;
//! for (name, data) in &files {
//!     println!("{name}: {} bytes", data.len());
//! }
//! # Ok::<(), openeq::Error>(())
//! ```
//!
//! ### Building a Zone
//!
//! ```no_run
//! use openeq::prelude::*;
//!
//! let zone = ZoneBuilder::from_directory("eqdata/", "gfaydark", ConvertOptions::default())?.build()?;
//! println!("{} objects, {} lights", zone.objects.len(), zone.lights.len());
//!
//! let report = serde_json::to_string_pretty(&zone.diagnostics.summary());
//! # Ok::<(), openeq::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use openeq::prelude::*;
//!
//! // Now you have access to:
//! // - read_s3d, S3dWriter, ArchiveFiles
//! // - FragmentTable, FragRef, parse_wld_bytes
//! // - Zone, ZoneBuilder, SceneAssembler, ConvertOptions
//! // - Error, Result
//! let zone = Zone::new();
//! assert_eq!(zone.objects[0].name, WORLD_OBJECT);
//! ```
//!
//! Nothing in the crate installs a `tracing` subscriber; decode anomalies
//! are logged and counted in [`scene::Diagnostics`].

pub mod archive;
pub mod error;
pub mod options;
pub mod scene;
pub mod utils;
pub mod wld;

// Re-exports for convenience
pub use error::{Error, Result};
pub use options::ConvertOptions;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::options::ConvertOptions;

    // Archives
    pub use crate::archive::{ArchiveFiles, S3dReader, S3dWriter, merge_fallback, parse_s3d_bytes, read_s3d};

    // Fragments
    pub use crate::wld::{
        FragRef, Fragment, FragmentData, FragmentTable, FragmentType, MaterialFlags, TextureBinding,
        parse_wld_bytes, parse_wld_bytes_with, read_wld,
    };

    // Scene graph
    pub use crate::scene::{
        Character, DiagnosticSummary, Diagnostics, Light, Material, Mesh, Object, ObjectId, Placeable,
        SKY_OBJECT, SceneAssembler, WORLD_OBJECT, Zone, ZoneBuilder, characters_from_archive,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
