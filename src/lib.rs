//! # FBX
//!
//! Reader and writer for the binary FBX container ("Kaydara FBX Binary"),
//! plus a mapping between its mesh geometry and a small polygon mesh model.
//!
//! ## Modules
//!
//! - [`util`] - Errors, warnings, math types
//! - [`core`] - zlib helpers for compressed arrays
//! - [`binary`] - Property codec, record tree, whole-file document
//! - [`scene`] - Mesh import/export over the document
//!
//! ## Example
//!
//! ```ignore
//! use fbx::prelude::*;
//!
//! let doc = Document::open("head.fbx")?;
//! let scene = import_meshes(&doc)?;
//! for mesh in &scene.meshes {
//!     println!("{}: {} verts", mesh.name, mesh.vertices.len());
//! }
//! ```

pub mod util;
pub mod core;
pub mod binary;
pub mod scene;

pub use util::{Error, Result, Warning};
pub use binary::{Document, Property, Record};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result, Warning};
    pub use crate::binary::{CodecContext, Document, Property, Record, Width};
    pub use crate::scene::{
        export_meshes, export_meshes_with, import_meshes, ExportOptions, Mesh, MorphTarget,
        SceneExport, SceneImport, Surface,
    };
}
