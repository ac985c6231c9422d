//! Scene mapping between binary documents and meshes.
//!
//! - [`mesh`] - domain mesh model (surfaces, tris/quads, UVs, morphs)
//! - [`polygon`] - flat polygon stream splitting and encoding
//! - [`links`] - object tables and `Connections` resolution
//! - [`import`] - document to meshes
//! - [`export`] - meshes to document
//!
//! Problems that only degrade the result are returned as [`Warning`]s next
//! to the meshes or document; malformed structure is an [`Error`].
//!
//! [`Warning`]: crate::util::Warning
//! [`Error`]: crate::util::Error

pub mod export;
pub mod import;
pub mod links;
pub mod mesh;
pub mod polygon;

pub use export::{export_meshes, export_meshes_with, ExportOptions, SceneExport};
pub use import::{import_meshes, SceneImport};
pub use links::{binary_name, object_name, Connection, LinkKind, Links, SceneObject};
pub use mesh::{Facets, Mesh, MorphTarget, Surface};
pub use polygon::{split_polygons, Polygon, Polygons};
