//! Recoverable conditions.
//!
//! A warning degrades fidelity but never fails the call that raised it.
//! Producers log each one through `tracing` and hand the collected list
//! back to the caller.

use thiserror::Error;

/// A recoverable problem found while importing, exporting or editing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("geometry '{geometry}': duplicate UV index block ignored")]
    DuplicateUvLayer { geometry: String },

    #[error("geometry '{geometry}': {uv_indices} UV indices for {position_indices} position indices, UVs dropped")]
    UvIndexCountMismatch {
        geometry: String,
        uv_indices: usize,
        position_indices: usize,
    },

    #[error("geometry '{geometry}': {materials} material indices for {polygons} polygons")]
    MaterialIndexCountMismatch {
        geometry: String,
        materials: usize,
        polygons: usize,
    },

    #[error("geometry '{geometry}': {count} polygons ignored (N-gons with N>4 ignored)")]
    UnsupportedPolygons { geometry: String, count: usize },

    #[error("geometry '{geometry}': {count} trailing indices without a closing polygon index")]
    UnterminatedPolygon { geometry: String, count: usize },

    #[error("geometry '{geometry}': vertex array length {len} is not a multiple of 3")]
    RaggedVertexArray { geometry: String, len: usize },

    #[error("model '{model}': {linked} materials linked to {surfaces} surfaces, extra names dropped")]
    ExcessMaterials {
        model: String,
        linked: usize,
        surfaces: usize,
    },

    #[error("shape '{shape}': {indices} indices for {deltas} deltas, truncated")]
    MorphLengthMismatch {
        shape: String,
        indices: usize,
        deltas: usize,
    },

    #[error("shape '{shape}': no blend shape channel links it to a mesh geometry")]
    OrphanShape { shape: String },

    #[error("mesh '{mesh}': {reason}, UVs not exported")]
    UvsNotExported { mesh: String, reason: &'static str },

    #[error("{unused} coordinates left over after vertex injection")]
    LeftoverCoordinates { unused: usize },
}

impl Warning {
    /// Log this warning and append it to `sink`.
    pub(crate) fn emit(self, sink: &mut Vec<Warning>) {
        tracing::warn!("{}", self);
        sink.push(self);
    }
}
