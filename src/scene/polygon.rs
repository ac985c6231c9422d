//! Polygon reconstruction from FBX flat index streams.
//!
//! `PolygonVertexIndex` lists every polygon's position indices back to
//! back; the last index of each polygon is stored bitwise-complemented
//! (`!v`, so always negative). UV and material layers are parallel to that
//! stream per corner and per polygon respectively.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use super::mesh::Surface;
use crate::util::Warning;

/// One closed polygon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polygon {
    /// Position in the flat stream of the first corner.
    pub start: usize,
    /// Un-complemented position indices.
    pub verts: SmallVec<[u32; 4]>,
}

impl Polygon {
    #[inline]
    pub fn len(&self) -> usize {
        self.verts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }
}

/// Polygons recovered from a flat stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polygons {
    pub polygons: Vec<Polygon>,
    /// Indices after the last closing index, belonging to no polygon.
    pub trailing: usize,
}

/// Split a flat index stream at its complemented closing indices.
pub fn split_polygons(indices: &[i32]) -> Polygons {
    let mut polygons = Vec::new();
    let mut current: SmallVec<[u32; 4]> = SmallVec::new();
    let mut start = 0;

    for (k, &v) in indices.iter().enumerate() {
        if current.is_empty() {
            start = k;
        }
        if v < 0 {
            current.push(!v as u32);
            polygons.push(Polygon {
                start,
                verts: std::mem::take(&mut current),
            });
        } else {
            current.push(v as u32);
        }
    }

    Polygons {
        polygons,
        trailing: current.len(),
    }
}

/// Inverse of [`split_polygons`] for one polygon: complement the last index.
pub fn encode_polygon(verts: &[u32], out: &mut Vec<i32>) -> Option<()> {
    let (last, head) = verts.split_last()?;
    for &v in head {
        out.push(i32::try_from(v).ok()?);
    }
    out.push(!i32::try_from(*last).ok()?);
    Some(())
}

/// Group polygons into surfaces by material index.
///
/// * `uv_indices` - per-corner UV indices, already checked to be parallel
///   to the position stream
/// * `materials` - per-polygon material indices (`ByPolygon` mapping only)
///
/// Surfaces come back ordered by ascending material id. Without material
/// indices every polygon lands in one surface. Only tris and quads are
/// kept; other sizes are dropped with a warning.
pub fn build_surfaces(
    geometry: &str,
    polys: &Polygons,
    uv_indices: Option<&[i32]>,
    materials: Option<&[i32]>,
    warnings: &mut Vec<Warning>,
) -> Vec<(i32, Surface)> {
    if polys.trailing > 0 {
        Warning::UnterminatedPolygon {
            geometry: geometry.to_string(),
            count: polys.trailing,
        }
        .emit(warnings);
    }
    if let Some(m) = materials {
        if m.len() != polys.polygons.len() {
            Warning::MaterialIndexCountMismatch {
                geometry: geometry.to_string(),
                materials: m.len(),
                polygons: polys.polygons.len(),
            }
            .emit(warnings);
        }
    }

    let mut groups: BTreeMap<i32, Surface> = BTreeMap::new();
    if materials.is_none() {
        groups.insert(0, Surface::new(default_surface_name(0)));
    }

    let mut dropped = 0;
    for (p, poly) in polys.polygons.iter().enumerate() {
        if poly.len() != 3 && poly.len() != 4 {
            dropped += 1;
            continue;
        }
        // Best effort past the end of a short material list.
        let id = materials.map_or(0, |m| m.get(p).copied().unwrap_or(0));
        let surface = groups
            .entry(id)
            .or_insert_with(|| Surface::new(default_surface_name(id)));
        let uvs = uv_indices.map(|uv| {
            uv[poly.start..poly.start + poly.len()]
                .iter()
                .map(|&i| i.max(0) as u32)
                .collect::<SmallVec<[u32; 4]>>()
        });

        match poly.len() {
            3 => {
                surface.tris.vert_inds.push([poly.verts[0], poly.verts[1], poly.verts[2]]);
                if let Some(uv) = uvs {
                    surface.tris.uv_inds.push([uv[0], uv[1], uv[2]]);
                }
            }
            _ => {
                surface.quads.vert_inds.push([poly.verts[0], poly.verts[1], poly.verts[2], poly.verts[3]]);
                if let Some(uv) = uvs {
                    surface.quads.uv_inds.push([uv[0], uv[1], uv[2], uv[3]]);
                }
            }
        }
    }

    if dropped > 0 {
        Warning::UnsupportedPolygons {
            geometry: geometry.to_string(),
            count: dropped,
        }
        .emit(warnings);
    }

    groups.into_iter().collect()
}

/// Name a surface gets before material links are resolved.
pub fn default_surface_name(material_id: i32) -> String {
    format!("surface{}", material_id)
}
